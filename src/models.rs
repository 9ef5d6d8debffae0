use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Row shape returned directly by `sqlx` queries against the `jobs` table.
/// `status` is kept as raw text here and parsed at the edge — mirrors the
/// teacher's convention of plain `FromRow` structs with no custom `sqlx::Type`
/// derives for enum-shaped columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub status: String,
    pub document_type: String,
    pub email: String,
    pub callback_webhook: Option<String>,
    pub file_data: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub ocr_result: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl JobRow {
    pub fn status(&self) -> JobStatus {
        self.status.parse().unwrap_or(JobStatus::Failed)
    }
}

/// Lighter row used by listing/stats queries that never need `file_data`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobSummaryRow {
    pub id: Uuid,
    pub status: String,
    pub document_type: String,
    pub email: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size_bytes: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Result tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WordContentType {
    Text,
    Number,
    Date,
    Email,
    Url,
    Currency,
    Phone,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub font_size: Option<f64>,
    pub content_type: WordContentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LineAlignment {
    Left,
    Center,
    Right,
    Justified,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub alignment: LineAlignment,
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphTextType {
    Heading,
    Body,
    Footer,
    Caption,
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub text_type: ParagraphTextType,
    /// Heading level (1 = title-like, higher = less prominent); `None` for
    /// non-heading paragraphs.
    pub level: Option<u8>,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Text,
    Heading,
    List,
    Table,
    Header,
    Footer,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub block_type: BlockType,
    pub reading_order: u32,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub row: u32,
    pub col: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub bbox: BoundingBox,
    pub rows: u32,
    pub cols: u32,
    pub cells: Vec<TableCell>,
    pub has_header_row: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub key_bbox: BoundingBox,
    pub value_bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmartField {
    pub field_name: String,
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotableEntityType {
    Email,
    Phone,
    Url,
    Ipv4,
    Date,
    Iban,
    Btw,
    Swift,
    Ein,
    Vat,
    Percentage,
    CreditCard,
    Ssn,
    ReferenceNumber,
    SerialNumber,
    RoutingNumber,
    CurrencyAmount,
}

/// An extracted entity. `raw_value` is never serialized directly —
/// call sites must go through [`NotableEntity::display_value`], which masks
/// sensitive types (credit card, SSN).
#[derive(Debug, Clone, ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct NotableEntity {
    pub entity_type: NotableEntityType,
    #[schema(rename = "value")]
    pub raw_value: String,
    pub confidence: f64,
}

impl NotableEntity {
    pub fn display_value(&self) -> String {
        match self.entity_type {
            NotableEntityType::CreditCard => mask_credit_card(&self.raw_value),
            NotableEntityType::Ssn => mask_ssn(&self.raw_value),
            _ => self.raw_value.clone(),
        }
    }
}

/// `****-****-****-NNNN` — matches the spec's Glossary example literally.
fn mask_credit_card(value: &str) -> String {
    mask_grouped(value, &[4, 4, 4])
}

/// `***-**-NNNN` — same grouping as an SSN's own digit layout.
fn mask_ssn(value: &str) -> String {
    mask_grouped(value, &[3, 2])
}

fn mask_grouped(value: &str, group_sizes: &[usize]) -> String {
    let digits: Vec<char> = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let last4: String = digits[digits.len() - 4..].iter().collect();
    let mut groups: Vec<String> = group_sizes.iter().map(|n| "*".repeat(*n)).collect();
    groups.push(last4);
    groups.join("-")
}

impl Serialize for NotableEntity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("NotableEntity", 3)?;
        s.serialize_field("entityType", &self.entity_type)?;
        s.serialize_field("value", &self.display_value())?;
        s.serialize_field("confidence", &self.confidence)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for NotableEntity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            entity_type: NotableEntityType,
            value: String,
            confidence: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(NotableEntity {
            entity_type: raw.entity_type,
            raw_value: raw.value,
            confidence: raw.confidence,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotableData {
    pub entities: Vec<NotableEntity>,
    pub currency_amounts: Vec<NotableEntity>,
    pub dates: Vec<NotableEntity>,
    pub identifiers: Vec<NotableEntity>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    pub columns: u32,
    pub has_header: bool,
    pub has_footer: bool,
    pub text_density: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    pub title: Option<String>,
    pub headings: Vec<String>,
    pub lists: Vec<Vec<String>>,
    pub tables: Vec<Table>,
    pub key_value_pairs: Vec<KeyValuePair>,
    pub smart_fields: Vec<SmartField>,
    pub notable_data: NotableData,
    pub document_type: String,
    pub page_layout: PageLayout,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub language: String,
    pub processing_time_ms: u64,
    pub page_count: Option<u32>,
    pub word_count: u64,
    pub line_count: u64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OcrResultDocument {
    pub text: String,
    pub confidence: f64,
    pub blocks: Vec<Block>,
    pub structure: Structure,
    pub metadata: ResultMetadata,
}

// ---------------------------------------------------------------------------
// HTTP DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub document_type: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&JobRow> for StatusResponse {
    fn from(row: &JobRow) -> Self {
        Self {
            id: row.id,
            status: row.status(),
            document_type: row.document_type.clone(),
            email: row.email.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            ocr_result: row
                .ocr_result
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            error_message: row.error_message.clone(),
            processed_at: row.processed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminJobSummary {
    pub id: Uuid,
    pub status: JobStatus,
    pub document_type: String,
    pub email: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Milliseconds between `created_at` and `processed_at`, if terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<i64>,
    pub is_stuck: bool,
    pub age_seconds: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminJobListResponse {
    pub jobs: Vec<AdminJobSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminJobDetail {
    pub id: Uuid,
    pub status: JobStatus,
    pub document_type: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_webhook: Option<String>,
    pub file_name: String,
    pub mime_type: String,
    pub file_size_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&JobRow> for AdminJobDetail {
    fn from(row: &JobRow) -> Self {
        Self {
            id: row.id,
            status: row.status(),
            document_type: row.document_type.clone(),
            email: row.email.clone(),
            callback_webhook: row.callback_webhook.clone(),
            file_name: row.file_name.clone(),
            mime_type: row.mime_type.clone(),
            file_size_bytes: row.file_data.len() as i64,
            ocr_result: row
                .ocr_result
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            error_message: row.error_message.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            processed_at: row.processed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsResponse {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub created_last_hour: i64,
    pub stuck_job_ids: Vec<Uuid>,
    pub avg_processing_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchJobRequest {
    pub status: JobStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrorDetail {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrorResponse {
    pub error: String,
    pub details: Vec<ValidationErrorDetail>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteJobResponse {
    pub message: String,
    pub id: Uuid,
}
