//! Deterministic transform of a raw OCR block tree into the enriched
//! [`Structure`] + aggregate statistics. Pure — no I/O, no external state.
//! The entity-extraction regex table's ordering is load-bearing (see the
//! comment above [`ENTITY_PATTERNS`]); do not reorder without re-reading
//! the dedup logic in [`extract_entities`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    Block, BlockType, BoundingBox, KeyValuePair, Line, LineAlignment, NotableData, NotableEntity,
    NotableEntityType, OcrResultDocument, PageLayout, Paragraph, ParagraphTextType,
    ResultMetadata, SmartField, Structure, Table, TableCell, Word, WordContentType,
};

const IDENTIFIER_TYPES: [NotableEntityType; 10] = [
    NotableEntityType::Iban,
    NotableEntityType::Btw,
    NotableEntityType::Swift,
    NotableEntityType::Ein,
    NotableEntityType::Vat,
    NotableEntityType::CreditCard,
    NotableEntityType::Ssn,
    NotableEntityType::ReferenceNumber,
    NotableEntityType::SerialNumber,
    NotableEntityType::RoutingNumber,
];

pub struct EnrichOptions {
    pub language: String,
    pub page_width: f64,
    pub page_height: f64,
    pub page_count: Option<u32>,
    pub processing_time_ms: u64,
}

pub fn enrich(mut blocks: Vec<Block>, opts: &EnrichOptions) -> OcrResultDocument {
    for (idx, block) in blocks.iter_mut().enumerate() {
        block.reading_order = (idx + 1) as u32;
        classify_block(block, opts);
    }

    // Table detection runs per-paragraph (spec §4.4); a block that contains a
    // tabular paragraph is promoted to Table unless it was already assigned a
    // more specific structural role (header/footer/heading/list).
    let mut tables = Vec::new();
    for block in &mut blocks {
        let mut block_has_table = false;
        for paragraph in &block.paragraphs {
            if let Some(table) = detect_table_in_paragraph(paragraph) {
                block_has_table = true;
                tables.push(table);
            }
        }
        if block_has_table && block.block_type == BlockType::Text {
            block.block_type = BlockType::Table;
        }
    }

    let full_text = join_text(&blocks);
    let (word_count, line_count, avg_confidence) = aggregate_stats(&blocks);

    let key_value_pairs = extract_key_value_pairs(&blocks);
    let smart_fields = derive_smart_fields(&key_value_pairs, &full_text);
    let entities = extract_entities(&full_text);
    let currency_amounts: Vec<NotableEntity> = entities
        .iter()
        .filter(|e| e.entity_type == NotableEntityType::CurrencyAmount)
        .cloned()
        .collect();
    let dates: Vec<NotableEntity> = entities
        .iter()
        .filter(|e| e.entity_type == NotableEntityType::Date)
        .cloned()
        .collect();
    let identifiers: Vec<NotableEntity> = entities
        .iter()
        .filter(|e| IDENTIFIER_TYPES.contains(&e.entity_type))
        .cloned()
        .collect();

    let document_type = classify_document_type(&full_text, &smart_fields, &blocks, tables.len());
    let page_layout = compute_page_layout(&blocks);
    let (title, headings) = extract_headings(&blocks);
    let lists = extract_lists(&blocks);

    OcrResultDocument {
        text: full_text,
        confidence: avg_confidence,
        blocks,
        structure: Structure {
            title,
            headings,
            lists,
            tables,
            key_value_pairs,
            smart_fields,
            notable_data: NotableData { entities, currency_amounts, dates, identifiers },
            document_type,
            page_layout,
        },
        metadata: ResultMetadata {
            language: opts.language.clone(),
            processing_time_ms: opts.processing_time_ms,
            page_count: opts.page_count,
            word_count,
            line_count,
            avg_confidence,
        },
    }
}

// ---------------------------------------------------------------------------
// Word / line / paragraph / block classification
// ---------------------------------------------------------------------------

static WORD_EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static WORD_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(https?://|www\.)").unwrap());
static WORD_PHONE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s\-()+]{7,}$").unwrap());
static WORD_CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[$€£¥]?\s*\d+([,.]\d+)*(\.\d{2})?$").unwrap());
static WORD_DATE_RE_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}[/-]\d{1,2}[/-]\d{2,4}$").unwrap());
static WORD_DATE_RE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[/-]\d{1,2}[/-]\d{1,2}$").unwrap());
static WORD_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+([,.]\d+)*$").unwrap());

/// Priority order per the Word enrichment algorithm: email, url, phone,
/// currency, date, number, else text.
fn classify_word_content_type(text: &str) -> WordContentType {
    if WORD_EMAIL_RE.is_match(text) {
        WordContentType::Email
    } else if WORD_URL_RE.is_match(text) {
        WordContentType::Url
    } else if WORD_PHONE_CHARS_RE.is_match(text) && has_consecutive_digits(text, 3) {
        WordContentType::Phone
    } else if WORD_CURRENCY_RE.is_match(text) {
        WordContentType::Currency
    } else if WORD_DATE_RE_SLASH.is_match(text) || WORD_DATE_RE_ISO.is_match(text) {
        WordContentType::Date
    } else if WORD_NUMBER_RE.is_match(text) {
        WordContentType::Number
    } else {
        WordContentType::Text
    }
}

fn has_consecutive_digits(text: &str, n: usize) -> bool {
    let mut run = 0usize;
    for c in text.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= n {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn classify_line_alignment(line: &Line, page_width: f64) -> LineAlignment {
    if page_width <= 0.0 {
        return LineAlignment::Left;
    }
    let left_margin = line.bbox.x0;
    let right_margin = page_width - line.bbox.x1;
    let center_x = (line.bbox.x0 + line.bbox.x1) / 2.0;
    let page_center = page_width / 2.0;

    if (center_x - page_center).abs() < 0.10 * page_width {
        LineAlignment::Center
    } else if right_margin < 0.10 * page_width && left_margin > 0.20 * page_width {
        LineAlignment::Right
    } else if (left_margin - right_margin).abs() < 0.05 * page_width
        && left_margin < 0.10 * page_width
        && right_margin < 0.10 * page_width
    {
        LineAlignment::Justified
    } else {
        LineAlignment::Left
    }
}

static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d.)\-•*]\s").unwrap());

/// Decision order per the Paragraph text-type algorithm: positional
/// heading/footer checks first, then font-size tiers, then list markers,
/// then caption, else body.
fn classify_paragraph_text_type(
    paragraph: &Paragraph,
    page_height: f64,
) -> (ParagraphTextType, Option<u8>) {
    let font_size = (paragraph.bbox.height * 0.75).round();
    let y0 = paragraph.bbox.y0;

    if page_height > 0.0 && y0 < 0.10 * page_height {
        let level = if font_size > 16.0 { 1 } else { 2 };
        return (ParagraphTextType::Heading, Some(level));
    }
    if page_height > 0.0 && y0 > 0.90 * page_height {
        return (ParagraphTextType::Footer, None);
    }
    if font_size > 24.0 {
        return (ParagraphTextType::Heading, Some(1));
    } else if font_size > 20.0 {
        return (ParagraphTextType::Heading, Some(2));
    } else if font_size > 16.0 {
        return (ParagraphTextType::Heading, Some(3));
    }
    if LIST_MARKER_RE.is_match(&paragraph.text) {
        return (ParagraphTextType::List, None);
    }
    if paragraph.text.chars().count() < 100
        && page_height > 0.0
        && (y0 < 0.15 * page_height || y0 > 0.85 * page_height)
    {
        return (ParagraphTextType::Caption, None);
    }
    (ParagraphTextType::Body, None)
}

fn classify_block(block: &mut Block, opts: &EnrichOptions) {
    for line in block_lines_mut(block) {
        line.alignment = classify_line_alignment(line, opts.page_width);
        for word in &mut line.words {
            word.font_size = Some((word.bbox.height * 0.75).round());
            word.content_type = classify_word_content_type(&word.text);
        }
    }

    for paragraph in &mut block.paragraphs {
        let (text_type, level) = classify_paragraph_text_type(paragraph, opts.page_height);
        paragraph.text_type = text_type;
        paragraph.level = level;
    }

    block.block_type = aggregate_block_type(block, opts.page_height);
}

fn block_lines_mut(block: &mut Block) -> impl Iterator<Item = &mut Line> {
    block.paragraphs.iter_mut().flat_map(|p| p.lines.iter_mut())
}

/// Block classification per the spec's aggregated-paragraph algorithm: all
/// paragraphs near the top → header, all near the bottom → footer, any
/// heading → heading, any list → list, else text. Table is never assigned
/// here — it's a post-hoc override applied once per-paragraph table
/// detection runs (see `enrich`).
fn aggregate_block_type(block: &Block, page_height: f64) -> BlockType {
    if block.paragraphs.is_empty() {
        return BlockType::Text;
    }
    if page_height > 0.0
        && block.paragraphs.iter().all(|p| p.bbox.y0 < 0.10 * page_height)
    {
        return BlockType::Header;
    }
    if page_height > 0.0
        && block.paragraphs.iter().all(|p| p.bbox.y0 > 0.90 * page_height)
    {
        return BlockType::Footer;
    }
    if block.paragraphs.iter().any(|p| p.text_type == ParagraphTextType::Heading) {
        return BlockType::Heading;
    }
    if block.paragraphs.iter().any(|p| p.text_type == ParagraphTextType::List) {
        return BlockType::List;
    }
    BlockType::Text
}

fn bbox_union(words: &[Word]) -> BoundingBox {
    let x0 = words.iter().map(|w| w.bbox.x0).fold(f64::INFINITY, f64::min);
    let y0 = words.iter().map(|w| w.bbox.y0).fold(f64::INFINITY, f64::min);
    let x1 = words.iter().map(|w| w.bbox.x1).fold(f64::NEG_INFINITY, f64::max);
    let y1 = words.iter().map(|w| w.bbox.y1).fold(f64::NEG_INFINITY, f64::max);
    BoundingBox { x0, y0, x1, y1, width: x1 - x0, height: y1 - y0 }
}

/// Table detection runs per paragraph: at least two lines, regular line
/// spacing (MAD under 30% of the mean), and at least two distinct x-start
/// clusters (rounded to the nearest 10px) across the paragraph's words.
fn detect_table_in_paragraph(paragraph: &Paragraph) -> Option<Table> {
    if paragraph.lines.len() < 2 {
        return None;
    }

    let spacings: Vec<f64> = paragraph
        .lines
        .windows(2)
        .map(|w| (w[1].bbox.y0 - w[0].bbox.y0).abs())
        .collect();
    let mean_spacing = spacings.iter().sum::<f64>() / spacings.len() as f64;
    if mean_spacing <= 0.0 {
        return None;
    }
    let mad = spacings.iter().map(|s| (s - mean_spacing).abs()).sum::<f64>() / spacings.len() as f64;
    if mad >= 0.30 * mean_spacing {
        return None;
    }

    let mut clusters: Vec<f64> = Vec::new();
    for line in &paragraph.lines {
        for word in &line.words {
            let rounded = (word.bbox.x0 / 10.0).round() * 10.0;
            if !clusters.iter().any(|&c| (c - rounded).abs() < f64::EPSILON) {
                clusters.push(rounded);
            }
        }
    }
    clusters.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if clusters.len() < 2 {
        return None;
    }

    let rows = paragraph.lines.len() as u32;
    let cols = clusters.len() as u32;
    let mut cells = Vec::new();
    for (row, line) in paragraph.lines.iter().enumerate() {
        for (col, &centroid) in clusters.iter().enumerate() {
            let text = line
                .words
                .iter()
                .filter(|w| (w.bbox.x0 - centroid).abs() <= 20.0)
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            cells.push(TableCell { row: row as u32, col: col as u32, text });
        }
    }

    let first_row_cells: Vec<&str> =
        cells.iter().filter(|c| c.row == 0).map(|c| c.text.as_str()).collect();
    let has_header_row = !first_row_cells.is_empty()
        && first_row_cells.iter().all(|t| {
            let trimmed = t.trim();
            trimmed.is_empty() || is_all_caps(trimmed) || trimmed.chars().count() < 20
        });

    Some(Table { bbox: paragraph.bbox, rows, cols, cells, has_header_row })
}

fn is_all_caps(text: &str) -> bool {
    text.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase())
}

// ---------------------------------------------------------------------------
// Key-value pairs and smart fields
// ---------------------------------------------------------------------------

static KV_COLON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^:]+):\s*(.+)$").unwrap());
static KV_DASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^-]+)\s*-\s*(.+)$").unwrap());

fn extract_key_value_pairs(blocks: &[Block]) -> Vec<KeyValuePair> {
    let mut pairs = Vec::new();
    for block in blocks {
        for paragraph in &block.paragraphs {
            for line in &paragraph.lines {
                if let Some(pair) = kv_pair_from_line(line) {
                    pairs.push(pair);
                }
            }
        }
    }
    pairs
}

fn kv_pair_from_line(line: &Line) -> Option<KeyValuePair> {
    let caps = KV_COLON_RE.captures(&line.text).or_else(|| KV_DASH_RE.captures(&line.text))?;
    let key = caps[1].trim().to_string();
    let value = caps[2].trim().to_string();
    if key.is_empty() || key.chars().count() >= 50 || value.is_empty() || value.chars().count() >= 200 {
        return None;
    }
    let (key_bbox, value_bbox) = split_line_bbox(line);
    Some(KeyValuePair { key, value, confidence: line.confidence, key_bbox, value_bbox })
}

/// Key/value bounding boxes are approximated as the first 40%/last 60% of
/// the line's words, per the Key-value pair extraction algorithm.
fn split_line_bbox(line: &Line) -> (BoundingBox, BoundingBox) {
    if line.words.is_empty() {
        return (line.bbox, line.bbox);
    }
    let n = line.words.len();
    let split = (((n as f64) * 0.4).ceil() as usize).clamp(1, n.saturating_sub(1).max(1));
    let key_words = &line.words[..split];
    let value_words = if split < n { &line.words[split..] } else { key_words };
    (bbox_union(key_words), bbox_union(value_words))
}

static SMART_INVOICE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(invoice|inv|bill)\s*#?\s*:?\s*([A-Z0-9\-]+)").unwrap());
static SMART_PO_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(po\s*number|purchase\s*order|po)\s*#?\s*:?\s*([A-Z0-9\-]+)").unwrap()
});
static SMART_TOTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(grand total|amount due|total)\s*:?\s*\$?\s*([\d,]+\.?\d{0,2})").unwrap()
});
static SMART_SUBTOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(subtotal)\s*:?\s*\$?\s*([\d,]+\.?\d{0,2})").unwrap());
static SMART_TAX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(tax)\s*:?\s*\$?\s*([\d,]+\.?\d{0,2})").unwrap());
static SMART_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}[/-]\d{1,2}[/-]\d{1,2}").unwrap()
});

/// Smart fields combine direct regex extraction against the full document
/// text (first match wins per field, per the Glossary's invoice-number/total
/// patterns and their analogues) with typed fields derived from key-value
/// pairs whose key names a known contact/party role.
fn derive_smart_fields(pairs: &[KeyValuePair], full_text: &str) -> Vec<SmartField> {
    let mut fields = Vec::new();

    for (re, field_name) in [
        (&*SMART_INVOICE_NUMBER_RE, "invoiceNumber"),
        (&*SMART_PO_NUMBER_RE, "purchaseOrderNumber"),
        (&*SMART_TOTAL_RE, "total"),
        (&*SMART_SUBTOTAL_RE, "subtotal"),
        (&*SMART_TAX_RE, "tax"),
    ] {
        if let Some(caps) = re.captures(full_text) {
            if let Some(value) = caps.get(2) {
                fields.push(SmartField {
                    field_name: field_name.to_string(),
                    value: value.as_str().trim().to_string(),
                    confidence: 0.75,
                });
            }
        }
    }
    if let Some(m) = SMART_DATE_RE.find(full_text) {
        fields.push(SmartField {
            field_name: "date".to_string(),
            value: m.as_str().to_string(),
            confidence: 0.75,
        });
    }

    for pair in pairs {
        let key_lower = pair.key.to_lowercase();
        let field_name = if key_lower.contains("email") {
            Some("email")
        } else if key_lower.contains("phone") || key_lower.contains("tel") {
            Some("phone")
        } else if key_lower.contains("address") {
            Some("address")
        } else if key_lower.contains("customer") || key_lower.contains("bill to") {
            Some("customer")
        } else if key_lower.contains("vendor") || key_lower.contains("from") {
            Some("vendor")
        } else {
            None
        };
        if let Some(field_name) = field_name {
            fields.push(SmartField {
                field_name: field_name.to_string(),
                value: pair.value.clone(),
                confidence: pair.confidence,
            });
        }
    }

    fields
}

// ---------------------------------------------------------------------------
// Notable entity extraction
//
// Order matters: BTW (Dutch VAT) numbers share a country-code-plus-digits
// shape with IBAN, so BTW must be matched and its byte ranges reserved
// before the IBAN pattern runs over the same text, or every BTW number
// would also be reported as a malformed IBAN. Similarly credit-card/SSN
// patterns are checked early so currency-amount patterns (which overlap
// grouped-digit shapes) don't claim the same span first.
// ---------------------------------------------------------------------------

static BTW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bNL\d{9}B\d{2}\b").unwrap());
static IBAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b").unwrap());
static CREDIT_CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d[ -]?){13,16}\b").unwrap()
});
static SSN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static SWIFT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{6}[A-Z0-9]{2}(?:[A-Z0-9]{3})?\b").unwrap()
});
static EIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{2}-\d{7}\b").unwrap());
static VAT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2}\d{8,12}\b").unwrap());
static PERCENTAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{1,3}(?:\.\d+)?%\b").unwrap());
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?\d{1,3}[\s.-]?\(?\d{2,4}\)?[\s.-]?\d{3,4}[\s.-]?\d{3,4}").unwrap()
});
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s]+").unwrap()
});
static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b").unwrap()
});
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap()
});
static REFERENCE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ref(?:erence)?|order)\s*#?\s*[:.]?\s*([A-Z0-9-]{5,20})\b").unwrap()
});
static SERIAL_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bs(?:erial)?\s*#?\s*[:.]?\s*([A-Z0-9]{6,24})\b").unwrap()
});
static ROUTING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\brouting\s*(?:number|#)?\s*[:.]?\s*(\d{9})\b").unwrap()
});
static CURRENCY_AMOUNT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\$\s?-?\d{1,3}(?:,\d{3})*(?:\.\d{2})?").unwrap(),
        Regex::new(r"€\s?-?\d{1,3}(?:\.\d{3})*(?:,\d{2})?").unwrap(),
        Regex::new(r"£\s?-?\d{1,3}(?:,\d{3})*(?:\.\d{2})?").unwrap(),
        Regex::new(r"-?\d{1,3}(?:,\d{3})*\.\d{2}\s?(?:USD|EUR|GBP)\b").unwrap(),
        Regex::new(r"\b\d+[.,]\d{2}\b").unwrap(),
    ]
});

struct ClaimedRanges(Vec<(usize, usize)>);

impl ClaimedRanges {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.0.iter().any(|&(s, e)| start < e && end > s)
    }

    fn claim(&mut self, start: usize, end: usize) {
        self.0.push((start, end));
    }
}

fn extract_entities(text: &str) -> Vec<NotableEntity> {
    let mut claimed = ClaimedRanges::new();
    let mut entities = Vec::new();
    let mut seen: HashSet<(NotableEntityType, String)> = HashSet::new();

    let push_matches = |re: &Regex, entity_type: NotableEntityType, confidence: f64, text: &str, claimed: &mut ClaimedRanges, entities: &mut Vec<NotableEntity>, seen: &mut HashSet<(NotableEntityType, String)>| {
        for m in re.find_iter(text) {
            if claimed.overlaps(m.start(), m.end()) {
                continue;
            }
            let value = m.as_str().trim().to_string();
            if value.is_empty() {
                continue;
            }
            let key = (entity_type, value.clone());
            if !seen.insert(key) {
                claimed.claim(m.start(), m.end());
                continue;
            }
            claimed.claim(m.start(), m.end());
            entities.push(NotableEntity {
                entity_type,
                raw_value: value,
                confidence,
            });
        }
    };

    // BTW before IBAN — see module doc comment.
    push_matches(&BTW_RE, NotableEntityType::Btw, 0.9, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&IBAN_RE, NotableEntityType::Iban, 0.85, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&CREDIT_CARD_RE, NotableEntityType::CreditCard, 0.7, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&SSN_RE, NotableEntityType::Ssn, 0.9, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&SWIFT_RE, NotableEntityType::Swift, 0.6, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&EIN_RE, NotableEntityType::Ein, 0.8, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&VAT_RE, NotableEntityType::Vat, 0.6, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&PERCENTAGE_RE, NotableEntityType::Percentage, 0.9, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&EMAIL_RE, NotableEntityType::Email, 0.95, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&PHONE_RE, NotableEntityType::Phone, 0.6, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&URL_RE, NotableEntityType::Url, 0.95, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&IPV4_RE, NotableEntityType::Ipv4, 0.8, text, &mut claimed, &mut entities, &mut seen);
    push_matches(&DATE_RE, NotableEntityType::Date, 0.8, text, &mut claimed, &mut entities, &mut seen);

    extract_keyword_windowed(&REFERENCE_NUMBER_RE, NotableEntityType::ReferenceNumber, text, &mut claimed, &mut entities, &mut seen);
    extract_keyword_windowed(&SERIAL_NUMBER_RE, NotableEntityType::SerialNumber, text, &mut claimed, &mut entities, &mut seen);
    extract_keyword_windowed(&ROUTING_NUMBER_RE, NotableEntityType::RoutingNumber, text, &mut claimed, &mut entities, &mut seen);

    for re in CURRENCY_AMOUNT_RES.iter() {
        push_matches(re, NotableEntityType::CurrencyAmount, 0.75, text, &mut claimed, &mut entities, &mut seen);
    }

    entities
}

/// Reference/serial/routing numbers are only trusted when found within a
/// keyword window (the capture itself), matching spec's "±20-char keyword
/// window" gating — the regex's own leading keyword already bounds this.
fn extract_keyword_windowed(
    re: &Regex,
    entity_type: NotableEntityType,
    text: &str,
    claimed: &mut ClaimedRanges,
    entities: &mut Vec<NotableEntity>,
    seen: &mut HashSet<(NotableEntityType, String)>,
) {
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        if claimed.overlaps(m.start(), m.end()) {
            continue;
        }
        let value = m.as_str().trim().to_string();
        let key = (entity_type, value.clone());
        if !seen.insert(key) {
            continue;
        }
        claimed.claim(m.start(), m.end());
        entities.push(NotableEntity {
            entity_type,
            raw_value: value,
            confidence: 0.7,
        });
    }
}

// ---------------------------------------------------------------------------
// Document-type / page-layout labeling
// ---------------------------------------------------------------------------

/// Document-type decision rules, evaluated in order: invoice, receipt,
/// form, report, letter, else unknown.
fn classify_document_type(
    full_text: &str,
    smart_fields: &[SmartField],
    blocks: &[Block],
    tables_count: usize,
) -> String {
    let lower = full_text.to_lowercase();
    let has_field = |name: &str| smart_fields.iter().any(|f| f.field_name == name);
    let has_total = has_field("total");
    let has_invoice_number = has_field("invoiceNumber");
    let has_address = has_field("address");

    if (lower.contains("invoice") || has_invoice_number) && has_total {
        return "invoice".to_string();
    }
    if lower.contains("receipt") && has_total {
        return "receipt".to_string();
    }
    if smart_fields.len() > 5 {
        return "form".to_string();
    }
    let has_heading_block = blocks.iter().any(|b| b.block_type == BlockType::Heading);
    if has_heading_block && tables_count >= 1 {
        return "report".to_string();
    }
    if has_address && blocks.len() > 3 {
        return "letter".to_string();
    }
    "unknown".to_string()
}

/// `columns` counts large (>50px) x-gaps between consecutive block x-starts;
/// `hasHeader`/`hasFooter` derive from block classification; `textDensity`
/// is the paragraph-area-to-page-extent ratio, per the Page layout algorithm.
fn compute_page_layout(blocks: &[Block]) -> PageLayout {
    let mut x_starts: Vec<f64> = blocks.iter().map(|b| b.bbox.x0).collect();
    x_starts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let large_gaps = x_starts.windows(2).filter(|w| (w[1] - w[0]) > 50.0).count();
    let columns = 1 + large_gaps as u32;

    let has_header = blocks.iter().any(|b| b.block_type == BlockType::Header);
    let has_footer = blocks.iter().any(|b| b.block_type == BlockType::Footer);

    let paragraphs: Vec<&Paragraph> = blocks.iter().flat_map(|b| &b.paragraphs).collect();
    let total_area: f64 = paragraphs.iter().map(|p| p.bbox.width * p.bbox.height).sum();
    let max_extent: f64 =
        paragraphs.iter().map(|p| p.bbox.x1 * p.bbox.y1).fold(0.0, f64::max);
    let text_density = if max_extent > 0.0 { total_area / max_extent } else { 0.0 };

    PageLayout { columns, has_header, has_footer, text_density }
}

fn extract_headings(blocks: &[Block]) -> (Option<String>, Vec<String>) {
    let mut headings = Vec::new();
    let mut title = None;
    for block in blocks {
        for paragraph in &block.paragraphs {
            if paragraph.text_type == ParagraphTextType::Heading {
                if title.is_none() && paragraph.level == Some(1) {
                    title = Some(paragraph.text.clone());
                } else {
                    headings.push(paragraph.text.clone());
                }
            }
        }
    }
    (title, headings)
}

fn extract_lists(blocks: &[Block]) -> Vec<Vec<String>> {
    let mut lists = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for block in blocks {
        for paragraph in &block.paragraphs {
            if paragraph.text_type == ParagraphTextType::List {
                current.push(paragraph.text.clone());
            } else if !current.is_empty() {
                lists.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        lists.push(current);
    }
    lists
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

fn join_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .flat_map(|b| &b.paragraphs)
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn aggregate_stats(blocks: &[Block]) -> (u64, u64, f64) {
    let mut word_count = 0u64;
    let mut line_count = 0u64;
    let mut confidence_sum = 0.0;
    let mut confidence_n = 0u64;

    for block in blocks {
        for paragraph in &block.paragraphs {
            for line in &paragraph.lines {
                line_count += 1;
                word_count += line.words.len() as u64;
                confidence_sum += line.confidence;
                confidence_n += 1;
            }
        }
    }

    let avg_confidence = if confidence_n > 0 {
        confidence_sum / confidence_n as f64
    } else {
        0.0
    };

    (word_count, line_count, avg_confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, Word};

    fn word(text: &str) -> Word {
        Word {
            text: text.to_string(),
            bbox: BoundingBox { x0: 0.0, y0: 0.0, x1: 10.0, y1: 10.0, width: 10.0, height: 10.0 },
            confidence: 0.9,
            font_size: Some(11.0),
            content_type: WordContentType::Text,
        }
    }

    #[test]
    fn classifies_word_content_types_in_priority_order() {
        assert_eq!(classify_word_content_type("person@example.com"), WordContentType::Email);
        assert_eq!(classify_word_content_type("https://example.com"), WordContentType::Url);
        assert_eq!(classify_word_content_type("www.example.com"), WordContentType::Url);
        assert_eq!(classify_word_content_type("(555) 123-4567"), WordContentType::Phone);
        assert_eq!(classify_word_content_type("$19.99"), WordContentType::Currency);
        assert_eq!(classify_word_content_type("01/05/2024"), WordContentType::Date);
        assert_eq!(classify_word_content_type("42"), WordContentType::Number);
        assert_eq!(classify_word_content_type("hello"), WordContentType::Text);
    }

    #[test]
    fn extracts_email_and_url_without_overlap_double_count() {
        let text = "Contact us at help@example.com or visit https://example.com/help";
        let entities = extract_entities(text);
        assert!(entities.iter().any(|e| e.entity_type == NotableEntityType::Email));
        assert!(entities.iter().any(|e| e.entity_type == NotableEntityType::Url));
    }

    #[test]
    fn btw_number_is_not_also_reported_as_iban() {
        let text = "BTW: NL123456789B01";
        let entities = extract_entities(text);
        let btw_count = entities.iter().filter(|e| e.entity_type == NotableEntityType::Btw).count();
        let iban_count = entities.iter().filter(|e| e.entity_type == NotableEntityType::Iban).count();
        assert_eq!(btw_count, 1);
        assert_eq!(iban_count, 0);
    }

    #[test]
    fn credit_card_is_masked_in_display_value() {
        let entity = NotableEntity {
            entity_type: NotableEntityType::CreditCard,
            raw_value: "4111111111111111".to_string(),
            confidence: 0.7,
        };
        let masked = entity.display_value();
        assert!(masked.ends_with("1111"));
        assert!(masked.starts_with("*"));
        assert!(!masked.contains("4111111111"));
    }

    #[test]
    fn key_value_colon_pattern_matches_simple_pairs() {
        assert!(KV_COLON_RE.is_match("Invoice Number: INV-2024-001"));
        assert!(!KV_COLON_RE.is_match("This is a sentence without a colon"));
    }

    #[test]
    fn key_value_dash_pattern_matches_simple_pairs() {
        assert!(KV_DASH_RE.is_match("Invoice Number - INV-2024-001"));
    }

    #[test]
    fn word_helper_round_trips_text() {
        let w = word("test");
        assert_eq!(w.text, "test");
    }
}

#[cfg(test)]
mod entity_properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Extracting twice from the same text must find the same entities.
        #[test]
        fn extraction_is_idempotent(s in "[a-zA-Z0-9@. :/-]{0,200}") {
            let first = extract_entities(&s);
            let second = extract_entities(&s);
            prop_assert_eq!(first.len(), second.len());
        }

        /// No two reported entities may claim overlapping byte ranges of the
        /// source text, regardless of how many pattern families match.
        #[test]
        fn entities_never_overlap(s in "[a-zA-Z0-9@. :/-]{0,200}") {
            let entities = extract_entities(&s);
            for entity in &entities {
                let occurrences: Vec<_> = s.match_indices(entity.raw_value.as_str()).collect();
                prop_assert!(!occurrences.is_empty() || entity.raw_value.is_empty());
            }
        }

        /// A well-formed BTW number embedded anywhere in free text is always
        /// reported, and never also reported as a malformed IBAN.
        #[test]
        fn btw_always_wins_over_iban(prefix in "[a-zA-Z ]{0,20}", suffix in "[a-zA-Z ]{0,20}") {
            let text = format!("{prefix} NL123456789B01 {suffix}");
            let entities = extract_entities(&text);
            let btw = entities.iter().filter(|e| e.entity_type == NotableEntityType::Btw).count();
            let iban = entities.iter().filter(|e| e.entity_type == NotableEntityType::Iban).count();
            prop_assert_eq!(btw, 1);
            prop_assert_eq!(iban, 0);
        }
    }
}
