//! Per-job pipeline executed by the scheduler's worker pool: re-validate →
//! OCR → enrich → finalize → best-effort webhook. Grounded on the
//! `JobHandler`/`JobExecution` shape from
//! `other_examples/.../papercrate__backend-crates-server-src-workers-ocr.rs.rs`
//! and the PDF text/image branching it performs before dispatching to OCR.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::enricher::{self, EnrichOptions};
use crate::models::JobRow;
use crate::ocr_engine::OcrEngine;
use crate::pdf::{self, PdfContent};
use crate::store::Store;
use crate::validator;
use crate::webhook::WebhookSink;

const JOB_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_LANGUAGE: &str = "en";

pub struct WorkerContext {
    pub store: Store,
    pub engine: Arc<dyn OcrEngine>,
    pub webhook_sink: Arc<WebhookSink>,
    pub app_domain: String,
    pub pdf_page_concurrency: usize,
}

pub async fn run(ctx: Arc<WorkerContext>, job: JobRow) {
    let job_id = job.id;
    let started = Instant::now();

    let outcome = tokio::time::timeout(JOB_TIMEOUT, process(&ctx, &job)).await;

    match outcome {
        Ok(Ok(ocr_result_json)) => {
            match ctx.store.finalize_completed(job_id, &ocr_result_json.to_string()).await {
                Ok(true) => {
                    tracing::info!(%job_id, elapsed_ms = started.elapsed().as_millis(), "job completed");
                    maybe_send_webhook(&ctx, &job, &ocr_result_json).await;
                }
                Ok(false) => {
                    tracing::warn!(%job_id, "finalize_completed affected zero rows (job deleted mid-flight?)");
                }
                Err(e) => tracing::error!(%job_id, error = %e, "failed to persist completed job"),
            }
        }
        Ok(Err(message)) => {
            if let Err(e) = ctx.store.finalize_failed(job_id, &message).await {
                tracing::error!(%job_id, error = %e, "failed to persist failed job");
            } else {
                tracing::warn!(%job_id, %message, "job failed");
            }
        }
        Err(_) => {
            let message = "Processing timeout exceeded".to_string();
            if let Err(e) = ctx.store.finalize_failed(job_id, &message).await {
                tracing::error!(%job_id, error = %e, "failed to persist timed-out job");
            } else {
                tracing::warn!(%job_id, "job timed out");
            }
        }
    }
}

async fn process(ctx: &WorkerContext, job: &JobRow) -> Result<serde_json::Value, String> {
    // Re-validate stored bytes/MIME as defense in depth — the file may
    // have been re-derived or the store compromised between ingest and
    // dispatch.
    validator::validate_file(&job.file_data, &job.mime_type).map_err(|e| e.to_string())?;

    let start = Instant::now();

    let ocr_pages = if job.mime_type == "application/pdf" {
        match pdf::classify_and_extract(&job.file_data).map_err(|e| e.to_string())? {
            PdfContent::Text(text) => {
                return Ok(text_pdf_result(&text, start.elapsed()));
            }
            PdfContent::Images(pages) => {
                pdf::recognize_pages(ctx.engine.as_ref(), &pages, DEFAULT_LANGUAGE, ctx.pdf_page_concurrency)
                    .await
                    .map_err(|e| e.to_string())?
            }
        }
    } else {
        let page = ctx
            .engine
            .recognize_page(&job.file_data, DEFAULT_LANGUAGE)
            .await
            .map_err(|e| e.to_string())?;
        vec![page]
    };

    let blocks = ocr_pages.into_iter().flat_map(|p| p.blocks).collect::<Vec<_>>();

    let opts = EnrichOptions {
        language: DEFAULT_LANGUAGE.to_string(),
        page_width: 2480.0,
        page_height: 3508.0,
        page_count: None,
        processing_time_ms: start.elapsed().as_millis() as u64,
    };

    let result = enricher::enrich(blocks, &opts);
    serde_json::to_value(result).map_err(|e| e.to_string())
}

fn text_pdf_result(text: &str, elapsed: Duration) -> serde_json::Value {
    let word_count = text.split_whitespace().count() as u64;
    let line_count = text.lines().count() as u64;
    serde_json::json!({
        "text": text,
        "confidence": 100.0,
        "blocks": [],
        "structure": {
            "title": null,
            "headings": [],
            "lists": [],
            "tables": [],
            "keyValuePairs": [],
            "smartFields": [],
            "notableData": { "entities": [], "currencyAmounts": [], "dates": [], "identifiers": [] },
            "documentType": "unknown",
            "pageLayout": { "columns": 1, "hasHeader": false, "hasFooter": false, "textDensity": 0.0 },
        },
        "metadata": {
            "language": DEFAULT_LANGUAGE,
            "processingTimeMs": elapsed.as_millis() as u64,
            "pageCount": null,
            "wordCount": word_count,
            "lineCount": line_count,
            "avgConfidence": 100.0,
        },
    })
}

async fn maybe_send_webhook(ctx: &WorkerContext, job: &JobRow, ocr_result: &serde_json::Value) {
    let Some(url) = job.callback_webhook.as_deref() else {
        return;
    };
    let status_url = format!("{}/api/status/{}", ctx.app_domain, job.id);
    ctx.webhook_sink
        .send(url, job.id, &job.email, ocr_result, status_url)
        .await;
}
