//! Best-effort webhook delivery. Mirrors the teacher's `state.rs` pattern
//! of a single shared `reqwest::Client` built with bounded timeouts —
//! failures here are logged and swallowed, never propagated into job
//! state (spec §4.6: no retry, no signing).

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

const WEBHOOK_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    job_id: Uuid,
    email: &'a str,
    ocr_result: &'a serde_json::Value,
    status_url: String,
    timestamp: chrono::DateTime<Utc>,
}

pub struct WebhookSink {
    client: Client,
}

impl WebhookSink {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn send(
        &self,
        url: &str,
        job_id: Uuid,
        email: &str,
        ocr_result: &serde_json::Value,
        status_url: String,
    ) {
        let payload = WebhookPayload {
            job_id,
            email,
            ocr_result,
            status_url,
            timestamp: Utc::now(),
        };

        let result = self
            .client
            .post(url)
            .timeout(std::time::Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .header("Content-Type", "application/json")
            .header("User-Agent", "OCR-API/1.0")
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(%job_id, status = %resp.status(), "webhook delivered");
            }
            Ok(resp) => {
                tracing::warn!(%job_id, status = %resp.status(), "webhook delivery rejected by receiver");
            }
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "webhook delivery failed");
            }
        }
    }
}
