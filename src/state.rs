//! Application state — grounded on the teacher's `state.rs`: a
//! `Clone`-friendly struct carrying the pool, a shared `reqwest::Client`,
//! readiness flag, and start time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use sqlx::PgPool;

use crate::ocr_engine::OcrEngine;
use crate::ocr_engine::PlaceholderOcrEngine;
use crate::scheduler::Scheduler;
use crate::store::Store;
use crate::webhook::WebhookSink;
use crate::worker::WorkerContext;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub client: Client,
    pub start_time: Instant,
    pub app_domain: String,
    pub max_concurrent_jobs: usize,
    pub pdf_page_concurrency: usize,
    /// `true` once the store is reachable and migrations have run.
    pub ready: Arc<AtomicBool>,
    pub in_flight: Arc<std::sync::atomic::AtomicUsize>,
}

impl AppState {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("service marked as READY");
    }

    pub async fn new(db: PgPool) -> Self {
        let app_domain = std::env::var("APP_DOMAIN")
            .unwrap_or_else(|_| "http://localhost:3040".to_string());
        let max_concurrent_jobs: usize = std::env::var("MAX_CONCURRENT_JOBS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let pdf_page_concurrency: usize = std::env::var("PDF_PAGE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        tracing::info!(
            max_concurrent_jobs,
            pdf_page_concurrency,
            %app_domain,
            "AppState initialised"
        );

        Self {
            store: Store::new(db),
            client,
            start_time: Instant::now(),
            app_domain,
            max_concurrent_jobs,
            pdf_page_concurrency,
            ready: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    /// Builds the worker context and OCR engine wiring shared by every
    /// spawned worker task. Split out of `new` so tests can construct a
    /// state without immediately starting a scheduler.
    pub fn build_scheduler(&self) -> Scheduler {
        let engine: Arc<dyn OcrEngine> = Arc::new(PlaceholderOcrEngine);
        let worker_ctx = Arc::new(WorkerContext {
            store: self.store.clone(),
            engine,
            webhook_sink: Arc::new(WebhookSink::new(self.client.clone())),
            app_domain: self.app_domain.clone(),
            pdf_page_concurrency: self.pdf_page_concurrency,
        });
        Scheduler::new(
            self.store.clone(),
            worker_ctx,
            self.max_concurrent_jobs,
            self.in_flight.clone(),
        )
    }
}
