//! Bounded-concurrency dispatch loop. The store is the queue — there is
//! no in-memory job list here, only a reap/claim/spawn cycle. Grounded on
//! `OcrQueueService::start_worker` (`other_examples/.../readur__src-ocr_queue.rs.rs`),
//! adapted from a semaphore-gated spawn loop to an explicit in-flight
//! `JoinSet` so the scheduler can report its own concurrency state to the
//! metrics endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::store::Store;
use crate::worker::{self, WorkerContext};

const POLL_INTERVAL_IDLE: Duration = Duration::from_secs(5);
const POLL_INTERVAL_AT_CAPACITY: Duration = Duration::from_millis(500);

pub struct Scheduler {
    store: Store,
    worker_ctx: Arc<WorkerContext>,
    max_concurrent_jobs: usize,
    in_flight: Arc<AtomicUsize>,
}

impl Scheduler {
    pub fn new(
        store: Store,
        worker_ctx: Arc<WorkerContext>,
        max_concurrent_jobs: usize,
        in_flight: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            store,
            worker_ctx,
            max_concurrent_jobs,
            in_flight,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        tracing::info!(max_concurrent_jobs = self.max_concurrent_jobs, "scheduler started");
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            while tasks.try_join_next().is_some() {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
            }

            let in_flight = self.in_flight.load(Ordering::Relaxed);
            if in_flight >= self.max_concurrent_jobs {
                tokio::time::sleep(POLL_INTERVAL_AT_CAPACITY).await;
                continue;
            }

            match self.store.claim_oldest_pending().await {
                Ok(Some(job)) => {
                    self.in_flight.fetch_add(1, Ordering::Relaxed);
                    let ctx = self.worker_ctx.clone();
                    tasks.spawn(async move {
                        worker::run(ctx, job).await;
                    });
                }
                Ok(None) => {
                    tokio::time::sleep(POLL_INTERVAL_IDLE).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler claim failed, backing off");
                    tokio::time::sleep(POLL_INTERVAL_IDLE).await;
                }
            }
        }
    }
}
