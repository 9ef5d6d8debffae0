//! Background watchdog — periodically checks for PROCESSING jobs whose
//! `updated_at` has gone stale and logs them for operator attention.
//! Detection is read-only; resetting a stuck job to PENDING is an
//! explicit admin action (`PATCH /api/admin/jobs/{id}`), not automatic,
//! per spec §9. Loop/timeout shape grounded on the teacher's own
//! `watchdog.rs`.

use std::time::Duration;

use crate::state::AppState;

const CHECK_INTERVAL: Duration = Duration::from_secs(60);
const DB_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("watchdog: started (interval={}s)", CHECK_INTERVAL.as_secs());

        loop {
            tokio::time::sleep(CHECK_INTERVAL).await;
            check_stuck_jobs(&state).await;
        }
    })
}

async fn check_stuck_jobs(state: &AppState) {
    let result = tokio::time::timeout(DB_QUERY_TIMEOUT, state.store.stuck_job_ids()).await;

    match result {
        Ok(Ok(ids)) if ids.is_empty() => {
            tracing::debug!("watchdog: no stuck jobs");
        }
        Ok(Ok(ids)) => {
            tracing::warn!(count = ids.len(), ids = ?ids, "watchdog: stuck jobs detected");
        }
        Ok(Err(e)) => {
            tracing::error!("watchdog: stuck-job query failed: {}", e);
        }
        Err(_) => {
            tracing::error!("watchdog: stuck-job query timed out after {}s", DB_QUERY_TIMEOUT.as_secs());
        }
    }
}
