//! Background jobs for periodic maintenance tasks.
//!
//! The review flow updates counters as submissions land; this job keeps the
//! aggregate backlog gauge honest even during periods of low activity, when
//! items become due without any request touching the store.

use std::time::Duration;

use kotoba_db::store::{StateStore, Store};
use kotoba_srs::{Clock, SystemClock};
use tokio::time::interval;

use crate::metrics;

/// Start all background jobs
///
/// Returns a vector of join handles that can be awaited on shutdown
pub fn start_background_jobs(store: Store) -> Vec<tokio::task::JoinHandle<()>> {
    vec![tokio::spawn(due_backlog_gauge_job(store, SystemClock))]
}

/// Refresh the due-review backlog gauge every 5 minutes
async fn due_backlog_gauge_job<C: Clock>(store: Store, clock: C) {
    // Wait a minute before the first run to avoid startup contention
    tokio::time::sleep(Duration::from_secs(60)).await;

    let mut interval = interval(Duration::from_secs(300));

    loop {
        interval.tick().await;

        match store.count_due(clock.now()).await {
            Ok(count) => {
                metrics::set_due_backlog(count);
                tracing::debug!(count, "refreshed due-review backlog gauge");
            }
            Err(e) => {
                tracing::error!("failed to refresh due-review backlog gauge: {e}");
            }
        }
    }
}
