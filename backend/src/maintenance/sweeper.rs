use crate::store::{ArticleStore, SweepReport};
use log::{error, info};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Runs one sweep on the blocking pool.
pub async fn sweep_once(store: ArticleStore) -> Option<SweepReport> {
    match tokio::task::spawn_blocking(move || store.sweep_orphans()).await {
        Ok(Ok(report)) => {
            if report.removed > 0 || report.failed > 0 {
                info!(
                    "Orphan sweep: scanned {}, removed {}, failed {}",
                    report.scanned, report.removed, report.failed
                );
            }
            Some(report)
        }
        Ok(Err(e)) => {
            error!("Orphan sweep failed: {}", e);
            None
        }
        Err(e) => {
            error!("Orphan sweep task panicked: {}", e);
            None
        }
    }
}

/// Starts the periodic orphan sweeper.
///
/// This function should be spawned as a long-running background task (see
/// `main.rs`). The first sweep happens one `period` after start-up.
pub async fn start_sweeper(store: ArticleStore, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_once(store.clone()).await;
    }
}
