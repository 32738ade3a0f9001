//! crates/tsundoku_core/src/scheduler.rs
//!
//! The recurring task that decays every active time bubble by one unit a day.
//!
//! Runs never overlap: the loop awaits each run before waiting for the next
//! tick, and ticks missed while a run was in progress are skipped rather than
//! replayed. Each decay is conditional on the date, so a restart that fires an
//! extra run on the same day changes nothing.

use chrono::{NaiveDate, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bubble::BubbleService;
use crate::ports::{DecayOutcome, PortResult};

/// One day.
pub const DEFAULT_DECAY_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// What one run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecayReport {
    pub decremented: usize,
    pub already_applied: usize,
    pub failed: usize,
}

pub struct BubbleScheduler {
    bubbles: BubbleService,
    interval: Duration,
}

impl BubbleScheduler {
    pub fn new(bubbles: BubbleService, interval: Duration) -> Self {
        Self { bubbles, interval }
    }

    /// Decays every active bubble for `today`.
    ///
    /// A failure for one reader is logged and counted; only a failure to list
    /// the active readers aborts the run.
    pub async fn run_once(&self, today: NaiveDate) -> PortResult<DecayReport> {
        let readers = self.bubbles.active_readers().await?;
        let mut report = DecayReport::default();

        for reader_id in readers {
            match self.bubbles.decay(reader_id, today).await {
                Ok(DecayOutcome::Decremented(status)) => {
                    report.decremented += 1;
                    if status.count == 0 {
                        info!(%reader_id, "Time bubble reached zero");
                    }
                }
                Ok(DecayOutcome::AlreadyAppliedToday) => report.already_applied += 1,
                Err(e) => {
                    warn!(%reader_id, error = %e, "Bubble decay failed; continuing with next reader");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Starts the loop on its own task. The first run happens immediately.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = self.interval.as_secs(), "Bubble scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Bubble scheduler stopped");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                let today = Utc::now().date_naive();
                match self.run_once(today).await {
                    Ok(report) => info!(
                        %today,
                        decremented = report.decremented,
                        already_applied = report.already_applied,
                        failed = report.failed,
                        "Bubble decay run finished"
                    ),
                    // Abandoned; the next tick tries again.
                    Err(e) => error!(%today, error = %e, "Bubble decay run abandoned"),
                }
            }
        })
    }
}
