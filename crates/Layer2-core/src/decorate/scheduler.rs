//! Trigger loop
//!
//! Initial scan runs immediately. After that every trigger (change feed
//! event or bounded retry tick) pushes a single debounce deadline forward;
//! the scan runs once the deadline passes with no further triggers.
//!
//! Scans only mark nodes and render placeholders. The resolutions they start
//! are driven by the same loop, so a slow fetch never delays the next scan.

use super::Decorator;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Totals for one `run`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scans: usize,
    pub triggers: usize,
    pub scheduled: usize,
    /// Resolutions that finished before shutdown
    pub settled: usize,
}

impl Decorator {
    /// Drive scans until `shutdown` fires
    ///
    /// Resolutions still running at shutdown are dropped; their nodes keep
    /// the placeholder.
    pub async fn run(&self, shutdown: CancellationToken) -> RunSummary {
        let mut summary = RunSummary::default();
        if shutdown.is_cancelled() {
            return summary;
        }

        // Subscribe first so nothing published during the initial scan is lost
        let mut subscription = self.page.subscribe();
        let mut resolutions = FuturesUnordered::new();

        let (report, started) = self.dispatch();
        summary.scans += 1;
        summary.scheduled += report.scheduled;
        resolutions.extend(started);

        let debounce = self.schedule.debounce();
        // interval_at panics on a zero period
        let retry_every = self.schedule.retry_interval().max(Duration::from_millis(1));
        let mut retry = interval_at(Instant::now() + retry_every, retry_every);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut retries_left = self.schedule.retry_max;

        let mut feed_open = true;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                Some(()) = resolutions.next(), if !resolutions.is_empty() => {
                    summary.settled += 1;
                }

                event = subscription.recv(), if feed_open => match event {
                    Some(event) => {
                        trace!("Page event: {:?}", event);
                        summary.triggers += 1;
                        deadline = Some(Instant::now() + debounce);
                    }
                    None => {
                        debug!("Change feed closed");
                        feed_open = false;
                    }
                },

                _ = retry.tick(), if retries_left > 0 => {
                    retries_left -= 1;
                    summary.triggers += 1;
                    deadline = Some(Instant::now() + debounce);
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    let (report, started) = self.dispatch();
                    summary.scans += 1;
                    summary.scheduled += report.scheduled;
                    resolutions.extend(started);
                }
            }
        }

        if !resolutions.is_empty() {
            debug!("Dropping {} unsettled resolutions", resolutions.len());
        }
        info!(
            "Decoration loop stopped after {} scans ({} entries)",
            summary.scans, summary.scheduled
        );
        summary
    }
}
