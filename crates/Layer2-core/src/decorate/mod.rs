//! Decoration - 엔트리 배지 부착
//!
//! Per-node state machine:
//!
//! ```text
//! Unprocessed ──mark──► Pending (…) ──► Resolved (value)
//!                                   └─► Failed (—)
//! ```
//!
//! The processed mark is set only on the `Unprocessed -> Pending` edge, so a
//! node instance is resolved at most once no matter how often it is scanned.

mod scheduler;

pub use scheduler::RunSummary;

use crate::classify::{Classifier, EntryKind};
use crate::host::{Badge, HostNode, HostPage};
use crate::resolve::{CountResult, MetadataResolver};
use crate::target::is_listing_location;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;
use tally_foundation::SchedulerConfig;
use tracing::{debug, info};
use url::Url;

/// Where a node is in its decoration lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationState {
    Unprocessed,
    Pending,
    Resolved(CountResult),
    Failed,
}

impl DecorationState {
    /// Read back from the node's mark and badge
    pub fn of(node: &dyn HostNode) -> Self {
        if !node.is_processed() {
            return DecorationState::Unprocessed;
        }
        match node.badge() {
            None | Some(Badge::Pending) => DecorationState::Pending,
            Some(Badge::Lines(n)) => DecorationState::Resolved(CountResult::Lines(n)),
            Some(Badge::Entries(n)) => DecorationState::Resolved(CountResult::ChildCount(n)),
            Some(Badge::Unavailable { .. }) => DecorationState::Failed,
        }
    }
}

/// What one scan did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Nodes offered by the host
    pub candidates: usize,
    /// Nodes marked and resolved by this scan
    pub scheduled: usize,
    /// Already processed, detached, linkless or unknown
    pub skipped: usize,
}

/// Badge for a resolved entry
pub fn badge_for(kind: EntryKind, result: CountResult) -> Badge {
    match result {
        CountResult::Lines(n) => Badge::Lines(n),
        CountResult::ChildCount(n) => Badge::Entries(n),
        CountResult::Unavailable => Badge::Unavailable {
            directory: kind.is_directory_like(),
        },
    }
}

/// One started entry resolution; renders its badge when polled to completion
pub(crate) type Resolution = BoxFuture<'static, ()>;

/// Discovers entries on a host page and decorates each node once
pub struct Decorator {
    page: Arc<dyn HostPage>,
    classifier: Arc<Classifier>,
    resolver: MetadataResolver,
    schedule: SchedulerConfig,
}

impl Decorator {
    pub fn new(
        page: Arc<dyn HostPage>,
        classifier: Arc<Classifier>,
        resolver: MetadataResolver,
        schedule: SchedulerConfig,
    ) -> Self {
        Self {
            page,
            classifier,
            resolver,
            schedule,
        }
    }

    pub fn page(&self) -> &Arc<dyn HostPage> {
        &self.page
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    /// One full pass over the page
    ///
    /// Completes once every resolution it started has settled. A page that
    /// is not a listing location is left alone.
    pub async fn scan(&self) -> ScanReport {
        let (report, pending) = self.dispatch();
        join_all(pending).await;
        report
    }

    /// Mark new entries and render their placeholders without waiting
    ///
    /// The returned resolutions render the final badge once driven.
    pub(crate) fn dispatch(&self) -> (ScanReport, Vec<Resolution>) {
        let location = self.page.location();
        let listing = Url::parse(&location)
            .map(|url| is_listing_location(&url))
            .unwrap_or(false);
        if !listing {
            debug!("Not a listing location, skipping scan: {}", location);
            return (ScanReport::default(), Vec::new());
        }

        let candidates = self.page.candidates();
        let mut report = ScanReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for node in candidates {
            if node.is_processed() || !node.is_connected() {
                report.skipped += 1;
                continue;
            }
            let entry = match self.classifier.classify(node) {
                Some(entry) if entry.kind != EntryKind::Unknown => entry,
                _ => {
                    report.skipped += 1;
                    continue;
                }
            };
            if !entry.node.mark_processed() {
                report.skipped += 1;
                continue;
            }

            entry.node.render(Badge::Pending);
            report.scheduled += 1;

            let resolver = self.resolver.clone();
            pending.push(
                async move {
                    let result = resolver.resolve(entry.kind, &entry.target).await;
                    if !entry.node.is_connected() {
                        debug!("Discarding result for detached node {}", entry.node.id());
                        return;
                    }
                    entry.node.render(badge_for(entry.kind, result));
                }
                .boxed(),
            );
        }

        if report.scheduled > 0 {
            info!(
                "Decorating {} of {} entries on {}",
                report.scheduled, report.candidates, location
            );
        }
        (report, pending)
    }
}
