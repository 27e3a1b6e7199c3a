//! Change Feed - 호스트 페이지 변경 알림
//!
//! Host adapters publish navigation and structural-change notifications;
//! the decoration scheduler subscribes and re-scans. Built on a tokio
//! broadcast channel so any number of subscribers can listen.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Notification emitted by a host page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// Client-side navigation finished (pjax / turbo style)
    Navigated { location: String },
    /// A batch of nodes was added to or removed from the page
    StructureChanged { added: usize, removed: usize },
    /// The structural content region was swapped out wholesale
    ContentReplaced,
}

/// Broadcast channel of `PageEvent`s
pub struct ChangeFeed {
    sender: broadcast::Sender<PageEvent>,
    published: AtomicU64,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Publish an event; returns the number of live subscribers
    pub fn publish(&self, event: PageEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        trace!("Publishing page event: {:?}", event);
        // No subscribers is fine
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Callback-style subscription; dropping the handle unsubscribes
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_change<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(PageEvent) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                callback(event);
            }
        });
        ListenerHandle { task }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiver side of a `ChangeFeed`
pub struct Subscription {
    receiver: broadcast::Receiver<PageEvent>,
}

impl Subscription {
    /// Next event, or `None` once the feed is gone
    ///
    /// A lagged receiver missed some events; that still means the page
    /// changed, so it is reported as a structural change.
    pub async fn recv(&mut self) -> Option<PageEvent> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Change subscription lagged by {} events", skipped);
                Some(PageEvent::StructureChanged {
                    added: 0,
                    removed: 0,
                })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    pub fn unsubscribe(self) {}
}

/// Handle for a callback subscription
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn unsubscribe(self) {}
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
