//! Broadcaster fanning committed revisions out to live subscribers.

use crate::types::{RevisionId, Schedule};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{DropReason, SubscriberHandle, SubscriberId, SyncEvent};

/// Default per-subscriber event buffer.
const DEFAULT_BUFFER_SIZE: usize = 256;

struct Subscriber {
    sender: Sender<SyncEvent>,
}

impl Subscriber {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone (subscriber will be dropped).
    fn try_send(&self, event: SyncEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// Fans events out to all currently-connected subscribers.
///
/// Delivery is best-effort and volatile: a subscriber that is offline at
/// publish time receives nothing and must catch up from its last known
/// revision on reconnect. Slow subscribers whose buffer fills are dropped
/// rather than blocking the publisher.
pub struct SyncBroadcaster {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl SyncBroadcaster {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size,
        }
    }

    /// Register a new subscriber and return its receiving handle.
    pub fn subscribe(&self) -> SubscriberHandle {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.buffer_size);
        self.subscribers.write().insert(id, Subscriber { sender });
        SubscriberHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.write();
        if let Some(subscriber) = subscribers.remove(&id) {
            let _ = subscriber.sender.try_send(SyncEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Number of currently-connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    // --- Publishing ---

    /// Publish a committed revision with its full updated documents.
    ///
    /// Must be called strictly after the enclosing transaction committed, so
    /// no subscriber ever sees a revision id whose documents are not
    /// durably stored.
    pub fn publish_revision(&self, schedules: Vec<Schedule>, revision: RevisionId) {
        tracing::debug!(revision = revision.0, count = schedules.len(), "publishing revision");
        self.broadcast(SyncEvent::ScheduleUpdate {
            schedules,
            revision,
        });
    }

    /// Publish an out-of-band administrative message.
    pub fn publish_message(&self, text: impl Into<String>) {
        self.broadcast(SyncEvent::Message { text: text.into() });
    }

    /// Publish an out-of-band administrative announcement.
    pub fn publish_announcement(&self, text: impl Into<String>, date: DateTime<Utc>) {
        self.broadcast(SyncEvent::Announcement {
            text: text.into(),
            date,
        });
    }

    /// Publish a virtual bell boundary (volatile).
    pub fn publish_bell(&self, is_start: bool, period: &str) {
        self.broadcast(SyncEvent::Bell {
            is_start,
            period: period.to_string(),
        });
    }

    /// Internal broadcast helper. Drops subscribers that fail to receive.
    fn broadcast(&self, event: SyncEvent) {
        let mut to_remove = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in to_remove {
                if let Some(subscriber) = subscribers.remove(&id) {
                    tracing::debug!(subscriber = id.0, "dropping slow subscriber");
                    let _ = subscriber.sender.try_send(SyncEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SyncBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
