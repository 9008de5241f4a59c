//! Event and handle types for live client synchronization.

use crate::types::{RevisionId, Schedule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events pushed to connected display clients.
///
/// Serialized as tagged JSON for the wire; the transport layer forwards them
/// verbatim.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A mutation batch committed; carries the full updated documents.
    ScheduleUpdate {
        schedules: Vec<Schedule>,
        revision: RevisionId,
    },

    /// The live administrative message changed.
    Message { text: String },

    /// The administrative announcement changed.
    Announcement { text: String, date: DateTime<Utc> },

    /// A virtual bell fired (volatile; missed bells are not replayed).
    Bell { is_start: bool, period: String },

    /// This subscriber was dropped and should reconnect via catch-up.
    Dropped { reason: DropReason },
}

/// Why a subscriber was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Handle to a live subscription.
pub struct SubscriberHandle {
    pub id: SubscriberId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<SyncEvent>,
}

impl SubscriberHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SyncEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SyncEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<SyncEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
