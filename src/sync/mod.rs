//! Live push path: fan out committed revisions and administrative
//! broadcasts to connected subscribers.

mod broadcaster;
mod types;

pub use broadcaster::SyncBroadcaster;
pub use types::{DropReason, SubscriberHandle, SubscriberId, SyncEvent};
