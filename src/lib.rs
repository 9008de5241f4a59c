//! # Belltower
//!
//! A bell-schedule calendar engine: expands schedule templates into concrete
//! per-day schedules under day-of-week override rules, applies operator
//! mutation batches atomically, records every committed batch as an
//! immutable, strictly-ordered revision, and keeps connected display clients
//! synchronized through live push plus catch-up from any past revision.
//!
//! ## Core Concepts
//!
//! - **Schedules**: one document per calendar date with periods, lunch, and
//!   events
//! - **Revisions**: append-only record of committed mutation batches
//! - **Catch-up**: minimal document set to converge a reconnecting client
//! - **Broadcast**: best-effort live fan-out to connected subscribers
//!
//! ## Example
//!
//! ```ignore
//! use belltower::{Engine, EngineConfig, Operation, Principal, Capability};
//!
//! let engine = Engine::new(EngineConfig::default());
//! let operator = Principal::new("ops", [Capability::BulkWrite]);
//!
//! let outcome = engine.coordinator().apply(&operator, Operation::AddHolidays {
//!     start: start_date,
//!     end: end_date,
//!     name: "Winter Break".into(),
//! })?;
//!
//! // Reconnecting clients converge from any known revision.
//! let update = engine.catchup().catch_up(Some(outcome.revision));
//! ```

pub mod admin;
pub mod auth;
pub mod bell;
pub mod catchup;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod expand;
pub mod revisions;
pub mod store;
pub mod sync;
pub mod types;

// Re-exports
pub use admin::AdminSurface;
pub use auth::{Authorizer, Capability, Principal, TokenTable};
pub use bell::{BellConfig, BellScheduler, LatencySummary, NextBell};
pub use catchup::{CatchupResolver, CatchupResult};
pub use coordinator::{CommitOutcome, CoordinatorConfig, MutationCoordinator, Operation};
pub use engine::{Engine, EngineConfig};
pub use error::{Result, ScheduleError};
pub use expand::{expand_periods, OverrideRules};
pub use revisions::RevisionLog;
pub use store::{Announcement, ScheduleStore, ScheduleWrite};
pub use sync::{DropReason, SubscriberHandle, SubscriberId, SyncBroadcaster, SyncEvent};
pub use types::*;
