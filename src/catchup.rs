//! Catch-up read path for reconnecting clients.
//!
//! A client that missed live broadcasts presents its last-seen revision id
//! and receives the minimal set of current documents needed to converge on
//! present state, together with the newest revision id it should remember.

use crate::revisions::RevisionLog;
use crate::store::ScheduleStore;
use crate::types::{RevisionId, Schedule, ScheduleDate};
use std::collections::BTreeSet;
use std::sync::Arc;

/// The documents a client must apply to be up to date.
#[derive(Clone, Debug)]
pub struct CatchupResult {
    pub schedules: Vec<Schedule>,
    /// The marker the client should present next time.
    pub latest_revision: Option<RevisionId>,
}

/// Computes minimal catch-up sets from the revision log.
///
/// Read-only; runs at any concurrency and never blocks writers.
pub struct CatchupResolver {
    store: Arc<ScheduleStore>,
    revisions: Arc<RevisionLog>,
}

impl CatchupResolver {
    pub fn new(store: Arc<ScheduleStore>, revisions: Arc<RevisionLog>) -> Self {
        Self { store, revisions }
    }

    /// Resolve the documents a client needs given its last-seen revision.
    ///
    /// With no marker, returns the full current snapshot. With a marker,
    /// returns the current document for every date touched by any newer
    /// revision — each date once, reflecting its latest state, not the
    /// intermediate snapshots. With no newer revisions, returns an empty set
    /// and echoes the marker back.
    pub fn catch_up(&self, known: Option<RevisionId>) -> CatchupResult {
        let known = match known {
            Some(id) => id,
            None => {
                return CatchupResult {
                    schedules: self.store.all(),
                    latest_revision: self.revisions.latest_id(),
                }
            }
        };

        let newer = self.revisions.read_since(known);
        if newer.is_empty() {
            return CatchupResult {
                schedules: Vec::new(),
                latest_revision: Some(known),
            };
        }

        let latest = newer.last().map(|r| r.id);
        let touched: BTreeSet<ScheduleDate> = newer
            .into_iter()
            .flat_map(|revision| revision.changes)
            .collect();

        let schedules = touched
            .into_iter()
            .filter_map(|date| self.store.get(date))
            .collect();

        CatchupResult {
            schedules,
            latest_revision: latest,
        }
    }
}
