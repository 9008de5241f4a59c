//! Append-only revision log.
//!
//! Every committed mutation batch is recorded here with a strictly
//! increasing id. Revisions are immutable once appended; there is no
//! mutation or deletion path.

use crate::types::{Revision, RevisionId, Schedule, ScheduleDate};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Append-only, strictly ordered record of committed mutation batches.
pub struct RevisionLog {
    /// Revisions in id order. Ids are assigned under the same lock that
    /// appends, so the vector is always sorted.
    revisions: RwLock<Vec<Revision>>,
}

impl RevisionLog {
    pub fn new() -> Self {
        Self {
            revisions: RwLock::new(Vec::new()),
        }
    }

    /// Append a revision for one committed batch and return its id.
    ///
    /// Callers serialize appends with their commit lock; the internal lock
    /// alone still guarantees ids are assigned and stored in one step, so
    /// they are monotonic under any interleaving.
    pub fn append(
        &self,
        author: &str,
        changes: BTreeSet<ScheduleDate>,
        documents: Vec<Schedule>,
    ) -> RevisionId {
        let mut revisions = self.revisions.write();
        let id = RevisionId(revisions.last().map(|r| r.id.0 + 1).unwrap_or(1));
        revisions.push(Revision {
            id,
            timestamp: Utc::now(),
            author: author.to_string(),
            changes,
            documents,
        });
        id
    }

    /// All revisions with id strictly greater than `id`, ascending.
    pub fn read_since(&self, id: RevisionId) -> Vec<Revision> {
        let revisions = self.revisions.read();
        let start = revisions.partition_point(|r| r.id <= id);
        revisions[start..].to_vec()
    }

    /// The id of the newest revision, if any exist.
    pub fn latest_id(&self) -> Option<RevisionId> {
        self.revisions.read().last().map(|r| r.id)
    }

    /// Get a single revision by id.
    pub fn get(&self, id: RevisionId) -> Option<Revision> {
        let revisions = self.revisions.read();
        revisions
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| revisions[i].clone())
    }

    pub fn len(&self) -> usize {
        self.revisions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.read().is_empty()
    }
}

impl Default for RevisionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn changes(days: &[u32]) -> BTreeSet<ScheduleDate> {
        days.iter()
            .map(|d| ScheduleDate::from_ymd(2024, 9, *d).unwrap())
            .collect()
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let log = RevisionLog::new();
        let first = log.append("ops", changes(&[2]), vec![]);
        let second = log.append("ops", changes(&[3]), vec![]);
        assert_eq!(first, RevisionId(1));
        assert_eq!(second, RevisionId(2));
        assert_eq!(log.latest_id(), Some(RevisionId(2)));
    }

    #[test]
    fn test_read_since_excludes_marker() {
        let log = RevisionLog::new();
        for day in [2, 3, 4, 5] {
            log.append("ops", changes(&[day]), vec![]);
        }

        let newer = log.read_since(RevisionId(2));
        let ids: Vec<_> = newer.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, [3, 4]);

        assert!(log.read_since(RevisionId(4)).is_empty());
    }

    #[test]
    fn test_empty_log() {
        let log = RevisionLog::new();
        assert!(log.is_empty());
        assert_eq!(log.latest_id(), None);
        assert!(log.read_since(RevisionId(0)).is_empty());
    }

    #[test]
    fn test_get_by_id() {
        let log = RevisionLog::new();
        log.append("a", changes(&[2]), vec![]);
        log.append("b", changes(&[3]), vec![]);

        assert_eq!(log.get(RevisionId(2)).unwrap().author, "b");
        assert!(log.get(RevisionId(9)).is_none());
    }

    #[test]
    fn test_concurrent_appends_stay_monotonic() {
        let log = Arc::new(RevisionLog::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    log.append("ops", changes(&[2]), vec![]);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let all = log.read_since(RevisionId(0));
        assert_eq!(all.len(), 400);
        for pair in all.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
    }
}
