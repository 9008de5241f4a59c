//! In-memory document store for schedules, presets, and broadcast text.
//!
//! This is the storage collaborator boundary: one schedule document per
//! calendar date, presets keyed by name, and the administrative
//! message/announcement documents. Mutation batches are applied
//! all-or-nothing; readers never block writers for longer than a map clone.

use crate::error::Result;
use crate::types::{Event, LunchItem, Preset, ResolvedPatch, Schedule, ScheduleDate};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

/// One write within a mutation batch.
#[derive(Clone, Debug)]
pub enum ScheduleWrite {
    /// Merge-patch the document for a date, creating it with empty
    /// `lunch`/`events` if it does not exist.
    Upsert {
        date: ScheduleDate,
        patch: ResolvedPatch,
    },
    /// Replace or merge the event list for a date. When merging, the result
    /// is re-sorted by (start, end) ascending.
    MergeEvents {
        date: ScheduleDate,
        events: Vec<Event>,
        replace: bool,
    },
    /// Replace or append to the lunch menu for a date.
    MergeLunch {
        date: ScheduleDate,
        items: Vec<LunchItem>,
        replace: bool,
    },
}

impl ScheduleWrite {
    pub fn date(&self) -> ScheduleDate {
        match self {
            ScheduleWrite::Upsert { date, .. } => *date,
            ScheduleWrite::MergeEvents { date, .. } => *date,
            ScheduleWrite::MergeLunch { date, .. } => *date,
        }
    }
}

/// The live administrative announcement, with the time it was last set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub text: String,
    pub date: DateTime<Utc>,
}

#[derive(Default)]
struct MiscState {
    message: String,
    announcement: Option<Announcement>,
}

/// Keyed storage of schedule documents and presets.
pub struct ScheduleStore {
    schedules: RwLock<BTreeMap<ScheduleDate, Schedule>>,
    presets: RwLock<BTreeMap<String, Preset>>,
    misc: RwLock<MiscState>,
    /// Injected write-failure countdown for atomicity tests.
    #[cfg(test)]
    fail_after: AtomicUsize,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self {
            schedules: RwLock::new(BTreeMap::new()),
            presets: RwLock::new(BTreeMap::new()),
            misc: RwLock::new(MiscState::default()),
            #[cfg(test)]
            fail_after: AtomicUsize::new(usize::MAX),
        }
    }

    // --- Schedule Reads ---

    /// Get the current document for a date.
    pub fn get(&self, date: ScheduleDate) -> Option<Schedule> {
        self.schedules.read().get(&date).cloned()
    }

    /// Get every document with a date in `[start, end]`, ascending.
    pub fn get_range(&self, start: ScheduleDate, end: ScheduleDate) -> Vec<Schedule> {
        self.schedules
            .read()
            .range(start..=end)
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    /// Get every document, ascending by date.
    pub fn all(&self) -> Vec<Schedule> {
        self.schedules.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.schedules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.read().is_empty()
    }

    // --- Schedule Writes ---

    /// Apply one mutation batch atomically.
    ///
    /// Either every write in the batch lands or none does: the new documents
    /// are staged against the current state first, and the live map is only
    /// touched after the whole batch has staged cleanly. Returns the
    /// resulting documents in batch order.
    pub fn apply(&self, batch: &[ScheduleWrite]) -> Result<Vec<Schedule>> {
        let mut map = self.schedules.write();

        let mut staged: BTreeMap<ScheduleDate, Schedule> = BTreeMap::new();
        let mut results = Vec::with_capacity(batch.len());

        for write in batch {
            #[cfg(test)]
            self.check_failpoint()?;

            let date = write.date();
            let current = staged
                .get(&date)
                .or_else(|| map.get(&date))
                .cloned()
                .unwrap_or_else(|| Schedule::new(date));

            let next = Self::apply_write(current, write);
            staged.insert(date, next.clone());
            results.push(next);
        }

        for (date, doc) in staged {
            map.insert(date, doc);
        }

        Ok(results)
    }

    fn apply_write(mut doc: Schedule, write: &ScheduleWrite) -> Schedule {
        match write {
            ScheduleWrite::Upsert { patch, .. } => {
                if let Some(periods) = &patch.periods {
                    doc.periods = periods.clone();
                }
                if let Some(preset) = &patch.preset {
                    doc.preset = Some(preset.clone());
                }
                if let Some(code) = &patch.code {
                    doc.code = Some(code.clone());
                }
                if let Some(variant) = &patch.variant {
                    doc.variant = Some(variant.clone());
                }
                if let Some(name) = &patch.name {
                    doc.name = Some(name.clone());
                }
            }
            ScheduleWrite::MergeEvents { events, replace, .. } => {
                if *replace {
                    doc.events = events.clone();
                } else {
                    doc.events.extend(events.iter().cloned());
                    doc.events.sort_by_key(|e| (e.start, e.end));
                }
            }
            ScheduleWrite::MergeLunch { items, replace, .. } => {
                if *replace {
                    doc.lunch = items.clone();
                } else {
                    doc.lunch.extend(items.iter().cloned());
                }
            }
        }
        doc
    }

    // --- Presets ---

    /// Insert a preset, replacing any existing preset with the same name.
    pub fn put_preset(&self, preset: Preset) {
        self.presets.write().insert(preset.preset.clone(), preset);
    }

    pub fn get_preset(&self, name: &str) -> Option<Preset> {
        self.presets.read().get(name).cloned()
    }

    /// All presets, sorted by name.
    pub fn all_presets(&self) -> Vec<Preset> {
        self.presets.read().values().cloned().collect()
    }

    // --- Message / Announcement ---

    pub fn message(&self) -> String {
        self.misc.read().message.clone()
    }

    pub fn set_message(&self, text: impl Into<String>) {
        self.misc.write().message = text.into();
    }

    pub fn announcement(&self) -> Option<Announcement> {
        self.misc.read().announcement.clone()
    }

    pub fn set_announcement(&self, text: impl Into<String>) -> Announcement {
        let announcement = Announcement {
            text: text.into(),
            date: Utc::now(),
        };
        self.misc.write().announcement = Some(announcement.clone());
        announcement
    }

    // --- Test Hooks ---

    /// Fail the nth write of the next `apply` call (0 = the first write).
    #[cfg(test)]
    pub(crate) fn fail_after_writes(&self, n: usize) {
        self.fail_after.store(n, Ordering::Relaxed);
    }

    #[cfg(test)]
    fn check_failpoint(&self) -> Result<()> {
        let remaining = self.fail_after.load(Ordering::Relaxed);
        if remaining == usize::MAX {
            return Ok(());
        }
        if remaining == 0 {
            self.fail_after.store(usize::MAX, Ordering::Relaxed);
            return Err(crate::error::ScheduleError::Storage(
                "injected write failure".into(),
            ));
        }
        self.fail_after.store(remaining - 1, Ordering::Relaxed);
        Ok(())
    }
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScheduleError;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> ScheduleDate {
        ScheduleDate::from_ymd(y, m, d).unwrap()
    }

    fn instant(d: ScheduleDate, h: u32, m: u32) -> DateTime<Utc> {
        d.at(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn event(d: ScheduleDate, name: &str, start_h: u32, end_h: u32) -> Event {
        Event {
            name: name.to_string(),
            category: None,
            start: instant(d, start_h, 0),
            end: instant(d, end_h, 0),
            no_ical: false,
        }
    }

    #[test]
    fn test_upsert_creates_with_empty_collections() {
        let store = ScheduleStore::new();
        let d = date(2024, 9, 2);

        let docs = store
            .apply(&[ScheduleWrite::Upsert {
                date: d,
                patch: ResolvedPatch {
                    name: Some("First Day".to_string()),
                    ..Default::default()
                },
            }])
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name.as_deref(), Some("First Day"));
        assert!(docs[0].lunch.is_empty());
        assert!(docs[0].events.is_empty());
        assert_eq!(store.get(d).unwrap(), docs[0]);
    }

    #[test]
    fn test_patch_leaves_absent_fields_unchanged() {
        let store = ScheduleStore::new();
        let d = date(2024, 9, 2);

        store
            .apply(&[ScheduleWrite::Upsert {
                date: d,
                patch: ResolvedPatch {
                    code: Some("A".to_string()),
                    variant: Some("rally".to_string()),
                    ..Default::default()
                },
            }])
            .unwrap();

        store
            .apply(&[ScheduleWrite::Upsert {
                date: d,
                patch: ResolvedPatch {
                    code: Some("B".to_string()),
                    ..Default::default()
                },
            }])
            .unwrap();

        let doc = store.get(d).unwrap();
        assert_eq!(doc.code.as_deref(), Some("B"));
        assert_eq!(doc.variant.as_deref(), Some("rally"));
    }

    #[test]
    fn test_merge_events_sorts_by_start_then_end() {
        let store = ScheduleStore::new();
        let d = date(2024, 9, 2);

        store
            .apply(&[ScheduleWrite::MergeEvents {
                date: d,
                events: vec![event(d, "late", 15, 16), event(d, "long", 9, 17)],
                replace: false,
            }])
            .unwrap();
        store
            .apply(&[ScheduleWrite::MergeEvents {
                date: d,
                events: vec![event(d, "short", 9, 10)],
                replace: false,
            }])
            .unwrap();

        let names: Vec<_> = store
            .get(d)
            .unwrap()
            .events
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, ["short", "long", "late"]);
    }

    #[test]
    fn test_replace_events_overwrites() {
        let store = ScheduleStore::new();
        let d = date(2024, 9, 2);

        store
            .apply(&[ScheduleWrite::MergeEvents {
                date: d,
                events: vec![event(d, "old", 9, 10)],
                replace: false,
            }])
            .unwrap();
        store
            .apply(&[ScheduleWrite::MergeEvents {
                date: d,
                events: vec![event(d, "new", 11, 12)],
                replace: true,
            }])
            .unwrap();

        let doc = store.get(d).unwrap();
        assert_eq!(doc.events.len(), 1);
        assert_eq!(doc.events[0].name, "new");
    }

    #[test]
    fn test_lunch_append_and_replace() {
        let store = ScheduleStore::new();
        let d = date(2024, 9, 2);
        let item = |place: &str| LunchItem {
            place: place.to_string(),
            food: "Soup".to_string(),
        };

        store
            .apply(&[ScheduleWrite::MergeLunch {
                date: d,
                items: vec![item("Main Kitchen")],
                replace: false,
            }])
            .unwrap();
        store
            .apply(&[ScheduleWrite::MergeLunch {
                date: d,
                items: vec![item("Grill")],
                replace: false,
            }])
            .unwrap();
        assert_eq!(store.get(d).unwrap().lunch.len(), 2);

        store
            .apply(&[ScheduleWrite::MergeLunch {
                date: d,
                items: vec![item("Cafe")],
                replace: true,
            }])
            .unwrap();
        let doc = store.get(d).unwrap();
        assert_eq!(doc.lunch.len(), 1);
        assert_eq!(doc.lunch[0].place, "Cafe");
    }

    #[test]
    fn test_schedule_writes_never_truncate_lunch_or_events() {
        let store = ScheduleStore::new();
        let d = date(2024, 9, 2);

        store
            .apply(&[
                ScheduleWrite::MergeLunch {
                    date: d,
                    items: vec![LunchItem {
                        place: "Grill".to_string(),
                        food: "Tacos".to_string(),
                    }],
                    replace: false,
                },
                ScheduleWrite::MergeEvents {
                    date: d,
                    events: vec![event(d, "assembly", 10, 11)],
                    replace: false,
                },
            ])
            .unwrap();

        store
            .apply(&[ScheduleWrite::Upsert {
                date: d,
                patch: ResolvedPatch {
                    periods: Some(vec![]),
                    name: Some("Holiday".to_string()),
                    ..Default::default()
                },
            }])
            .unwrap();

        let doc = store.get(d).unwrap();
        assert_eq!(doc.lunch.len(), 1);
        assert_eq!(doc.events.len(), 1);
    }

    #[test]
    fn test_batch_failure_leaves_no_partial_state() {
        let store = ScheduleStore::new();
        let writes: Vec<_> = (2..=6)
            .map(|day| ScheduleWrite::Upsert {
                date: date(2024, 9, day),
                patch: ResolvedPatch {
                    name: Some("batch".to_string()),
                    ..Default::default()
                },
            })
            .collect();

        store.fail_after_writes(3);
        let err = store.apply(&writes).unwrap_err();
        assert!(matches!(err, ScheduleError::Storage(_)));
        assert!(store.is_empty());

        // The same batch succeeds once the fault clears.
        store.apply(&writes).unwrap();
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_preset_overwrite_by_name() {
        let store = ScheduleStore::new();
        store.put_preset(Preset {
            preset: "regular".to_string(),
            periods: vec![],
            code: Some("A".to_string()),
            variant: None,
            name: None,
        });
        store.put_preset(Preset {
            preset: "regular".to_string(),
            periods: vec![],
            code: Some("B".to_string()),
            variant: None,
            name: None,
        });

        assert_eq!(store.all_presets().len(), 1);
        assert_eq!(store.get_preset("regular").unwrap().code.as_deref(), Some("B"));
    }

    #[test]
    fn test_all_presets_sorted_by_name() {
        let store = ScheduleStore::new();
        for name in ["rally", "assembly", "regular"] {
            store.put_preset(Preset {
                preset: name.to_string(),
                periods: vec![],
                code: None,
                variant: None,
                name: None,
            });
        }
        let names: Vec<_> = store.all_presets().into_iter().map(|p| p.preset).collect();
        assert_eq!(names, ["assembly", "rally", "regular"]);
    }

    #[test]
    fn test_message_and_announcement() {
        let store = ScheduleStore::new();
        assert_eq!(store.message(), "");
        store.set_message("Welcome back!");
        assert_eq!(store.message(), "Welcome back!");

        assert!(store.announcement().is_none());
        let set = store.set_announcement("Spirit week starts Monday");
        assert_eq!(store.announcement().unwrap(), set);
    }

    #[test]
    fn test_get_range_inclusive() {
        let store = ScheduleStore::new();
        for day in [2, 3, 4, 9] {
            store
                .apply(&[ScheduleWrite::Upsert {
                    date: date(2024, 9, day),
                    patch: ResolvedPatch::default(),
                }])
                .unwrap();
        }
        let docs = store.get_range(date(2024, 9, 3), date(2024, 9, 9));
        let days: Vec<_> = docs.iter().map(|d| d.date).collect();
        assert_eq!(days, [date(2024, 9, 3), date(2024, 9, 4), date(2024, 9, 9)]);
    }
}
