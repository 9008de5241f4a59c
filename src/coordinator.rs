//! Mutation coordinator: the only writer of schedules and revisions.
//!
//! Every operator mutation flows through [`MutationCoordinator::apply`],
//! which stages a batch of document writes, applies them to storage together
//! with exactly one revision append as an atomic pair, and publishes the
//! result to live subscribers strictly after the commit.

use crate::auth::Principal;
use crate::error::{Result, ScheduleError};
use crate::expand::{expand_periods, resolve_patch, OverrideRules};
use crate::revisions::RevisionLog;
use crate::store::{ScheduleStore, ScheduleWrite};
use crate::sync::SyncBroadcaster;
use crate::types::{
    Event, LunchItem, Preset, ResolvedPatch, RevisionId, Schedule, ScheduleDate, SchedulePatch,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Coordinator configuration.
#[derive(Clone, Copy, Debug)]
pub struct CoordinatorConfig {
    /// How far a client-supplied "current time" marker may drift from the
    /// server clock before a bulk autofill is rejected.
    pub freshness_window: Duration,

    /// Day-of-week override rules used during template expansion.
    pub override_rules: OverrideRules,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::seconds(10),
            override_rules: OverrideRules::default(),
        }
    }
}

/// One operator mutation.
#[derive(Clone, Debug)]
pub enum Operation {
    /// Fill a date range from a cyclic preset rotation, skipping weekends
    /// and the listed holidays.
    Autofill {
        start: ScheduleDate,
        end: ScheduleDate,
        rotation: Vec<String>,
        holidays: BTreeSet<ScheduleDate>,
        /// Client-supplied freshness marker; must match the server clock to
        /// within the configured window.
        current_time: DateTime<Utc>,
    },

    /// Mark every weekday in a range as a named no-school day.
    AddHolidays {
        start: ScheduleDate,
        end: ScheduleDate,
        name: String,
    },

    /// Merge-patch the schedule for a single date.
    EditSchedule {
        date: ScheduleDate,
        patch: SchedulePatch,
    },

    /// Replace a single date's schedule shape from a named preset.
    ApplyPreset { date: ScheduleDate, preset: String },

    /// Append or replace the event list for a date.
    MergeEvents {
        date: ScheduleDate,
        events: Vec<Event>,
        replace: bool,
    },

    /// Append or replace lunch menus for any number of dates.
    MergeLunch {
        lunch: BTreeMap<ScheduleDate, Vec<LunchItem>>,
        replace: bool,
    },
}

/// The result of one committed operation.
#[derive(Clone, Debug)]
pub struct CommitOutcome {
    pub revision: RevisionId,
    /// The dates written, deduplicated and ascending.
    pub dates: Vec<ScheduleDate>,
    /// The resulting documents for those dates.
    pub schedules: Vec<Schedule>,
}

/// Orchestrates atomic mutation batches.
pub struct MutationCoordinator {
    store: Arc<ScheduleStore>,
    revisions: Arc<RevisionLog>,
    broadcaster: Arc<SyncBroadcaster>,
    config: CoordinatorConfig,

    /// Serializes batch-apply plus revision append so concurrent operations
    /// can never interleave partial writes or reorder revision ids.
    commit_lock: Mutex<()>,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<ScheduleStore>,
        revisions: Arc<RevisionLog>,
        broadcaster: Arc<SyncBroadcaster>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            revisions,
            broadcaster,
            config,
            commit_lock: Mutex::new(()),
        }
    }

    /// Apply one operation on behalf of an authenticated operator.
    ///
    /// All validation and preset resolution happens before any write; the
    /// batch then commits atomically with its revision.
    pub fn apply(&self, principal: &Principal, operation: Operation) -> Result<CommitOutcome> {
        let batch = self.stage(operation)?;
        self.commit(principal, batch)
    }

    /// Build the write batch for an operation without touching storage.
    fn stage(&self, operation: Operation) -> Result<Vec<ScheduleWrite>> {
        match operation {
            Operation::Autofill {
                start,
                end,
                rotation,
                holidays,
                current_time,
            } => self.stage_autofill(start, end, rotation, holidays, current_time),

            Operation::AddHolidays { start, end, name } => {
                let mut batch = Vec::new();
                for date in ScheduleDate::range_inclusive(start, end) {
                    if date.is_weekend() {
                        continue;
                    }
                    batch.push(ScheduleWrite::Upsert {
                        date,
                        patch: ResolvedPatch {
                            periods: Some(Vec::new()),
                            name: Some(name.clone()),
                            ..Default::default()
                        },
                    });
                }
                Ok(batch)
            }

            Operation::EditSchedule { date, patch } => Ok(vec![ScheduleWrite::Upsert {
                date,
                patch: resolve_patch(patch, date, &self.config.override_rules),
            }]),

            Operation::ApplyPreset { date, preset } => {
                let preset = self
                    .store
                    .get_preset(&preset)
                    .ok_or(ScheduleError::PresetNotFound(preset))?;
                Ok(vec![ScheduleWrite::Upsert {
                    date,
                    patch: self.patch_from_preset(&preset, date),
                }])
            }

            Operation::MergeEvents {
                date,
                events,
                replace,
            } => Ok(vec![ScheduleWrite::MergeEvents {
                date,
                events,
                replace,
            }]),

            Operation::MergeLunch { lunch, replace } => Ok(lunch
                .into_iter()
                .map(|(date, items)| ScheduleWrite::MergeLunch {
                    date,
                    items,
                    replace,
                })
                .collect()),
        }
    }

    fn stage_autofill(
        &self,
        start: ScheduleDate,
        end: ScheduleDate,
        rotation: Vec<String>,
        holidays: BTreeSet<ScheduleDate>,
        current_time: DateTime<Utc>,
    ) -> Result<Vec<ScheduleWrite>> {
        let drift = Utc::now() - current_time;
        if drift.abs() > self.config.freshness_window {
            return Err(ScheduleError::Validation(
                "current-time marker is stale; refresh and retry".into(),
            ));
        }
        if rotation.is_empty() {
            return Err(ScheduleError::Validation(
                "autofill rotation must not be empty".into(),
            ));
        }

        let presets = rotation
            .iter()
            .map(|name| {
                self.store
                    .get_preset(name)
                    .ok_or_else(|| ScheduleError::PresetNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut batch = Vec::new();
        let mut index = 0;
        for date in ScheduleDate::range_inclusive(start, end) {
            // Skipped days do not consume a rotation slot.
            if date.is_weekend() || holidays.contains(&date) {
                continue;
            }
            batch.push(ScheduleWrite::Upsert {
                date,
                patch: self.patch_from_preset(&presets[index], date),
            });
            index = (index + 1) % presets.len();
        }
        Ok(batch)
    }

    fn patch_from_preset(&self, preset: &Preset, date: ScheduleDate) -> ResolvedPatch {
        ResolvedPatch {
            periods: Some(expand_periods(
                &preset.periods,
                date,
                &self.config.override_rules,
            )),
            preset: Some(preset.preset.clone()),
            code: preset.code.clone(),
            variant: preset.variant.clone(),
            name: preset.name.clone(),
        }
    }

    /// Commit a staged batch: document writes plus one revision append as an
    /// atomic pair, then publish to live subscribers.
    fn commit(&self, principal: &Principal, batch: Vec<ScheduleWrite>) -> Result<CommitOutcome> {
        let changes: BTreeSet<ScheduleDate> = batch.iter().map(|w| w.date()).collect();

        let (revision, schedules) = {
            let _commit = self.commit_lock.lock();
            let schedules = self.store.apply(&batch)?;
            let revision =
                self.revisions
                    .append(&principal.name, changes.clone(), schedules.clone());
            (revision, schedules)
        };

        tracing::info!(
            author = %principal.name,
            revision = revision.0,
            dates = changes.len(),
            "committed mutation batch"
        );

        // Publish strictly after the commit so subscribers never see a
        // revision id ahead of its documents.
        self.broadcaster.publish_revision(schedules.clone(), revision);

        Ok(CommitOutcome {
            revision,
            dates: changes.into_iter().collect(),
            schedules,
        })
    }
}
