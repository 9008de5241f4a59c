//! Administrative operation surface.
//!
//! Transport-free rendition of the operator API: every call takes an opaque
//! access token, resolves it through the [`Authorizer`] with the capability
//! the operation requires, and delegates to the coordinator, store, or bell
//! scheduler. The embedding HTTP layer maps these calls onto its routes.

use crate::auth::{Authorizer, Capability};
use crate::coordinator::{MutationCoordinator, Operation};
use crate::engine::Engine;
use crate::error::Result;
use crate::store::Announcement;
use crate::types::{
    Event, LunchItem, Preset, Schedule, ScheduleDate, SchedulePatch,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Capability-checked entry points for operator requests.
pub struct AdminSurface {
    engine: Arc<Engine>,
    authorizer: Arc<dyn Authorizer>,
}

impl AdminSurface {
    pub fn new(engine: Arc<Engine>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { engine, authorizer }
    }

    fn coordinator(&self) -> &MutationCoordinator {
        self.engine.coordinator()
    }

    fn confirm(dates: usize) -> String {
        format!("Successfully updated {} schedule(s).", dates)
    }

    // --- Bulk Writes ---

    pub fn autofill_schedule(
        &self,
        token: &str,
        start: ScheduleDate,
        end: ScheduleDate,
        rotation: Vec<String>,
        holidays: Vec<ScheduleDate>,
        current_time: DateTime<Utc>,
    ) -> Result<String> {
        let principal = self.authorizer.authorize(token, Capability::BulkWrite)?;
        let outcome = self.coordinator().apply(
            &principal,
            Operation::Autofill {
                start,
                end,
                rotation,
                holidays: holidays.into_iter().collect(),
                current_time,
            },
        )?;
        Ok(Self::confirm(outcome.dates.len()))
    }

    pub fn add_holidays(
        &self,
        token: &str,
        start: ScheduleDate,
        end: ScheduleDate,
        name: String,
    ) -> Result<String> {
        let principal = self.authorizer.authorize(token, Capability::BulkWrite)?;
        let outcome = self
            .coordinator()
            .apply(&principal, Operation::AddHolidays { start, end, name })?;
        Ok(Self::confirm(outcome.dates.len()))
    }

    // --- Single Writes ---

    pub fn edit_schedule(
        &self,
        token: &str,
        date: ScheduleDate,
        patch: SchedulePatch,
    ) -> Result<String> {
        let principal = self.authorizer.authorize(token, Capability::SingleWrite)?;
        let outcome = self
            .coordinator()
            .apply(&principal, Operation::EditSchedule { date, patch })?;
        Ok(Self::confirm(outcome.dates.len()))
    }

    pub fn add_from_preset(
        &self,
        token: &str,
        date: ScheduleDate,
        preset: String,
    ) -> Result<String> {
        let principal = self.authorizer.authorize(token, Capability::SingleWrite)?;
        let outcome = self
            .coordinator()
            .apply(&principal, Operation::ApplyPreset { date, preset })?;
        Ok(Self::confirm(outcome.dates.len()))
    }

    pub fn add_events(
        &self,
        token: &str,
        date: ScheduleDate,
        events: Vec<Event>,
        clear_all: bool,
    ) -> Result<String> {
        let principal = self.authorizer.authorize(token, Capability::SingleWrite)?;
        let outcome = self.coordinator().apply(
            &principal,
            Operation::MergeEvents {
                date,
                events,
                replace: clear_all,
            },
        )?;
        Ok(Self::confirm(outcome.dates.len()))
    }

    pub fn add_lunch(
        &self,
        token: &str,
        lunch: BTreeMap<ScheduleDate, Vec<LunchItem>>,
        clear_all: bool,
    ) -> Result<String> {
        let principal = self.authorizer.authorize(token, Capability::SingleWrite)?;
        let outcome = self.coordinator().apply(
            &principal,
            Operation::MergeLunch {
                lunch,
                replace: clear_all,
            },
        )?;
        Ok(Self::confirm(outcome.dates.len()))
    }

    // --- Presets ---

    pub fn add_preset(&self, token: &str, preset: Preset) -> Result<String> {
        self.authorizer.authorize(token, Capability::SingleWrite)?;
        self.engine.store().put_preset(preset);
        Ok("Success.".to_string())
    }

    pub fn get_all_presets(&self, token: &str) -> Result<Vec<Preset>> {
        self.authorizer.authorize(token, Capability::Read)?;
        Ok(self.engine.store().all_presets())
    }

    // --- Message / Announcement ---

    pub fn get_message(&self, token: &str) -> Result<String> {
        self.authorizer.authorize(token, Capability::Read)?;
        Ok(self.engine.store().message())
    }

    pub fn edit_message(&self, token: &str, message: String) -> Result<String> {
        self.authorizer.authorize(token, Capability::EditMessage)?;
        self.engine.store().set_message(message.clone());
        self.engine.broadcaster().publish_message(message);
        Ok("Success.".to_string())
    }

    pub fn get_announcement(&self, token: &str) -> Result<Option<Announcement>> {
        self.authorizer.authorize(token, Capability::Read)?;
        Ok(self.engine.store().announcement())
    }

    pub fn edit_announcement(&self, token: &str, message: String) -> Result<String> {
        self.authorizer.authorize(token, Capability::EditMessage)?;
        let announcement = self.engine.store().set_announcement(message);
        self.engine
            .broadcaster()
            .publish_announcement(announcement.text, announcement.date);
        Ok("Success.".to_string())
    }

    // --- Bell Scheduler ---

    pub fn start_bell(&self, token: &str) -> Result<String> {
        self.authorizer.authorize(token, Capability::Special)?;
        self.engine.bell().start();
        Ok("Done".to_string())
    }

    pub fn stop_bell(&self, token: &str) -> Result<String> {
        self.authorizer.authorize(token, Capability::Special)?;
        self.engine.bell().stop();
        Ok("Done".to_string())
    }

    // --- Read-only Day Lookups ---

    /// Point-in-time range read for the live transport's schedule requests.
    pub fn request_schedules(&self, start: ScheduleDate, end: ScheduleDate) -> Vec<Schedule> {
        self.engine.store().get_range(start, end)
    }
}
