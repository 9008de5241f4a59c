//! Core types for the schedule engine.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Calendar date key for a schedule, meaning UTC midnight of that day.
///
/// All schedule documents and revision change-sets are keyed by this type,
/// so two representations of the same day always compare equal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScheduleDate(pub NaiveDate);

impl ScheduleDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(ScheduleDate)
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.0.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Combine with a time of day into an absolute UTC instant.
    pub fn at(&self, time: NaiveTime) -> DateTime<Utc> {
        self.0.and_time(time).and_utc()
    }

    /// UTC midnight of this date.
    pub fn midnight(&self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }

    /// The calendar date containing an instant.
    pub fn of(instant: DateTime<Utc>) -> Self {
        ScheduleDate(instant.date_naive())
    }

    /// Iterate every date in `[start, end]`. Empty when `end < start`.
    pub fn range_inclusive(start: Self, end: Self) -> impl Iterator<Item = Self> {
        start.0.iter_days().take_while(move |d| *d <= end.0).map(ScheduleDate)
    }
}

impl fmt::Debug for ScheduleDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScheduleDate({})", self.0)
    }
}

impl fmt::Display for ScheduleDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a committed revision.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RevisionId(pub u64);

impl fmt::Debug for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RevisionId({})", self.0)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A period time as supplied by templates and edit requests.
///
/// Templates carry times of day that are combined with a concrete date during
/// expansion; edit requests may instead carry absolute instants, which pass
/// through expansion unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    Instant(DateTime<Utc>),
    TimeOfDay(NaiveTime),
}

impl TimeSpec {
    /// Resolve to an absolute instant on the given date.
    pub fn resolve(&self, date: ScheduleDate) -> DateTime<Utc> {
        match *self {
            TimeSpec::Instant(instant) => instant,
            TimeSpec::TimeOfDay(time) => date.at(time),
        }
    }
}

/// One time period within a concrete per-day schedule.
///
/// Periods have no identity of their own; their position in the schedule's
/// sequence is the only identity across edits. Overlap and start/end ordering
/// are not validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub no_ical: bool,
    #[serde(default)]
    pub force_lunch: bool,
}

/// A period inside a template or edit payload, before expansion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplatePeriod {
    pub name: String,
    pub start: TimeSpec,
    pub end: TimeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub no_ical: bool,
    #[serde(default)]
    pub force_lunch: bool,
}

/// One lunch menu item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LunchItem {
    pub place: String,
    pub food: String,
}

/// A calendar event attached to a schedule day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub no_ical: bool,
}

/// The schedule document for a single calendar date.
///
/// `lunch` and `events` always exist (possibly empty) from the moment the
/// document is first created; schedule-level writes never truncate them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: ScheduleDate,
    #[serde(default)]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub lunch: Vec<LunchItem>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Schedule {
    /// A fresh document for a date that has never been written.
    pub fn new(date: ScheduleDate) -> Self {
        Self {
            date,
            periods: Vec::new(),
            lunch: Vec::new(),
            events: Vec::new(),
            code: None,
            variant: None,
            preset: None,
            name: None,
        }
    }
}

/// A named, reusable schedule shape with relative period times.
///
/// Presets are owned by operators and overwritten wholesale by name on
/// re-insert; there is no preset versioning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Unique preset name, the replace-on-insert key.
    pub preset: String,
    #[serde(default)]
    pub periods: Vec<TemplatePeriod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Partial update for a single schedule document, as supplied by operators.
///
/// A present field overwrites the stored value; an absent field leaves it
/// unchanged. Lunch and events have their own merge operations and are never
/// touched by a patch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods: Option<Vec<TemplatePeriod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A schedule patch with period times already resolved to absolute instants.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedPatch {
    pub periods: Option<Vec<Period>>,
    pub preset: Option<String>,
    pub code: Option<String>,
    pub variant: Option<String>,
    pub name: Option<String>,
}

/// An immutable record of one committed mutation batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Revision {
    /// Strictly increasing in commit order.
    pub id: RevisionId,
    pub timestamp: DateTime<Utc>,
    /// Name of the operator that committed the batch.
    pub author: String,
    /// Exactly the dates touched by the batch.
    pub changes: BTreeSet<ScheduleDate>,
    /// Snapshot of the resulting documents for those dates.
    pub documents: Vec<Schedule>,
}
