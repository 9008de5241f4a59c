//! Template expansion: turning a schedule template into a concrete per-day
//! schedule under day-of-week override rules.

use crate::types::{Period, ResolvedPatch, ScheduleDate, SchedulePatch, TemplatePeriod, TimeSpec};
use chrono::{NaiveTime, Weekday};

/// Day-of-week override configuration.
///
/// The collaboration window is the time slot that "Collaboration" periods are
/// rewritten into on non-Friday weekdays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverrideRules {
    pub collaboration_start: NaiveTime,
    pub collaboration_end: NaiveTime,
}

impl Default for OverrideRules {
    fn default() -> Self {
        Self {
            collaboration_start: NaiveTime::from_hms_opt(15, 10, 0).expect("valid literal time"),
            collaboration_end: NaiveTime::from_hms_opt(15, 30, 0).expect("valid literal time"),
        }
    }
}

/// Expand template periods for a concrete date.
///
/// Pure and deterministic. Builds a new sequence whose ordering matches the
/// input minus dropped entries:
///
/// - "Collaboration" becomes "Office Hours" (Mon/Tue/Thu) or
///   "Faculty Meeting" (Wed) in the configured window, and is dropped
///   entirely on Friday.
/// - "Activity Block" is renamed per weekday with its time unchanged.
/// - Everything else passes through as-is.
///
/// Times of day are combined with `date`; absolute instants (edit paths) pass
/// through unchanged.
pub fn expand_periods(
    periods: &[TemplatePeriod],
    date: ScheduleDate,
    rules: &OverrideRules,
) -> Vec<Period> {
    let weekday = date.weekday();
    let mut out = Vec::with_capacity(periods.len());

    for period in periods {
        let mut name = period.name.clone();
        let mut start = period.start;
        let mut end = period.end;

        if period.name == "Collaboration" {
            match weekday {
                Weekday::Mon | Weekday::Tue | Weekday::Thu => {
                    name = "Office Hours".to_string();
                    start = TimeSpec::TimeOfDay(rules.collaboration_start);
                    end = TimeSpec::TimeOfDay(rules.collaboration_end);
                }
                Weekday::Wed => {
                    name = "Faculty Meeting".to_string();
                    start = TimeSpec::TimeOfDay(rules.collaboration_start);
                    end = TimeSpec::TimeOfDay(rules.collaboration_end);
                }
                Weekday::Fri => continue,
                _ => {}
            }
        } else if period.name == "Activity Block" {
            match weekday {
                Weekday::Mon => name = "Clubs / Office Hours".to_string(),
                Weekday::Tue => name = "Advisory / Class Meeting".to_string(),
                Weekday::Wed => name = "Office Hours".to_string(),
                Weekday::Thu => name = "Spirit / Assembly".to_string(),
                Weekday::Fri => name = "Clubs".to_string(),
                _ => {}
            }
        }

        out.push(Period {
            name,
            start: start.resolve(date),
            end: end.resolve(date),
            location: period.location.clone(),
            link: period.link.clone(),
            no_ical: period.no_ical,
            force_lunch: period.force_lunch,
        });
    }

    out
}

/// Resolve an operator-supplied patch for a concrete date, running any
/// supplied periods through expansion.
pub fn resolve_patch(patch: SchedulePatch, date: ScheduleDate, rules: &OverrideRules) -> ResolvedPatch {
    ResolvedPatch {
        periods: patch
            .periods
            .map(|periods| expand_periods(&periods, date, rules)),
        preset: patch.preset,
        code: patch.code,
        variant: patch.variant,
        name: patch.name,
    }
}
