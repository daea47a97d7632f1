//! Standard 5-field cron expressions, evaluated in UTC.
//!
//! ```text
//! ┌───────────── minute (0-59)
//! │ ┌───────────── hour (0-23)
//! │ │ ┌───────────── day of month (1-31)
//! │ │ │ ┌───────────── month (1-12)
//! │ │ │ │ ┌───────────── day of week (0-7, 0 and 7 = Sunday)
//! │ │ │ │ │
//! * * * * *
//! ```
//!
//! Field syntax: `*`, lists (`1,3,5`), ranges (`1-5`), steps (`*/5`,
//! `0-30/5`). `?` is accepted in the day fields as an alias for `*`, and the
//! usual `@hourly`-style descriptors are supported. When both day fields are
//! restricted, a time matches if either does (vixie-cron rule).

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use crate::error::SyncError;

/// Upper bound on the minute walk (covers a leap cycle), so a schedule that
/// can never fire terminates instead of spinning.
const MAX_SEARCH_MINUTES: u32 = 4 * 366 * 24 * 60;

/// A parsed cron expression.
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, SyncError> {
        let normalized = match expression.trim() {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other => other,
        };

        let parts: Vec<&str> = normalized.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(invalid(
                expression,
                format!("expected 5 fields, got {}", parts.len()),
            ));
        }

        let minutes = parse_field(expression, parts[0], 0, 59, "minute")?;
        let hours = parse_field(expression, parts[1], 0, 23, "hour")?;
        let days_of_month = parse_field(expression, day_field(parts[2]), 1, 31, "day-of-month")?;
        let months = parse_field(expression, parts[3], 1, 12, "month")?;
        let mut days_of_week = parse_field(expression, day_field(parts[4]), 0, 7, "day-of-week")?;
        // 7 is an alias for Sunday.
        if days_of_week.remove(&7) {
            days_of_week.insert(0);
        }

        Ok(Self {
            expression: expression.to_string(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: is_restricted(parts[2]),
            dow_restricted: is_restricted(parts[4]),
        })
    }

    /// The original expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn matches(&self, t: &DateTime<Utc>) -> bool {
        let time_ok = self.minutes.contains(&t.minute())
            && self.hours.contains(&t.hour())
            && self.months.contains(&t.month());
        if !time_ok {
            return false;
        }

        let dom_ok = self.days_of_month.contains(&t.day());
        let dow_ok = self.days_of_week.contains(&t.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom_ok || dow_ok
        } else {
            dom_ok && dow_ok
        }
    }

    /// Earliest scheduled time strictly after `after`, if one exists within
    /// the search bound.
    pub fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut current = minute_floor(after)? + Duration::minutes(1);
        for _ in 0..MAX_SEARCH_MINUTES {
            if self.matches(&current) {
                return Some(current);
            }
            current += Duration::minutes(1);
        }
        None
    }

    /// Latest scheduled time strictly before `before`, if one exists within
    /// the search bound.
    pub fn prev(&self, before: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut current = minute_floor(before)?;
        if current >= before {
            current -= Duration::minutes(1);
        }
        for _ in 0..MAX_SEARCH_MINUTES {
            if self.matches(&current) {
                return Some(current);
            }
            current -= Duration::minutes(1);
        }
        None
    }
}

/// Truncate to the containing minute.
pub(crate) fn minute_floor(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(t.year(), t.month(), t.day(), t.hour(), t.minute(), 0)
        .single()
}

fn invalid(expression: &str, reason: String) -> SyncError {
    SyncError::InvalidSchedule { expr: expression.to_string(), reason }
}

/// `?` means "no restriction" in the day fields.
fn day_field(field: &str) -> &str {
    if field == "?" { "*" } else { field }
}

fn is_restricted(field: &str) -> bool {
    !(field == "?" || field.starts_with('*'))
}

fn parse_field(
    expression: &str,
    field: &str,
    min: u32,
    max: u32,
    name: &str,
) -> Result<BTreeSet<u32>, SyncError> {
    let mut values = BTreeSet::new();

    for part in field.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (range_part, step) = match part.split_once('/') {
            Some((range, step_str)) => {
                let step: u32 = step_str.parse().map_err(|_| {
                    invalid(expression, format!("invalid step {step_str:?} in {name}"))
                })?;
                if step == 0 {
                    return Err(invalid(expression, format!("step cannot be 0 in {name}")));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range_part == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range_part.split_once('-') {
            let start: u32 = lo.parse().map_err(|_| {
                invalid(expression, format!("invalid range start {lo:?} in {name}"))
            })?;
            let end: u32 = hi.parse().map_err(|_| {
                invalid(expression, format!("invalid range end {hi:?} in {name}"))
            })?;
            (start, end)
        } else {
            let value: u32 = range_part.parse().map_err(|_| {
                invalid(expression, format!("invalid value {range_part:?} in {name}"))
            })?;
            (value, value)
        };

        for bound in [start, end] {
            if bound < min || bound > max {
                return Err(invalid(
                    expression,
                    format!("value {bound} out of range ({min}-{max}) in {name}"),
                ));
            }
        }
        if start > end {
            return Err(invalid(
                expression,
                format!("inverted range {start}-{end} in {name}"),
            ));
        }

        let step = step.unwrap_or(1);
        let mut current = start;
        while current <= end {
            values.insert(current);
            current += step;
        }
    }

    if values.is_empty() {
        return Err(invalid(expression, format!("no values in {name}")));
    }

    Ok(values)
}
