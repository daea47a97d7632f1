//! Time arithmetic for the reconciler: when to wake next, and which scheduled
//! time (if any) is due now.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::api::CronJob;
use crate::schedule::{minute_floor, Schedule};

/// Slack added to every requeue so the worker wakes just after the scheduled
/// instant, never before it.
pub const NEXT_SCHEDULE_DELTA: Duration = Duration::from_millis(100);

/// Missed starts beyond this count stop being enumerated individually.
pub const MAX_MISSED_STARTS: u32 = 100;

/// Delay until the tick after `now`, including the fixed slack.
pub fn next_schedule_duration(schedule: &Schedule, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.next(now)?;
    let lead = (next - now).to_std().unwrap_or_default();
    Some(lead + NEXT_SCHEDULE_DELTA)
}

/// Result of enumerating unstarted scheduled times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedStarts {
    /// The latest scheduled time ≤ now, i.e. the one to run, if any is due.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// How many scheduled times ≤ now went unstarted (including the latest).
    pub missed: u32,
    /// More than [`MAX_MISSED_STARTS`] went unstarted; enumeration stopped.
    pub excessive: bool,
}

impl MissedStarts {
    fn none_due() -> Self {
        Self { scheduled_time: None, missed: 0, excessive: false }
    }
}

/// Enumerate scheduled times strictly after the CronJob's last handled tick
/// (or its creation) and at most `now`, bounded by the starting deadline.
pub fn missed_starts(schedule: &Schedule, cron_job: &CronJob, now: DateTime<Utc>) -> MissedStarts {
    let mut earliest = cron_job
        .status
        .last_schedule_time
        .or(cron_job.metadata.creation_timestamp)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    if let Some(deadline) = cron_job.starting_deadline() {
        // Anything that missed its window is no longer a candidate.
        let window_start = now - deadline;
        if window_start > earliest {
            earliest = window_start;
        }
    }

    if earliest > now {
        return MissedStarts::none_due();
    }

    most_recent_schedule_time(schedule, earliest, now)
}

fn most_recent_schedule_time(
    schedule: &Schedule,
    earliest: DateTime<Utc>,
    now: DateTime<Utc>,
) -> MissedStarts {
    let mut missed = 0u32;
    let mut latest = None;
    let mut cursor = earliest;

    while let Some(next) = schedule.next(cursor) {
        if next > now {
            break;
        }
        missed += 1;
        latest = Some(next);
        if missed > MAX_MISSED_STARTS {
            // Stop walking forward; the latest due time is reachable from the
            // other end. This bounds CPU for long-stalled objects.
            let ceiling = minute_floor(now)
                .map(|floor| floor + chrono::Duration::minutes(1))
                .unwrap_or(now);
            latest = schedule.prev(ceiling).or(latest);
            return MissedStarts { scheduled_time: latest, missed, excessive: true };
        }
        cursor = next;
    }

    MissedStarts { scheduled_time: latest, missed, excessive: false }
}
