//! The reconciliation state machine.
//!
//! `evaluate` is a total function over the CronJob, the reconciled child
//! index, and the injected clock reading. It performs no I/O: it produces a
//! [`ReconcileDecision`] describing what the effect executor should do and
//! what the new status looks like. Rules are evaluated top-down; the first
//! one that settles the tick wins.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::api::{job_name, ConcurrencyPolicy, CronJob, ObjectReference};
use crate::events::{reason, Event};
use crate::index::ChildJobIndex;
use crate::schedule::Schedule;
use crate::timing;

/// Status fields the reconcile wants written. `None` time fields mean "leave
/// as is"; the active list always reflects the decision's view.
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub active: Vec<ObjectReference>,
    pub last_schedule_time: Option<DateTime<Utc>>,
    pub last_successful_time: Option<DateTime<Utc>>,
    /// Whether anything above differs from the status it was derived from.
    pub changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileDecision {
    /// Scheduled time a child should be created for, if one is due and
    /// permitted.
    pub create_at: Option<DateTime<Utc>>,
    /// Active children to replace (delete before creating).
    pub deletes: Vec<ObjectReference>,
    pub patch: StatusPatch,
    /// When the caller should reconcile this object again.
    pub requeue_after: Option<Duration>,
    /// Events to record, in order, before any effect runs.
    pub events: Vec<Event>,
}

pub fn evaluate(cron_job: &CronJob, index: &ChildJobIndex, now: DateTime<Utc>) -> ReconcileDecision {
    let mut decision = ReconcileDecision {
        patch: StatusPatch {
            active: index.active.clone(),
            last_schedule_time: None,
            last_successful_time: None,
            changed: index.active_changed,
        },
        ..ReconcileDecision::default()
    };

    // Completions are folded in regardless of how the rest of the tick goes.
    for finished in &index.newly_finished {
        decision.events.push(Event::normal(
            reason::SAW_COMPLETED_JOB,
            format!("Saw completed job: {}, condition: {}", finished.name, finished.condition),
        ));
    }
    if let Some(done) = index.most_recent_completion {
        if cron_job.status.last_successful_time.map_or(true, |t| done > t) {
            decision.patch.last_successful_time = Some(done);
            decision.patch.changed = true;
        }
    }

    let schedule = match Schedule::parse(&cron_job.spec.schedule) {
        Ok(schedule) => schedule,
        Err(err) => {
            // A spec problem, not a transient one: warn once and wait for an
            // update to the object.
            tracing::debug!(cronjob = %cron_job.key(), error = %err, "Unparseable schedule");
            decision
                .events
                .push(Event::warning(reason::UNPARSEABLE_SCHEDULE, format!("unparseable schedule: {err}")));
            return decision;
        }
    };

    let missed = timing::missed_starts(&schedule, cron_job, now);
    if missed.excessive {
        decision.events.push(Event::warning(
            reason::TOO_MANY_MISSED_TIMES,
            format!(
                "too many missed start times: {}. Set or decrease .spec.startingDeadlineSeconds or check clock skew",
                missed.missed
            ),
        ));
    }

    let Some(scheduled_time) = missed.scheduled_time else {
        tracing::debug!(cronjob = %cron_job.key(), "No unmet start times");
        decision.requeue_after = timing::next_schedule_duration(&schedule, now);
        return decision;
    };

    if let Some(deadline) = cron_job.starting_deadline() {
        if now - scheduled_time > deadline {
            // The miss is not consumed into last_schedule_time; a single
            // skipped tick stays silent.
            tracing::debug!(cronjob = %cron_job.key(), scheduled = %scheduled_time, "Missed starting window");
            if missed.excessive {
                decision.events.push(Event::warning(
                    reason::MISS_SCHEDULE,
                    format!("Missed scheduled time to start a job: {}", scheduled_time.to_rfc3339()),
                ));
            }
            decision.requeue_after = timing::next_schedule_duration(&schedule, now);
            return decision;
        }
    }

    if cron_job.spec.suspend {
        tracing::debug!(cronjob = %cron_job.key(), "Not starting job because the cron is suspended");
        advance_schedule(&mut decision.patch, cron_job, scheduled_time);
        return decision;
    }

    // At most one creation per scheduled time: a previous reconcile may have
    // created the child and only partially landed its bookkeeping.
    let due_name = job_name(cron_job, scheduled_time);
    if decision.patch.active.iter().any(|r| r.name == due_name)
        || cron_job.status.last_schedule_time == Some(scheduled_time)
    {
        tracing::debug!(cronjob = %cron_job.key(), job = %due_name, "Scheduled time already processed");
        decision.requeue_after = timing::next_schedule_duration(&schedule, now);
        return decision;
    }

    match cron_job.spec.concurrency_policy {
        ConcurrencyPolicy::Forbid if !decision.patch.active.is_empty() => {
            tracing::debug!(
                cronjob = %cron_job.key(),
                "Not starting job because prior execution is still running and concurrency policy is Forbid"
            );
            decision.events.push(Event::normal(
                reason::JOB_ALREADY_ACTIVE,
                "Not starting job because prior execution is running and concurrency policy is Forbid"
                    .to_string(),
            ));
            advance_schedule(&mut decision.patch, cron_job, scheduled_time);
            decision.requeue_after = timing::next_schedule_duration(&schedule, now);
            return decision;
        }
        ConcurrencyPolicy::Replace => {
            // Every active child is a victim; the executor resolves and
            // deletes them before creating.
            decision.deletes = decision.patch.active.clone();
        }
        _ => {}
    }

    decision.create_at = Some(scheduled_time);
    decision.requeue_after = timing::next_schedule_duration(&schedule, now);
    decision
}

fn advance_schedule(patch: &mut StatusPatch, cron_job: &CronJob, scheduled_time: DateTime<Utc>) {
    if cron_job.status.last_schedule_time != Some(scheduled_time) {
        patch.last_schedule_time = Some(scheduled_time);
        patch.changed = true;
    }
}
