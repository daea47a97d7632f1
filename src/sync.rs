//! The controller: turns a decision into effects, in an order that keeps the
//! status honest.
//!
//! Within one reconcile the order is fixed: replace-victim deletions first,
//! then the creation, then the status update, so that `status.active` always
//! reflects the creation result by the time it is persisted.

use std::time::Duration;

use crate::api::{job_from_template, CronJob, Job};
use crate::decision;
use crate::error::SyncError;
use crate::events::{reason, EventType};
use crate::index::ChildJobIndex;
use crate::status;
use crate::traits::{Clock, CronJobControl, EventRecorder, JobControl};

/// What one reconcile tick produced.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Fresh copy of the CronJob with the new status. The input object is
    /// never mutated.
    pub cron_job: CronJob,
    /// When to reconcile this object again, when the tick settled normally.
    pub requeue_after: Option<Duration>,
    /// Whether the status differs from the input and should be persisted.
    pub status_changed: bool,
    /// A transient failure to surface to the workqueue for backoff. Status
    /// progress made before the failure is still reported above.
    pub error: Option<SyncError>,
}

/// Reconciles CronJob objects through the three cluster seams and an injected
/// clock. One instance serves any number of objects; all state lives in the
/// objects themselves.
pub struct Controller<J, C, R, K> {
    job_control: J,
    cron_job_control: C,
    recorder: R,
    clock: K,
}

impl<J, C, R, K> Controller<J, C, R, K>
where
    J: JobControl,
    C: CronJobControl,
    R: EventRecorder,
    K: Clock,
{
    pub fn new(job_control: J, cron_job_control: C, recorder: R, clock: K) -> Self {
        Self { job_control, cron_job_control, recorder, clock }
    }

    /// Run one full reconcile: decide, execute effects, then persist the
    /// status when it changed. The status is flushed on the error path too,
    /// so progress made before a failure is not lost. Returns the requeue
    /// delay.
    pub async fn reconcile(
        &self,
        cron_job: &CronJob,
        jobs: &[Job],
    ) -> Result<Option<Duration>, SyncError> {
        let outcome = self.sync_cron_job(cron_job, jobs).await;

        if outcome.status_changed {
            if let Err(err) = self.cron_job_control.update_status(&outcome.cron_job).await {
                tracing::warn!(cronjob = %cron_job.key(), error = %err, "Unable to update status");
                return Err(err);
            }
        }

        match outcome.error {
            Some(err) => Err(err),
            None => Ok(outcome.requeue_after),
        }
    }

    /// The core decision procedure. Issues deletes and the create, but leaves
    /// persisting the status to [`Controller::reconcile`] so callers can see
    /// `status_changed` separately.
    pub async fn sync_cron_job(&self, cron_job: &CronJob, jobs: &[Job]) -> SyncOutcome {
        let now = self.clock.now();
        let index = ChildJobIndex::build(cron_job, jobs);
        let decision = decision::evaluate(cron_job, &index, now);
        let object = cron_job.object_reference();

        for event in &decision.events {
            self.recorder.event(&object, event.event_type, event.reason, &event.message);
        }

        let mut status_changed = decision.patch.changed;
        let mut updated = status::apply(cron_job, &decision.patch);

        // Replace victims go first. A victim that cannot even be resolved
        // aborts the tick: the policy forbids creating alongside an unknown
        // survivor.
        if decision.create_at.is_some() {
            for victim in &decision.deletes {
                let job = match self.job_control.get_job(&victim.namespace, &victim.name).await {
                    Ok(job) => job,
                    Err(err) => {
                        self.recorder.event(
                            &object,
                            EventType::Warning,
                            reason::FAILED_GET,
                            &format!("Error getting job {}/{}: {err}", victim.namespace, victim.name),
                        );
                        return SyncOutcome {
                            cron_job: updated,
                            requeue_after: None,
                            status_changed,
                            error: Some(err),
                        };
                    }
                };

                match self.job_control.delete_job(&job.metadata.namespace, &job.metadata.name).await {
                    Ok(()) => {
                        tracing::info!(cronjob = %cron_job.key(), job = %job.metadata.name, "Deleted job");
                        self.recorder.event(
                            &object,
                            EventType::Normal,
                            reason::SUCCESSFUL_DELETE,
                            &format!("Deleted job {}", job.metadata.name),
                        );
                    }
                    Err(err) => {
                        // Best effort: the replacement still goes ahead.
                        tracing::warn!(cronjob = %cron_job.key(), job = %job.metadata.name, error = %err, "Error deleting job");
                        self.recorder.event(
                            &object,
                            EventType::Warning,
                            reason::FAILED_DELETE,
                            &format!("Error deleting job {}: {err}", job.metadata.name),
                        );
                    }
                }

                updated.status.active.retain(|r| r.uid != victim.uid);
                status_changed = true;
            }
        }

        if let Some(scheduled_time) = decision.create_at {
            let job = job_from_template(cron_job, scheduled_time);
            match self.job_control.create_job(&cron_job.metadata.namespace, job).await {
                Ok(created) => {
                    tracing::info!(cronjob = %cron_job.key(), job = %created.metadata.name, "Created job");
                    self.recorder.event(
                        &object,
                        EventType::Normal,
                        reason::SUCCESSFUL_CREATE,
                        &format!("Created job {}", created.metadata.name),
                    );
                    updated.status.active.push(created.object_reference());
                    updated.status.last_schedule_time = Some(scheduled_time);
                    status_changed = true;
                }
                Err(err) if err.is_already_exists() => {
                    // A previous tick created it and lost the bookkeeping, or
                    // the clock drifted back. Either way the work exists: the
                    // next informer pass will pick the child up.
                    tracing::info!(cronjob = %cron_job.key(), scheduled = %scheduled_time, "Job already exists");
                    updated.status.last_schedule_time = Some(scheduled_time);
                    status_changed = true;
                }
                Err(err) => {
                    self.recorder.event(
                        &object,
                        EventType::Warning,
                        reason::FAILED_CREATE,
                        &format!("Error creating job: {err}"),
                    );
                    return SyncOutcome {
                        cron_job: updated,
                        requeue_after: None,
                        status_changed,
                        error: Some(err),
                    };
                }
            }
        }

        SyncOutcome {
            cron_job: updated,
            requeue_after: decision.requeue_after,
            status_changed,
            error: None,
        }
    }
}
