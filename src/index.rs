//! Reconciled view of a CronJob's children.
//!
//! The controller's `status.active` list and the informer's job slice can
//! each lag the other. The index merges them into the active set the next
//! status should carry, plus what finished since the last look.

use chrono::{DateTime, Utc};

use crate::api::{CronJob, Job, JobConditionType, ObjectReference};

/// A child observed in a terminal state while still listed as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedChild {
    pub name: String,
    pub condition: JobConditionType,
}

#[derive(Debug, Clone, Default)]
pub struct ChildJobIndex {
    /// References the next status should carry as active. Stale references
    /// (listed but unobserved) are retained; the lister may simply be behind.
    pub active: Vec<ObjectReference>,
    /// Children that left the active set this cycle.
    pub newly_finished: Vec<FinishedChild>,
    /// Latest completion time among children that completed successfully.
    pub most_recent_completion: Option<DateTime<Utc>>,
    /// Whether `active` differs from the status it was built from.
    pub active_changed: bool,
}

impl ChildJobIndex {
    pub fn build(cron_job: &CronJob, jobs: &[Job]) -> Self {
        let mut index = Self {
            active: cron_job.status.active.clone(),
            ..Self::default()
        };

        for job in jobs {
            let listed = index.active.iter().any(|r| r.uid == job.metadata.uid);
            if !job.controlled_by(cron_job) && !listed {
                // Someone else's job, or an orphan: not ours to track.
                continue;
            }

            match job.finished_condition() {
                Some(condition) => {
                    if listed {
                        index.active.retain(|r| r.uid != job.metadata.uid);
                        index.active_changed = true;
                        index.newly_finished.push(FinishedChild {
                            name: job.metadata.name.clone(),
                            condition,
                        });
                    }
                    if condition == JobConditionType::Complete {
                        if let Some(done) = job.status.completion_time {
                            if index.most_recent_completion.map_or(true, |t| done > t) {
                                index.most_recent_completion = Some(done);
                            }
                        }
                    }
                }
                None => {
                    if !listed {
                        // The informer saw the creation before our status
                        // update landed.
                        index.active.push(job.object_reference());
                        index.active_changed = true;
                    }
                }
            }
        }

        index
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::api::{job_from_template, CronJobSpec, JobCondition, ObjectMeta};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn parent() -> CronJob {
        CronJob {
            metadata: ObjectMeta {
                name: "report".to_string(),
                namespace: "default".to_string(),
                uid: "cj-uid".to_string(),
                creation_timestamp: Some(utc(2016, 5, 19, 9, 0, 0)),
                ..ObjectMeta::default()
            },
            spec: CronJobSpec { schedule: "0 * * * *".to_string(), ..CronJobSpec::default() },
            ..CronJob::default()
        }
    }

    fn child(cj: &CronJob, uid: &str, scheduled: DateTime<Utc>) -> Job {
        let mut job = job_from_template(cj, scheduled);
        job.metadata.uid = uid.to_string();
        job
    }

    fn completed(mut job: Job, at: DateTime<Utc>) -> Job {
        job.status.completion_time = Some(at);
        job.status.conditions.push(JobCondition {
            condition_type: JobConditionType::Complete,
            status: true,
        });
        job
    }

    #[test]
    fn running_child_is_adopted_into_active() {
        let cj = parent();
        let job = child(&cj, "job-1", utc(2016, 5, 19, 10, 0, 0));

        let index = ChildJobIndex::build(&cj, &[job.clone()]);

        assert_eq!(index.active, vec![job.object_reference()]);
        assert!(index.active_changed);
        assert!(index.newly_finished.is_empty());
    }

    #[test]
    fn listed_and_observed_child_is_no_change() {
        let mut cj = parent();
        let job = child(&cj, "job-1", utc(2016, 5, 19, 10, 0, 0));
        cj.status.active.push(job.object_reference());

        let index = ChildJobIndex::build(&cj, &[job.clone()]);

        assert_eq!(index.active, vec![job.object_reference()]);
        assert!(!index.active_changed);
    }

    #[test]
    fn unobserved_reference_is_retained() {
        let mut cj = parent();
        let stale = ObjectReference {
            namespace: "default".to_string(),
            name: "report-1463652000".to_string(),
            uid: "gone".to_string(),
        };
        cj.status.active.push(stale.clone());

        let index = ChildJobIndex::build(&cj, &[]);

        assert_eq!(index.active, vec![stale]);
        assert!(!index.active_changed);
    }

    #[test]
    fn unowned_job_is_ignored() {
        let cj = parent();
        let mut job = child(&cj, "job-1", utc(2016, 5, 19, 10, 0, 0));
        job.metadata.owner_references.clear();

        let index = ChildJobIndex::build(&cj, &[job]);

        assert!(index.active.is_empty());
        assert!(!index.active_changed);
    }

    #[test]
    fn listed_reference_claims_even_without_owner_reference() {
        let mut cj = parent();
        let mut job = child(&cj, "job-1", utc(2016, 5, 19, 10, 0, 0));
        job.metadata.owner_references.clear();
        cj.status.active.push(job.object_reference());
        let job = completed(job, utc(2016, 5, 19, 10, 5, 0));

        let index = ChildJobIndex::build(&cj, &[job]);

        assert!(index.active.is_empty(), "finished child must leave the active set");
        assert_eq!(index.newly_finished.len(), 1);
    }

    #[test]
    fn finished_child_leaves_active_and_reports_completion() {
        let mut cj = parent();
        let job = child(&cj, "job-1", utc(2016, 5, 19, 10, 0, 0));
        cj.status.active.push(job.object_reference());
        let done_at = utc(2016, 5, 19, 10, 0, 10);
        let job = completed(job, done_at);

        let index = ChildJobIndex::build(&cj, &[job]);

        assert!(index.active.is_empty());
        assert!(index.active_changed);
        assert_eq!(index.most_recent_completion, Some(done_at));
        assert_eq!(
            index.newly_finished,
            vec![FinishedChild { name: "report-1463652000".to_string(), condition: JobConditionType::Complete }]
        );
    }

    #[test]
    fn failed_child_does_not_contribute_completion_time() {
        let mut cj = parent();
        let mut job = child(&cj, "job-1", utc(2016, 5, 19, 10, 0, 0));
        cj.status.active.push(job.object_reference());
        job.status.completion_time = Some(utc(2016, 5, 19, 10, 0, 10));
        job.status.conditions.push(JobCondition {
            condition_type: JobConditionType::Failed,
            status: true,
        });

        let index = ChildJobIndex::build(&cj, &[job]);

        assert!(index.active.is_empty());
        assert_eq!(index.most_recent_completion, None);
        assert_eq!(index.newly_finished[0].condition, JobConditionType::Failed);
    }

    #[test]
    fn latest_completion_wins() {
        let cj = parent();
        let early = completed(
            child(&cj, "job-1", utc(2016, 5, 19, 8, 0, 0)),
            utc(2016, 5, 19, 8, 0, 10),
        );
        let late = completed(
            child(&cj, "job-2", utc(2016, 5, 19, 9, 0, 0)),
            utc(2016, 5, 19, 9, 0, 10),
        );

        let index = ChildJobIndex::build(&cj, &[late.clone(), early]);

        assert_eq!(index.most_recent_completion, Some(utc(2016, 5, 19, 9, 0, 10)));
    }
}
