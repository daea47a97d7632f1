//! Object model for CronJob parents and their child Jobs.
//!
//! These are value types: the reconciler reads them immutably, mutates deep
//! copies, and identifies objects by UID. The child Job payload is carried as
//! opaque JSON; the controller stamps it onto children and never interprets it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API version stamped on controller owner references.
pub const CONTROLLER_API_VERSION: &str = "batch/v1";
/// Kind stamped on controller owner references.
pub const CONTROLLER_KIND: &str = "CronJob";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
}

/// Reference to a child Job carried in `CronJobStatus::active`.
///
/// Identity is the UID; the name is kept so a reconcile can recognise a
/// scheduled time it already created a job for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

/// Rule applied when a due tick coincides with active children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyPolicy {
    /// Run jobs in parallel.
    #[default]
    Allow,
    /// Skip the tick while a prior execution is still active.
    Forbid,
    /// Delete active executions, then start the new one.
    Replace,
}

/// Template from which child Jobs are materialised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplate {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub spec: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobSpec {
    /// Standard 5-field cron expression, evaluated in UTC.
    pub schedule: String,
    #[serde(default)]
    pub concurrency_policy: ConcurrencyPolicy,
    /// When true, no new Jobs are created; running ones are untouched.
    #[serde(default)]
    pub suspend: bool,
    /// Maximum lag after a scheduled time during which creation is still
    /// permitted. Absent or negative means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_deadline_seconds: Option<i64>,
    #[serde(default)]
    pub job_template: JobTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobStatus {
    /// References to believed-active children. May lag reality in both
    /// directions; the reconciler repairs it each tick.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active: Vec<ObjectReference>,
    /// Most recent scheduled time for which creation was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_schedule_time: Option<DateTime<Utc>>,
    /// Completion timestamp of the most recent child that completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: CronJobSpec,
    #[serde(default)]
    pub status: CronJobStatus,
}

impl CronJob {
    /// `namespace/name` key for logging.
    pub fn key(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }

    pub fn object_reference(&self) -> ObjectReference {
        ObjectReference {
            namespace: self.metadata.namespace.clone(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
        }
    }

    /// Owner reference stamped on every child so it can be claimed back.
    pub fn controller_owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: CONTROLLER_API_VERSION.to_string(),
            kind: CONTROLLER_KIND.to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
            controller: true,
        }
    }

    /// The miss window, if one is configured. Negative values are treated the
    /// same as absence: unbounded.
    pub fn starting_deadline(&self) -> Option<chrono::Duration> {
        self.spec
            .starting_deadline_seconds
            .filter(|secs| *secs >= 0)
            .map(chrono::Duration::seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobConditionType {
    Complete,
    Failed,
}

impl std::fmt::Display for JobConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "Complete"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCondition {
    #[serde(rename = "type")]
    pub condition_type: JobConditionType,
    pub status: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<JobCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: JobStatus,
}

impl Job {
    pub fn object_reference(&self) -> ObjectReference {
        ObjectReference {
            namespace: self.metadata.namespace.clone(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
        }
    }

    /// The terminal condition, if the job has reached one.
    pub fn finished_condition(&self) -> Option<JobConditionType> {
        self.status
            .conditions
            .iter()
            .find(|c| c.status)
            .map(|c| c.condition_type)
    }

    pub fn is_finished(&self) -> bool {
        self.finished_condition().is_some()
    }

    /// True when this job carries a controller owner reference pointing at
    /// the given CronJob: matching UID, kind `CronJob`, group `batch`.
    pub fn controlled_by(&self, cron_job: &CronJob) -> bool {
        self.metadata.owner_references.iter().any(|owner| {
            owner.controller
                && owner.uid == cron_job.metadata.uid
                && owner.kind == CONTROLLER_KIND
                && owner.api_version.starts_with("batch/")
        })
    }
}

/// Deterministic child name: one name per (owner, scheduled time) pair so a
/// repeated reconcile at the same instant collides instead of duplicating.
pub fn job_name(cron_job: &CronJob, scheduled_time: DateTime<Utc>) -> String {
    format!("{}-{}", cron_job.metadata.name, scheduled_time.timestamp())
}

/// Materialise a child Job from the CronJob's template for a scheduled time.
///
/// The UID is left empty; the API server (or its stand-in) assigns one on
/// creation.
pub fn job_from_template(cron_job: &CronJob, scheduled_time: DateTime<Utc>) -> Job {
    Job {
        metadata: ObjectMeta {
            name: job_name(cron_job, scheduled_time),
            namespace: cron_job.metadata.namespace.clone(),
            uid: String::new(),
            creation_timestamp: None,
            labels: cron_job.spec.job_template.labels.clone(),
            annotations: cron_job.spec.job_template.annotations.clone(),
            owner_references: vec![cron_job.controller_owner_reference()],
        },
        spec: cron_job.spec.job_template.spec.clone(),
        status: JobStatus::default(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn parent() -> CronJob {
        CronJob {
            metadata: ObjectMeta {
                name: "backup".to_string(),
                namespace: "infra".to_string(),
                uid: "cj-uid".to_string(),
                ..ObjectMeta::default()
            },
            ..CronJob::default()
        }
    }

    #[test]
    fn job_name_is_owner_plus_unix_timestamp() {
        let scheduled = Utc.with_ymd_and_hms(2016, 5, 19, 10, 0, 0).unwrap();
        assert_eq!(job_name(&parent(), scheduled), "backup-1463652000");
    }

    #[test]
    fn job_from_template_stamps_owner_reference() {
        let cj = parent();
        let scheduled = Utc.with_ymd_and_hms(2016, 5, 19, 10, 0, 0).unwrap();
        let job = job_from_template(&cj, scheduled);

        assert_eq!(job.metadata.owner_references.len(), 1);
        let owner = &job.metadata.owner_references[0];
        assert_eq!(owner.api_version, "batch/v1");
        assert_eq!(owner.kind, "CronJob");
        assert_eq!(owner.name, "backup");
        assert_eq!(owner.uid, "cj-uid");
        assert!(owner.controller);
        assert!(job.controlled_by(&cj));
    }

    #[test]
    fn job_from_template_copies_labels_and_payload() {
        let mut cj = parent();
        cj.spec.job_template.labels.insert("a".to_string(), "b".to_string());
        cj.spec.job_template.annotations.insert("x".to_string(), "y".to_string());
        cj.spec.job_template.spec = serde_json::json!({ "parallelism": 1 });

        let scheduled = Utc.with_ymd_and_hms(2016, 5, 19, 10, 0, 0).unwrap();
        let job = job_from_template(&cj, scheduled);

        assert_eq!(job.metadata.labels["a"], "b");
        assert_eq!(job.metadata.annotations["x"], "y");
        assert_eq!(job.metadata.namespace, "infra");
        assert_eq!(job.spec, serde_json::json!({ "parallelism": 1 }));
        assert!(job.metadata.uid.is_empty());
    }

    #[test]
    fn controlled_by_requires_matching_uid() {
        let cj = parent();
        let mut job = job_from_template(&cj, Utc.with_ymd_and_hms(2016, 5, 19, 10, 0, 0).unwrap());
        job.metadata.owner_references[0].uid = "other-uid".to_string();
        assert!(!job.controlled_by(&cj));
    }

    #[test]
    fn controlled_by_ignores_non_controller_references() {
        let cj = parent();
        let mut job = job_from_template(&cj, Utc.with_ymd_and_hms(2016, 5, 19, 10, 0, 0).unwrap());
        job.metadata.owner_references[0].controller = false;
        assert!(!job.controlled_by(&cj));
    }

    #[test]
    fn finished_condition_requires_true_status() {
        let mut job = Job::default();
        job.status.conditions.push(JobCondition {
            condition_type: JobConditionType::Complete,
            status: false,
        });
        assert!(!job.is_finished());

        job.status.conditions.push(JobCondition {
            condition_type: JobConditionType::Failed,
            status: true,
        });
        assert_eq!(job.finished_condition(), Some(JobConditionType::Failed));
    }

    #[test]
    fn negative_starting_deadline_means_unbounded() {
        let mut cj = parent();
        cj.spec.starting_deadline_seconds = Some(-12345);
        assert!(cj.starting_deadline().is_none());

        cj.spec.starting_deadline_seconds = Some(10);
        assert_eq!(cj.starting_deadline(), Some(chrono::Duration::seconds(10)));
    }

    #[test]
    fn cron_job_round_trips_through_json() {
        let mut cj = parent();
        cj.spec.schedule = "0 * * * *".to_string();
        cj.spec.concurrency_policy = ConcurrencyPolicy::Replace;
        cj.status.last_schedule_time =
            Some(Utc.with_ymd_and_hms(2016, 5, 19, 9, 0, 0).unwrap());

        let json = serde_json::to_string(&cj).unwrap();
        assert!(json.contains("\"concurrencyPolicy\":\"Replace\""));
        assert!(json.contains("\"lastScheduleTime\""));

        let back: CronJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cj);
    }
}
