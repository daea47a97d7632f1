//! Mock implementations of the cluster seams for testing without a real API
//! server.
//!
//! Every mock is `Clone` and records through shared interior state, so a test
//! can hand a clone to the controller and keep its own handle for assertions.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::api::{CronJob, Job, ObjectReference};
use crate::error::SyncError;
use crate::events::EventType;
use crate::traits::{Clock, CronJobControl, EventRecorder, JobControl};

// ── MockJobControl ────────────────────────────────────────────────────────────

/// In-memory stand-in for the Job API: records creations and deletions,
/// serves gets from a configurable set, and injects failures on demand.
#[derive(Clone, Default)]
pub struct MockJobControl {
    jobs: Arc<Mutex<Vec<Job>>>,
    created: Arc<Mutex<Vec<Job>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    create_error: Arc<Mutex<Option<SyncError>>>,
    get_error: Arc<Mutex<Option<SyncError>>>,
    delete_error: Arc<Mutex<Option<SyncError>>>,
}

impl MockJobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a job visible to `get_job`, as if the API server already had it.
    pub fn insert_job(&self, job: Job) {
        self.jobs.lock().unwrap().push(job);
    }

    /// Every `create_job` call fails with this error until cleared.
    pub fn fail_create_with(&self, err: SyncError) {
        *self.create_error.lock().unwrap() = Some(err);
    }

    /// Every `get_job` call fails with this error until cleared.
    pub fn fail_get_with(&self, err: SyncError) {
        *self.get_error.lock().unwrap() = Some(err);
    }

    /// Every `delete_job` call fails with this error until cleared.
    pub fn fail_delete_with(&self, err: SyncError) {
        *self.delete_error.lock().unwrap() = Some(err);
    }

    pub fn created_jobs(&self) -> Vec<Job> {
        self.created.lock().unwrap().clone()
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn deleted_names(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn delete_count(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }
}

impl JobControl for MockJobControl {
    async fn create_job(&self, namespace: &str, job: Job) -> Result<Job, SyncError> {
        if let Some(err) = self.create_error.lock().unwrap().clone() {
            return Err(err);
        }
        let mut created = job;
        created.metadata.namespace = namespace.to_string();
        if created.metadata.uid.is_empty() {
            created.metadata.uid = Uuid::new_v4().to_string();
        }
        self.created.lock().unwrap().push(created.clone());
        self.jobs.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Job, SyncError> {
        if let Some(err) = self.get_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.metadata.namespace == namespace && j.metadata.name == name)
            .cloned()
            .ok_or(SyncError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), SyncError> {
        if let Some(err) = self.delete_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.jobs
            .lock()
            .unwrap()
            .retain(|j| !(j.metadata.namespace == namespace && j.metadata.name == name));
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

// ── MockCronJobControl ────────────────────────────────────────────────────────

/// Records every status update the controller issues.
#[derive(Clone, Default)]
pub struct MockCronJobControl {
    updates: Arc<Mutex<Vec<CronJob>>>,
    update_error: Arc<Mutex<Option<SyncError>>>,
}

impl MockCronJobControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_update_with(&self, err: SyncError) {
        *self.update_error.lock().unwrap() = Some(err);
    }

    pub fn updates(&self) -> Vec<CronJob> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl CronJobControl for MockCronJobControl {
    async fn update_status(&self, cron_job: &CronJob) -> Result<CronJob, SyncError> {
        if let Some(err) = self.update_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.updates.lock().unwrap().push(cron_job.clone());
        Ok(cron_job.clone())
    }
}

// ── MockEventRecorder ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub object: ObjectReference,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

/// Records every event emitted during a reconcile, in order.
#[derive(Clone, Default)]
pub struct MockEventRecorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl MockEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn warning_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == EventType::Warning)
            .count()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| e.reason.clone()).collect()
    }
}

impl EventRecorder for MockEventRecorder {
    fn event(&self, object: &ObjectReference, event_type: EventType, reason: &str, message: &str) {
        self.events.lock().unwrap().push(RecordedEvent {
            object: object.clone(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}

// ── FixedClock ────────────────────────────────────────────────────────────────

/// A clock pinned to one instant, so scheduling branches are deterministic.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
