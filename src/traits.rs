//! The narrow seams between the reconciler and the cluster.
//!
//! Each trait covers one collaborator; implement them to plug in a real API
//! client, or use the [`crate::mocks`] implementations in tests.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::api::{CronJob, Job, ObjectReference};
use crate::error::SyncError;
use crate::events::EventType;

/// Create, fetch, and delete child Jobs.
///
/// `create_job` must report a name collision as
/// [`SyncError::AlreadyExists`] and `get_job` a missing object as
/// [`SyncError::NotFound`]; the reconciler branches on both.
pub trait JobControl: Send + Sync {
    fn create_job(
        &self,
        namespace: &str,
        job: Job,
    ) -> impl Future<Output = Result<Job, SyncError>> + Send;

    fn get_job(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Job, SyncError>> + Send;

    fn delete_job(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Persist a CronJob's status. Called only when a reconcile reports a change.
pub trait CronJobControl: Send + Sync {
    fn update_status(
        &self,
        cron_job: &CronJob,
    ) -> impl Future<Output = Result<CronJob, SyncError>> + Send;
}

/// Record an event against an object. Fire-and-forget: the reconciler never
/// waits on delivery.
pub trait EventRecorder: Send + Sync {
    fn event(&self, object: &ObjectReference, event_type: EventType, reason: &str, message: &str);
}

/// Injected wall clock so every time-dependent branch is deterministic under
/// test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Zero-sized type, delegates to `chrono::Utc`.
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_tracks_wall_time() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
