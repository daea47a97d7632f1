//! # cronwheel
//!
//! Cluster-side controller core that reconciles declarative **CronJob**
//! objects against their observed child **Job** executions.
//!
//! ## What it does
//!
//! - Parses standard 5-field cron expressions (UTC) and walks them forward
//!   and backward.
//! - Decides, per reconcile tick, whether a child Job is due, applying the
//!   starting deadline and the `Allow` / `Forbid` / `Replace` concurrency
//!   policies.
//! - Repairs the status' active list against what the informer actually saw,
//!   tolerating staleness in both directions.
//! - Bounds recovery for long-stalled objects: past 100 missed starts it
//!   warns once and runs only the latest.
//! - Stays idempotent under repeated invocation at the same instant: a
//!   duplicate create is an outcome, not an error.
//!
//! The core owns no clock, no transport, and no queue. Time is injected
//! through [`Clock`], the cluster through [`JobControl`], [`CronJobControl`],
//! and [`EventRecorder`]; per-key serialisation belongs to the caller's
//! workqueue.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use cronwheel::mocks::{FixedClock, MockCronJobControl, MockEventRecorder, MockJobControl};
//! use cronwheel::{Controller, CronJob};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cron_job: CronJob = serde_json::from_str(
//!         r#"{
//!             "metadata": { "name": "backup", "namespace": "infra", "uid": "2b1f" },
//!             "spec": { "schedule": "0 3 * * *" }
//!         }"#,
//!     )
//!     .unwrap();
//!     let controller = Controller::new(
//!         MockJobControl::new(),
//!         MockCronJobControl::new(),
//!         MockEventRecorder::new(),
//!         FixedClock::at(chrono::Utc::now()),
//!     );
//!     let requeue_after = controller.reconcile(&cron_job, &[]).await.unwrap();
//!     println!("next reconcile in {requeue_after:?}");
//! }
//! ```

pub mod api;
pub mod decision;
pub mod error;
pub mod events;
pub mod index;
pub mod mocks;
pub mod schedule;
pub mod status;
pub mod sync;
pub mod timing;
pub mod traits;

pub use api::{
    ConcurrencyPolicy, CronJob, CronJobSpec, CronJobStatus, Job, JobCondition, JobConditionType,
    JobStatus, JobTemplate, ObjectMeta, ObjectReference, OwnerReference,
};
pub use error::SyncError;
pub use events::EventType;
pub use schedule::Schedule;
pub use sync::{Controller, SyncOutcome};
pub use traits::{Clock, CronJobControl, EventRecorder, JobControl, SystemClock};
