//! Applies a status patch to a fresh copy of the CronJob.

use crate::api::CronJob;
use crate::decision::StatusPatch;

/// Produce the CronJob the controller should persist: a new allocation with
/// only the status touched. The input is never mutated.
pub fn apply(original: &CronJob, patch: &StatusPatch) -> CronJob {
    let mut updated = original.clone();
    updated.status.active = patch.active.clone();
    if let Some(t) = patch.last_schedule_time {
        updated.status.last_schedule_time = Some(t);
    }
    if let Some(t) = patch.last_successful_time {
        updated.status.last_successful_time = Some(t);
    }
    updated
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::api::{CronJobSpec, ObjectMeta, ObjectReference};

    fn cron_job() -> CronJob {
        CronJob {
            metadata: ObjectMeta { name: "cj".to_string(), ..ObjectMeta::default() },
            spec: CronJobSpec { schedule: "0 * * * *".to_string(), ..CronJobSpec::default() },
            ..CronJob::default()
        }
    }

    #[test]
    fn apply_leaves_the_original_untouched() {
        let original = cron_job();
        let before = original.clone();
        let patch = StatusPatch {
            active: vec![ObjectReference {
                namespace: "ns".to_string(),
                name: "cj-1".to_string(),
                uid: "u1".to_string(),
            }],
            last_schedule_time: Some(Utc.with_ymd_and_hms(2016, 5, 19, 10, 0, 0).unwrap()),
            last_successful_time: None,
            changed: true,
        };

        let updated = apply(&original, &patch);

        assert_eq!(original, before);
        assert_eq!(updated.status.active.len(), 1);
        assert_eq!(
            updated.status.last_schedule_time,
            Some(Utc.with_ymd_and_hms(2016, 5, 19, 10, 0, 0).unwrap())
        );
        assert_eq!(updated.spec, original.spec);
    }

    #[test]
    fn unset_patch_fields_keep_existing_values() {
        let mut original = cron_job();
        original.status.last_schedule_time = Some(Utc.with_ymd_and_hms(2016, 5, 19, 9, 0, 0).unwrap());
        original.status.last_successful_time = Some(Utc.with_ymd_and_hms(2016, 5, 19, 9, 5, 0).unwrap());

        let updated = apply(&original, &StatusPatch::default());

        assert_eq!(updated.status.last_schedule_time, original.status.last_schedule_time);
        assert_eq!(updated.status.last_successful_time, original.status.last_successful_time);
        assert!(updated.status.active.is_empty());
    }
}
