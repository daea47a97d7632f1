#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    InvalidSchedule { expr: String, reason: String },
    AlreadyExists { namespace: String, name: String },
    NotFound { namespace: String, name: String },
    Api(String),
}

impl SyncError {
    /// A create hit an object with the same name. The reconciler treats this
    /// as an idempotent outcome, not a failure.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSchedule { expr, reason } => {
                write!(f, "invalid schedule {expr:?}: {reason}")
            }
            Self::AlreadyExists { namespace, name } => {
                write!(f, "job {namespace}/{name} already exists")
            }
            Self::NotFound { namespace, name } => {
                write!(f, "job {namespace}/{name} not found")
            }
            Self::Api(msg) => write!(f, "API error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_schedule_display_carries_expression() {
        let err = SyncError::InvalidSchedule {
            expr: "61 * * * *".to_string(),
            reason: "value 61 out of range (0-59) in minute".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("61 * * * *"), "message must quote the expression: {msg}");
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn already_exists_is_classified() {
        let err = SyncError::AlreadyExists {
            namespace: "ns".to_string(),
            name: "job-1".to_string(),
        };
        assert!(err.is_already_exists());
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_is_classified() {
        let err = SyncError::NotFound {
            namespace: "ns".to_string(),
            name: "job-1".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
    }
}
