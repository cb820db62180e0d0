//! Import failure taxonomy

use crate::api::StoreError;

/// Step of a group's import that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportStage {
    School,
    Course,
    List,
}

impl ImportStage {
    pub fn label(&self) -> &'static str {
        match self {
            ImportStage::School => "school",
            ImportStage::Course => "course",
            ImportStage::List => "list",
        }
    }
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Error raised while importing one group
#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    /// Row lacks the minimum fields; skipped rather than reported
    Validation { line: usize, reason: String },
    /// School or course could not be found or created
    Resolution { stage: ImportStage, message: String },
    /// A just-created course never became readable
    ConsistencyTimeout { course_id: String, attempts: u32 },
    /// A document could not be fetched or uploaded
    Upload { file_name: String, message: String },
    /// The final version write failed
    Persist {
        course_id: String,
        attempts: u32,
        message: String,
    },
    /// The caller cancelled the job
    Cancelled,
    /// The backend refuses every call (credentials, connectivity)
    Config { message: String },
}

impl ImportError {
    /// Wrap a store failure from the school or course step. Failures that
    /// will repeat for every group become `Config`.
    pub fn resolution(stage: ImportStage, error: StoreError) -> Self {
        if error.is_fatal_config() {
            ImportError::Config {
                message: error.to_string(),
            }
        } else {
            ImportError::Resolution {
                stage,
                message: error.to_string(),
            }
        }
    }

    pub fn stage(&self) -> ImportStage {
        match self {
            ImportError::Validation { .. } => ImportStage::School,
            ImportError::Resolution { stage, .. } => *stage,
            ImportError::ConsistencyTimeout { .. }
            | ImportError::Upload { .. }
            | ImportError::Persist { .. }
            | ImportError::Cancelled
            | ImportError::Config { .. } => ImportStage::List,
        }
    }

    /// Errors that stop the whole job instead of a single group
    pub fn halts_job(&self) -> bool {
        matches!(self, ImportError::Cancelled | ImportError::Config { .. })
    }
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Validation { line, reason } => write!(f, "row {}: {}", line, reason),
            ImportError::Resolution { stage, message } => {
                write!(f, "could not resolve {}: {}", stage, message)
            }
            ImportError::ConsistencyTimeout {
                course_id,
                attempts,
            } => write!(
                f,
                "course {} was still not readable after {} attempts",
                course_id, attempts
            ),
            ImportError::Upload { file_name, message } => {
                write!(f, "upload of '{}' failed: {}", file_name, message)
            }
            ImportError::Persist {
                course_id,
                attempts,
                message,
            } => write!(
                f,
                "saving versions of course {} failed after {} attempts: {}",
                course_id, attempts, message
            ),
            ImportError::Cancelled => write!(f, "import cancelled"),
            ImportError::Config { message } => write!(f, "import halted: {}", message),
        }
    }
}

impl std::error::Error for ImportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_store_becomes_config_error() {
        let err = ImportError::resolution(
            ImportStage::School,
            StoreError::Unreachable {
                message: "connection refused".into(),
            },
        );

        assert!(err.halts_job());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_resolution_error_keeps_stage() {
        let err = ImportError::resolution(ImportStage::Course, StoreError::not_found("course"));

        assert!(!err.halts_job());
        assert_eq!(err.stage(), ImportStage::Course);
        assert_eq!(err.to_string(), "could not resolve course: course not found");
    }
}
