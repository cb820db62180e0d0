//! Errors returned by content storage calls

/// Failure of a single call against the content storage API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist (or is not visible yet)
    NotFound { resource: String },
    /// A school with the same RBD code already exists
    DuplicateCode { code: u64 },
    /// The call did not complete within its time limit
    Timeout { operation: String },
    /// Transport-level failure (connection reset, DNS hiccup, ...)
    Network { message: String },
    /// The backend answered with a server-side failure
    Server { status: u16, message: String },
    /// The backend refused the request as invalid
    Rejected { status: u16, message: String },
    /// Credentials are missing or were refused
    Unauthorized { message: String },
    /// The backend cannot be reached at all
    Unreachable { message: String },
    /// The response body did not have the expected shape
    Decode { message: String },
}

impl StoreError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        StoreError::NotFound {
            resource: resource.into(),
        }
    }

    /// Transient failures worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout { .. } | StoreError::Network { .. } | StoreError::Server { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateCode { .. })
    }

    /// The connection itself was refused. Worth retrying inside a step; it
    /// only condemns the whole job once a step has exhausted its attempts.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, StoreError::Unreachable { .. })
    }

    /// Errors that will fail every remaining call of the job the same way
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            StoreError::Unauthorized { .. } | StoreError::Unreachable { .. }
        )
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { resource } => write!(f, "{} not found", resource),
            StoreError::DuplicateCode { code } => {
                write!(f, "a school with RBD {} already exists", code)
            }
            StoreError::Timeout { operation } => write!(f, "{} timed out", operation),
            StoreError::Network { message } => write!(f, "network error: {}", message),
            StoreError::Server { status, message } => {
                write!(f, "server error {}: {}", status, message)
            }
            StoreError::Rejected { status, message } => {
                write!(f, "request rejected ({}): {}", status, message)
            }
            StoreError::Unauthorized { message } => write!(f, "unauthorized: {}", message),
            StoreError::Unreachable { message } => {
                write!(f, "storage API unreachable: {}", message)
            }
            StoreError::Decode { message } => write!(f, "unexpected response: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(StoreError::Timeout { operation: "get course".into() }.is_retryable());
        assert!(StoreError::Server { status: 503, message: String::new() }.is_retryable());
        assert!(!StoreError::not_found("course c1").is_retryable());
        assert!(!StoreError::DuplicateCode { code: 1 }.is_retryable());
        assert!(StoreError::Unreachable { message: "refused".into() }.is_fatal_config());
        assert!(!StoreError::Network { message: "reset".into() }.is_fatal_config());
        assert!(StoreError::Unreachable { message: "refused".into() }.is_connection_failure());
        assert!(!StoreError::Unauthorized { message: "bad token".into() }.is_connection_failure());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::DuplicateCode { code: 12345 }.to_string(),
            "a school with RBD 12345 already exists"
        );
    }
}
