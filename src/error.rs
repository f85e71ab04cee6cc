use std::fmt;
use thiserror::Error;

/// Main error type for data lake backend operations
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Ambiguous transport failure or unparsable remote response.
    /// The caller owns the retry decision.
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Remote error: {0}")]
    Remote(RemoteError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Map an HTTP status through the generic status table.
    ///
    /// Returns `None` for statuses without a specific meaning; callers
    /// decide how to report those.
    pub fn from_status(status: u16, context: impl Into<String>) -> Option<Self> {
        let context = context.into();
        match status {
            400 => Some(BackendError::InvalidArgument(context)),
            401 | 403 => Some(BackendError::PermissionDenied(context)),
            404 => Some(BackendError::NotFound(context)),
            405 => Some(BackendError::NotSupported(context)),
            409 => Some(BackendError::Interrupted(context)),
            429 | 500 => Some(BackendError::Transient(context)),
            _ => None,
        }
    }

    /// Convert error to libc errno for FUSE responses
    pub fn to_errno(&self) -> i32 {
        match self {
            BackendError::NotFound(_) => libc::ENOENT,
            BackendError::AlreadyExists(_) => libc::EEXIST,
            BackendError::InvalidArgument(_) => libc::EINVAL,
            BackendError::NotSupported(_) => libc::ENOTSUP,
            BackendError::PermissionDenied(_) => libc::EACCES,
            BackendError::Interrupted(_) => libc::EINTR,
            BackendError::Transient(_) => libc::EAGAIN,
            BackendError::Remote(e) => BackendError::from_status(e.status, String::new())
                .map(|mapped| mapped.to_errno())
                .unwrap_or(libc::EINVAL),
            BackendError::Config(_) => libc::EINVAL,
        }
    }

    /// Reclassify a structured remote error through the status table.
    ///
    /// Call sites decode structured bodies to branch on the exception name;
    /// whatever they do not handle goes back to the caller in the same terms
    /// as every other failure. Unmapped statuses become InvalidArgument.
    pub fn into_status_error(self) -> Self {
        match self {
            BackendError::Remote(remote) => {
                let context = remote.to_string();
                BackendError::from_status(remote.status, context.clone())
                    .unwrap_or(BackendError::InvalidArgument(context))
            }
            other => other,
        }
    }

    /// Whether the caller may retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }

    /// Whether the path was missing, however the failure was decoded
    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::NotFound(_) => true,
            BackendError::Remote(e) => e.status == 404,
            _ => false,
        }
    }

    /// Whether this is a structured remote error with the given exception name
    pub fn is_remote_exception(&self, exception: &str) -> bool {
        matches!(self, BackendError::Remote(e) if e.exception == exception)
    }
}

/// Decoded `RemoteException` payload returned by the data lake on failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// HTTP status of the failed response
    pub status: u16,
    /// Exception name, e.g. `FileNotFoundException`
    pub exception: String,
    pub message: String,
    /// Server-side implementation class hint
    pub java_class_name: String,
    /// Correlation id we sent with the request
    pub request_id: Option<String>,
    /// Correlation id the server returned
    pub response_id: Option<String>,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status, self.exception, self.message)?;
        if let Some(id) = &self.request_id {
            write!(f, " (request {}", id)?;
            if let Some(response) = &self.response_id {
                write!(f, ", response {}", response)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
