//! Domain error types
//!
//! [`DomainError`] covers validation of values that originate outside the
//! process (remote file names, device identities). [`RemoteError`] is the
//! error taxonomy shared by every remote operation, independent of which
//! backend protocol raised it.

use thiserror::Error;

/// Boxed error used to carry connection-level failures without altering them
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in domain validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A file name that cannot be stored in a local partition
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// A device identity that cannot be used as a partition name
    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Classification of a [`RemoteError`]
///
/// The sync engine decides how to react to a failure from its kind alone:
/// `Unauthorized` triggers the single refresh-and-retry, `NotFound` on a
/// listing means "empty", everything else is surfaced or isolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// HTTP 401 or 403
    Unauthorized,
    /// HTTP 404
    NotFound,
    /// Any other non-2xx status, or a connection-level failure
    TransportFailure,
    /// A body that could not be parsed or lacked a required field
    MalformedResponse,
    /// A download that returned no content
    EmptyBody,
    /// Invalid endpoint or identity material; never retried
    Configuration,
}

/// Errors raised by remote operations (listing, transfer, enrollment)
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The server rejected the credential (HTTP 401/403)
    #[error("{action} failed with HTTP {status} (unauthorized)")]
    Unauthorized {
        /// The attempted action, e.g. "List gallery"
        action: String,
        /// The HTTP status code (401 or 403)
        status: u16,
    },

    /// The addressed resource does not exist (HTTP 404)
    #[error("{action} failed with HTTP 404")]
    NotFound {
        /// The attempted action
        action: String,
    },

    /// Any other non-2xx response
    #[error("{action} failed with HTTP {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    TransportFailure {
        /// The attempted action
        action: String,
        /// The HTTP status code
        status: u16,
        /// Response body text, when the server sent one
        message: Option<String>,
    },

    /// The request never produced an HTTP response
    #[error("{action} failed: {source}")]
    Connection {
        /// The attempted action
        action: String,
        /// The underlying transport error, unmodified
        #[source]
        source: BoxError,
    },

    /// The response body could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A download returned a successful status with no content
    #[error("Empty body for {0}")]
    EmptyBody(String),

    /// Endpoint or identity material is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RemoteError {
    /// Returns the classification used by retry and isolation policies
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Unauthorized { .. } => ErrorKind::Unauthorized,
            RemoteError::NotFound { .. } => ErrorKind::NotFound,
            RemoteError::TransportFailure { .. } | RemoteError::Connection { .. } => {
                ErrorKind::TransportFailure
            }
            RemoteError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            RemoteError::EmptyBody(_) => ErrorKind::EmptyBody,
            RemoteError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Returns true if this error should trigger a credential refresh
    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    /// Builds the error for a non-2xx status
    ///
    /// 401/403 map to `Unauthorized`, 404 to `NotFound`, anything else to
    /// `TransportFailure`. Blank messages are dropped.
    pub fn from_status(action: impl Into<String>, status: u16, message: Option<String>) -> Self {
        let action = action.into();
        match status {
            401 | 403 => RemoteError::Unauthorized { action, status },
            404 => RemoteError::NotFound { action },
            _ => RemoteError::TransportFailure {
                action,
                status,
                message: message.filter(|m| !m.trim().is_empty()),
            },
        }
    }

    /// Wraps a connection-level error for the given action
    pub fn connection(action: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RemoteError::Connection {
            action: action.into(),
            source: source.into(),
        }
    }
}
