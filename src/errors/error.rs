//! Error types for the client invocation chain.

use crate::errors::categories::ErrorCategory;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for invocation operations
pub type InvokeResult<T> = Result<T, InvokerError>;

/// Main error type for the invocation chain.
///
/// Every layer of the chain passes these through untouched, so the variant a
/// caller observes is the variant the failing attempt produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokerError {
    /// Configuration error (missing client factory, client construction failure)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Invalid state (illegal lifecycle transition, unexpected result type)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message describing the state violation
        message: String,
    },

    /// Connectivity failure (handshake failed, transport dropped)
    #[error("Connectivity error: {message}")]
    Connectivity {
        /// Error message describing the connectivity issue
        message: String,
    },

    /// An attempt exceeded its deadline
    #[error("Timeout after {timeout:?}: {message}")]
    Timeout {
        /// Error message describing what timed out
        message: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// Fault reported by the remote side that is not caused by the caller's input
    #[error("Server fault: {message}")]
    ServerFault {
        /// Fault message from the remote side
        message: String,
        /// Provider-specific fault code
        code: Option<String>,
    },

    /// Fault reported by the remote side that is caused by the caller's input
    #[error("Client fault: {message}")]
    ClientFault {
        /// Fault message from the remote side
        message: String,
        /// Provider-specific fault code
        code: Option<String>,
    },

    /// The caller cancelled the invocation
    #[error("Invocation cancelled")]
    Cancelled,

    /// Closing the client failed
    #[error("Teardown error: {message}")]
    Teardown {
        /// Error message describing the teardown issue
        message: String,
    },

    /// Failure raised by the caller's operation itself
    #[error("Operation error: {message}")]
    Operation {
        /// Error message from the operation
        message: String,
    },
}

impl InvokerError {
    /// Creates a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        InvokerError::Connectivity {
            message: message.into(),
        }
    }

    /// Creates a server fault without a fault code.
    pub fn server_fault(message: impl Into<String>) -> Self {
        InvokerError::ServerFault {
            message: message.into(),
            code: None,
        }
    }

    /// Creates a client fault without a fault code.
    pub fn client_fault(message: impl Into<String>) -> Self {
        InvokerError::ClientFault {
            message: message.into(),
            code: None,
        }
    }

    /// Creates an operation error.
    pub fn operation(message: impl Into<String>) -> Self {
        InvokerError::Operation {
            message: message.into(),
        }
    }

    /// Returns true if another attempt against a fresh client may succeed.
    ///
    /// Retryable errors include:
    /// - Connectivity failures
    /// - Attempt timeouts
    /// - Server faults
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InvokerError::Connectivity { .. }
                | InvokerError::Timeout { .. }
                | InvokerError::ServerFault { .. }
        )
    }

    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            InvokerError::Configuration { .. } => ErrorCategory::Configuration,
            InvokerError::InvalidState { .. } | InvokerError::Teardown { .. } => {
                ErrorCategory::Lifecycle
            }
            InvokerError::Connectivity { .. } => ErrorCategory::Connectivity,
            InvokerError::Timeout { .. } => ErrorCategory::Timeout,
            InvokerError::ServerFault { .. } => ErrorCategory::ServerFault,
            InvokerError::ClientFault { .. } => ErrorCategory::ClientFault,
            InvokerError::Cancelled => ErrorCategory::Cancelled,
            InvokerError::Operation { .. } => ErrorCategory::Application,
        }
    }
}
