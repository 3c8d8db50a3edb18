use std::fmt;

/// Coarse classification of an [`InvokerError`](super::InvokerError), used as a
/// log field and metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Setup-time problems
    Configuration,
    /// Client lifecycle violations and teardown failures
    Lifecycle,
    /// Transport and handshake failures
    Connectivity,
    /// Attempt deadline exceeded
    Timeout,
    /// Remote fault not caused by the caller
    ServerFault,
    /// Remote fault caused by the caller's input
    ClientFault,
    /// Caller cancellation
    Cancelled,
    /// Failure raised by the caller's own operation
    Application,
}

impl ErrorCategory {
    /// Returns the label used for this category in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Lifecycle => "lifecycle",
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::ServerFault => "server_fault",
            ErrorCategory::ClientFault => "client_fault",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Application => "application",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
