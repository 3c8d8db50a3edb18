//! Error types for the invocation chain.
//!
//! The taxonomy separates failures that another attempt may fix (connectivity,
//! timeouts, server faults) from those it cannot (client faults, configuration,
//! cancellation).

mod categories;
mod error;

pub use categories::ErrorCategory;
pub use error::{InvokeResult, InvokerError};
