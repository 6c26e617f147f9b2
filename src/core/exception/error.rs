//! Error Types
//!
//! Failure kinds surfaced by the rule execution core. Errors bubble to the
//! caller; no routine recovers locally.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Allocation failure in a scope or collection.
    #[error("allocation failure: {0}")]
    Alloc(String),

    /// Argument violation: malformed target string, cross-config pairing,
    /// capture slot out of range, non-list where a list is required,
    /// reserved name at registration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Duplicate var source registration.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Missing source, empty store slot, no accepting collection handler,
    /// or a filter removal that matched nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Append onto an existing non-list slot.
    #[error("incompatible type: {0}")]
    Incompatible(String),

    /// A capability the caller asked for but the plugin does not provide.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Unexpected internal failure, including errors reported by dynamic
    /// field getters.
    #[error("{0}")]
    Other(String),
}
