//! Error types for objmap.
//!
//! Two families exist. [`RegistrationError`] covers malformed configuration and
//! is raised while descriptors are being built or registered. [`MappingError`]
//! is returned by engine operations; it never carries payload-shape problems,
//! which are reported as warnings through the diagnostics sink instead.

use crate::store::StoreError;

/// Result type for descriptor construction and registration.
pub type RegistrationResult<T> = std::result::Result<T, RegistrationError>;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MappingError>;

/// Configuration errors. Always fatal, always raised before any mapping runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The path pattern is structurally invalid.
    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A key path is empty or contains an empty segment.
    #[error("Invalid key path: '{0}'")]
    InvalidKeyPath(String),

    /// An attribute was declared with an empty field name.
    #[error("Attribute '{key}' has an empty field name")]
    EmptyAttributeField { key: String },

    /// Two attributes of one mapping write the same field.
    #[error("Duplicate field '{field}' in mapping for {type_name}")]
    DuplicateField { type_name: String, field: String },

    /// Two relations of one mapping read the same payload key.
    #[error("Duplicate relation key '{key}' in mapping for {type_name}")]
    DuplicateRelationKey { type_name: String, key: String },

    /// The identity field is not one of the mapping's attribute fields.
    #[error("Identity field '{field}' is not an attribute of {type_name}")]
    UnknownIdentityField { type_name: String, field: String },

    /// A date format string contains an unsupported specifier.
    #[error("Invalid date format '{format}' for attribute '{key}'")]
    InvalidDateFormat { key: String, format: String },
}

/// Errors returned by [`crate::engine::MappingEngine`] operations.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// The request's path or method is structurally invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The object carries no identity value for its mapping.
    #[error("Object of type {type_name} has no identity value")]
    MissingIdentity { type_name: String },

    /// The store adapter rejected an intent.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The raw payload could not be decoded.
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// No tokio runtime is available to schedule the mapping pass.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The worker running the mapping pass did not complete.
    #[error("Worker error: {0}")]
    Worker(String),
}
