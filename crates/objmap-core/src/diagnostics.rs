//! Non-fatal mapping diagnostics.
//!
//! Payload-shape problems never abort a mapping pass. They are reported as
//! [`MappingWarning`]s to the engine's [`DiagnosticsSink`] and mapping carries
//! on with defaults.

use parking_lot::Mutex;
use serde::Serialize;

use crate::value::AttributeType;

/// A recoverable problem found while mapping a payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingWarning {
    /// A value was present but could not be converted; the field was defaulted.
    CoercionFailed {
        type_name: String,
        key: String,
        expected: AttributeType,
        found: &'static str,
    },

    /// The target object refused a field value.
    FieldRejected {
        type_name: String,
        field: String,
        reason: String,
    },

    /// A scalar sat where an object or array of objects was expected.
    UnexpectedFragment {
        type_name: String,
        found: &'static str,
    },

    /// Relation nesting exceeded the configured depth; the fragment was skipped.
    DepthLimitReached { type_name: String, depth: usize },
}

impl std::fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingWarning::CoercionFailed {
                type_name,
                key,
                expected,
                found,
            } => write!(
                f,
                "{}.{}: cannot convert {} to {}, using default",
                type_name, key, found, expected
            ),
            MappingWarning::FieldRejected {
                type_name,
                field,
                reason,
            } => write!(f, "{}.{}: field rejected: {}", type_name, field, reason),
            MappingWarning::UnexpectedFragment { type_name, found } => {
                write!(f, "{}: skipped {} fragment", type_name, found)
            }
            MappingWarning::DepthLimitReached { type_name, depth } => {
                write!(f, "{}: depth limit {} reached", type_name, depth)
            }
        }
    }
}

/// Receiver for mapping warnings.
pub trait DiagnosticsSink: Send + Sync {
    fn warn(&self, warning: MappingWarning);
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn warn(&self, warning: MappingWarning) {
        tracing::warn!(warning = ?warning, "{}", warning);
    }
}

/// Keeps warnings in memory.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    warnings: Mutex<Vec<MappingWarning>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the warnings collected so far.
    pub fn warnings(&self) -> Vec<MappingWarning> {
        self.warnings.lock().clone()
    }

    /// Drain the collected warnings.
    pub fn take(&self) -> Vec<MappingWarning> {
        std::mem::take(&mut *self.warnings.lock())
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticsSink for CollectingDiagnostics {
    fn warn(&self, warning: MappingWarning) {
        self.warnings.lock().push(warning);
    }
}
