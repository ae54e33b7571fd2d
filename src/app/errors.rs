//! Error types for graph synthesis.
//!
//! Every failure is fatal to the build that raised it: builders return the
//! first error they hit and never hand back a partial graph.

use thiserror::Error;

/// Errors raised while normalizing a topology or assembling its resource graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    /// A required field is missing or has the wrong shape
    #[error("invalid configuration for {resource}: field '{field}' {reason}")]
    Validation {
        resource: String,
        field: String,
        reason: String,
    },

    /// Two sibling resources derived the same logical identifier
    #[error("duplicate {kind} '{logical_id}'")]
    DuplicateResource { kind: String, logical_id: String },

    /// A symbolic name does not match any registered resource
    #[error("{referenced_by} references unknown {kind} '{name}'")]
    UnresolvedReference {
        kind: String,
        name: String,
        referenced_by: String,
    },

    /// A builder that needs at least one sub-resource received none
    #[error("empty topology: {0}")]
    EmptyTopology(String),

    /// The graph cannot be ordered for deployment
    #[error("circular dependency between resources: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A setting names something this crate cannot produce
    #[error("unsupported {what}: '{value}'")]
    Unsupported { what: String, value: String },
}

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;

impl SynthError {
    pub fn missing(resource: impl Into<String>, field: impl Into<String>) -> Self {
        SynthError::Validation {
            resource: resource.into(),
            field: field.into(),
            reason: "is required".to_string(),
        }
    }

    pub fn invalid(
        resource: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SynthError::Validation {
            resource: resource.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn duplicate(kind: impl Into<String>, logical_id: impl Into<String>) -> Self {
        SynthError::DuplicateResource {
            kind: kind.into(),
            logical_id: logical_id.into(),
        }
    }

    pub fn unresolved(
        kind: impl Into<String>,
        name: impl Into<String>,
        referenced_by: impl Into<String>,
    ) -> Self {
        SynthError::UnresolvedReference {
            kind: kind.into(),
            name: name.into(),
            referenced_by: referenced_by.into(),
        }
    }
}
