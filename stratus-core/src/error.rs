//! Synthesis error taxonomy
//!
//! Every variant is fatal at synthesis time: there is no retry and no
//! partial-success mode. A failed validation aborts before any graph is
//! handed to the provisioning engine.

use thiserror::Error;

use crate::graph::GraphError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    /// Malformed or missing input parameter, caught before any node is built
    #[error("Invalid configuration for '{field}': {message}")]
    Configuration { field: String, message: String },

    /// An external lookup (network, repository, certificate, secret)
    /// returned not-found
    #[error("{kind} not found: '{identifier}'")]
    ReferenceResolution { kind: String, identifier: String },

    /// A derived-value propagation rule was violated
    #[error("Invariant violated ({invariant}): {detail}")]
    InvariantViolation { invariant: String, detail: String },

    /// Structural graph fault (dangling reference, cycle)
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl SynthError {
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::ReferenceResolution {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }

    pub fn invariant(invariant: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            invariant: invariant.into(),
            detail: detail.into(),
        }
    }
}

pub type SynthResult<T> = Result<T, SynthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_the_offending_value() {
        let err = SynthError::not_found("secret", "arn:aws:secretsmanager:::missing");
        assert_eq!(
            err.to_string(),
            "secret not found: 'arn:aws:secretsmanager:::missing'"
        );

        let err = SynthError::configuration("max_azs", "must be between 1 and 6");
        assert!(err.to_string().contains("max_azs"));
    }
}
