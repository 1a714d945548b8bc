//! Errors raised while declaring a pipeline graph.

use thiserror::Error;

/// Declaration errors.
///
/// Configuration resolution never fails: unresolved settings fall back to
/// deploy-time placeholders. Only malformed input and conflicting
/// declarations halt a declaration pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("Invalid SNS Topic ARN or Topic Name: {reference}")]
    InvalidReferenceFormat { reference: String },

    #[error("There is already a construct at path: {path}")]
    DuplicateConstruct { path: String },
}

pub type DeclarationResult<T> = std::result::Result<T, DeclarationError>;
