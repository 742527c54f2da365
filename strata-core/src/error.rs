//! Error types for the engine

use thiserror::Error;

/// What a clause was rejected for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A variable is not bound by a positive body atom where required
    UnsafeVariable,
    /// The program's dependency graph has a negative edge in a cycle
    Unstratified,
    /// A unification that can never constrain anything (e.g. `X = _`)
    UselessUnification,
    /// A queried predicate does not occur in the program
    UnknownPredicate,
    /// A predicate name is used with more than one arity
    ArityMismatch,
    /// A feature disabled by configuration, or a reserved predicate name
    DisallowedFeature,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationErrorKind::UnsafeVariable => "unsafe variable",
            ValidationErrorKind::Unstratified => "unstratified negation",
            ValidationErrorKind::UselessUnification => "useless unification",
            ValidationErrorKind::UnknownPredicate => "unknown predicate",
            ValidationErrorKind::ArityMismatch => "arity mismatch",
            ValidationErrorKind::DisallowedFeature => "disallowed feature",
        };
        f.write_str(s)
    }
}

/// A rejected clause together with the reason
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct ValidationError {
    /// Rejection category
    pub kind: ValidationErrorKind,
    /// The offending clause (or query) rendered as text, plus context
    pub detail: String,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ValidationErrorKind, detail: impl Into<String>) -> Self {
        ValidationError {
            kind,
            detail: detail.into(),
        }
    }
}

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed textual input
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        /// 1-based line of the offending token
        line: usize,
        /// 1-based column of the offending token
        column: usize,
        /// What went wrong
        message: String,
    },

    /// The program or query failed validation; no partial state is retained
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An internal evaluation invariant was violated; aborts the query
    #[error("evaluation invariant violated: {0}")]
    Invariant(String),

    /// The executor could not run the work; the query is halted
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;
