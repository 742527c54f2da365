//! Strata Core - Concurrent Datalog evaluation engine
//!
//! This crate provides a Datalog engine with stratified negation, explicit
//! (dis)unification premises, a chunked concurrent bottom-up semi-naive
//! saturator, and a magic-set transformation for goal-directed queries.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod annotate;
pub mod engine;
pub mod error;
pub mod eval;
pub mod index;
pub mod interner;
pub mod magic;
pub mod parser;
pub mod saturate;
pub mod trie;
pub mod types;
pub mod unification;
pub mod validation;

pub use engine::{Engine, EngineConfig, EngineVariant};
pub use error::{Error, Result, ValidationError, ValidationErrorKind};
pub use index::FactIndex;
pub use interner::{ConstId, Interner, PredId};
pub use parser::{parse_program, Program};
pub use types::{Atom, Clause, GroundAtom, Premise, ResolvedAtom, Term};
pub use validation::{PredKind, ValidatedProgram, Validator, ValidatorConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
