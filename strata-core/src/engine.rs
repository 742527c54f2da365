//! Engine facade: validated programs, saturation, and query answering
//!
//! The engine owns the interner, validates a program once at `init`, and
//! answers queries. EDB queries read the program's facts directly; IDB
//! queries drive a full saturation (computed once and cached, so repeated
//! queries return equal sets), except under the magic-set variant which
//! transforms and saturates per query.

use crate::annotate::annotate;
use crate::error::{Error, Result, ValidationError, ValidationErrorKind};
use crate::index::FactIndex;
use crate::interner::{ConstId, Interner, PredId};
use crate::magic;
use crate::parser::parse_program;
use crate::saturate::{saturate_serial, ChunkedSaturator, SaturationConfig, DEFAULT_CHUNK_SIZE};
use crate::types::{Atom, Clause, GroundAtom, Term};
use crate::validation::{PredKind, ValidatedProgram, Validator, ValidatorConfig};
use ahash::{AHashMap, AHashSet};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;

/// Evaluation strategy selected at engine construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineVariant {
    /// Single-threaded semi-naive fixed point
    SemiNaiveSerial,
    /// Concurrent semi-naive (work items of one fact)
    SemiNaiveConcurrent,
    /// Concurrent semi-naive with chunked work items
    ChunkedConcurrent,
    /// Magic-set transformation, saturated by the chunked engine per query
    MagicSetOverConcurrent,
}

/// Engine construction parameters
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Evaluation strategy
    pub variant: EngineVariant,
    /// Worker count for concurrent variants; 0 selects hardware parallelism
    pub workers: usize,
    /// Work-item size for the chunked variants
    pub chunk_size: usize,
    /// Language feature switches
    pub validator: ValidatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            variant: EngineVariant::ChunkedConcurrent,
            workers: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            validator: ValidatorConfig::default(),
        }
    }
}

/// A Datalog evaluation engine
pub struct Engine {
    config: EngineConfig,
    interner: Arc<Interner>,
    program: Option<Arc<ValidatedProgram>>,
    saturated: OnceCell<Arc<FactIndex>>,
}

impl Engine {
    /// Create an engine with the given configuration
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            interner: Arc::new(Interner::new()),
            program: None,
            saturated: OnceCell::new(),
        }
    }

    /// Create an engine with a variant and default parameters
    pub fn with_variant(variant: EngineVariant) -> Self {
        Self::new(EngineConfig {
            variant,
            ..EngineConfig::default()
        })
    }

    /// The engine's interning tables, for constructing atoms and rendering
    /// results
    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// Validate and install a program. On error no partial state is kept.
    pub fn init(&mut self, clauses: &[Clause]) -> Result<()> {
        let validator = Validator::with_config(self.interner.clone(), self.config.validator);
        let program = validator.validate(clauses)?;
        self.program = Some(Arc::new(program));
        self.saturated = OnceCell::new();
        Ok(())
    }

    /// Parse a textual program, install it, and return its embedded queries
    pub fn load(&mut self, source: &str) -> Result<Vec<Atom>> {
        let parsed = parse_program(source, &self.interner)?;
        self.init(&parsed.clauses)?;
        Ok(parsed.queries)
    }

    /// Answer a query: the set of ground atoms entailed by the program that
    /// match the query atom.
    pub fn query(&self, query: &Atom) -> Result<AHashSet<GroundAtom>> {
        let start = Instant::now();
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| Error::Invariant("query issued before init".into()))?
            .clone();

        let info = program.pred_info(query.pred).ok_or_else(|| {
            let name = self.interner.pred_name(query.pred);
            let other_arity = self
                .interner
                .predicates_named(&name)
                .into_iter()
                .any(|p| p != query.pred && program.pred_info(p).is_some());
            let kind = if other_arity {
                ValidationErrorKind::ArityMismatch
            } else {
                ValidationErrorKind::UnknownPredicate
            };
            Error::Validation(ValidationError::new(
                kind,
                format!("query '{}'", query.to_text(&self.interner)),
            ))
        })?;

        let results = match info.kind {
            PredKind::Edb => {
                // EDB extents come straight from the program's facts
                let facts = program.facts_for(query.pred);
                facts.into_iter().filter(|f| matches(query, f)).collect()
            }
            PredKind::Idb => match self.config.variant {
                EngineVariant::MagicSetOverConcurrent => self.magic_query(&program, query)?,
                _ => {
                    let index = self.saturated_index(&program)?;
                    filter_index(&index, query, query.pred)
                }
            },
        };

        tracing::debug!(
            query = %query.to_text(&self.interner),
            results = results.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "query answered"
        );

        Ok(results)
    }

    fn saturation_config(&self, chunk_size: usize) -> SaturationConfig {
        SaturationConfig {
            workers: self.config.workers,
            chunk_size,
        }
    }

    /// Full saturation of the installed program, computed once
    fn saturated_index(&self, program: &Arc<ValidatedProgram>) -> Result<Arc<FactIndex>> {
        self.saturated
            .get_or_try_init(|| {
                let annotated = annotate(program);
                match self.config.variant {
                    EngineVariant::SemiNaiveSerial => saturate_serial(&annotated),
                    EngineVariant::SemiNaiveConcurrent => {
                        ChunkedSaturator::new(self.saturation_config(1)).saturate(&annotated)
                    }
                    _ => ChunkedSaturator::new(self.saturation_config(self.config.chunk_size))
                        .saturate(&annotated),
                }
            })
            .cloned()
    }

    /// Transform for the query, saturate the rewritten program, and strip
    /// the adornment from the answers.
    fn magic_query(
        &self,
        program: &Arc<ValidatedProgram>,
        query: &Atom,
    ) -> Result<AHashSet<GroundAtom>> {
        let rewritten = magic::transform(program, query, &self.interner);
        let validator = Validator::with_config(self.interner.clone(), self.config.validator);
        let validated = validator
            .validate_with_reserved(&rewritten.clauses, true)
            .map_err(|e| Error::Invariant(format!("magic-set output failed validation: {}", e)))?;

        let index = ChunkedSaturator::new(self.saturation_config(self.config.chunk_size))
            .saturate(&annotate(&validated))?;

        Ok(filter_index(&index, query, rewritten.adorned_query)
            .into_iter()
            .map(|f| GroundAtom {
                pred: query.pred,
                args: f.args,
            })
            .collect())
    }
}

/// Whether a ground atom matches the query pattern: constants filter,
/// repeated variables must agree.
fn matches(query: &Atom, fact: &GroundAtom) -> bool {
    debug_assert_eq!(query.terms.len(), fact.args.len());
    let mut bound: AHashMap<&str, ConstId> = AHashMap::new();
    for (term, constant) in query.terms.iter().zip(fact.args.iter()) {
        match term {
            Term::Constant(c) => {
                if c != constant {
                    return false;
                }
            }
            Term::Variable(name) => match bound.get(name.as_ref()) {
                Some(seen) => {
                    if seen != constant {
                        return false;
                    }
                }
                None => {
                    bound.insert(name.as_ref(), *constant);
                }
            },
        }
    }
    true
}

/// Matching facts of `pred` in the index, filtered against the query
fn filter_index(index: &FactIndex, query: &Atom, pred: PredId) -> AHashSet<GroundAtom> {
    let pattern: Vec<Option<ConstId>> = query.terms.iter().map(|t| t.as_constant()).collect();
    index
        .lookup(pred, &pattern)
        .into_iter()
        .filter(|f| matches(query, f))
        .collect()
}
