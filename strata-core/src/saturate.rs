//! Bottom-up saturation drivers
//!
//! Two drivers with identical semantics: a single-threaded worklist and a
//! chunked concurrent fixed-point over a rayon pool. Both process strata in
//! increasing order; within a stratum the concurrent driver tracks
//! outstanding work items with a counter and blocks until it reaches zero.
//! Correctness depends only on the atomicity of the redundancy trie's `add`
//! and the monotonicity of the index, so no ordering is imposed on which
//! worker derives which fact.

use crate::annotate::{AnnotatedProgram, Stratum};
use crate::error::{Error, Result};
use crate::eval::{evaluate_delta, evaluate_one_shot};
use crate::index::FactIndex;
use crate::trie::RedundancyTrie;
use crate::types::GroundAtom;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Default work-item batch size
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Worker and batching parameters for the concurrent driver
#[derive(Debug, Clone, Copy)]
pub struct SaturationConfig {
    /// Worker count; 0 selects the hardware parallelism
    pub workers: usize,
    /// Facts per work item
    pub chunk_size: usize,
}

impl Default for SaturationConfig {
    fn default() -> Self {
        SaturationConfig {
            workers: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Seed a stratum: its ground facts, then its one-shot clauses evaluated
/// against the current index. Fresh facts are inserted and passed to `emit`.
fn seed_stratum(
    stratum: &Stratum,
    index: &FactIndex,
    trie: &RedundancyTrie,
    emit: &mut dyn FnMut(GroundAtom),
) -> Result<()> {
    for fact in &stratum.facts {
        if trie.add_fact(fact) {
            index.add(fact);
            emit(fact.clone());
        }
    }
    for clause in &stratum.one_shot {
        evaluate_one_shot(clause, index, trie, &mut |derived| {
            index.add(&derived);
            emit(derived);
        })?;
    }
    Ok(())
}

/// Serial semi-naive saturation
pub fn saturate_serial(program: &AnnotatedProgram) -> Result<Arc<FactIndex>> {
    let index = Arc::new(FactIndex::new());
    let trie = RedundancyTrie::new();

    for (number, stratum) in program.strata.iter().enumerate() {
        let mut queue: VecDeque<GroundAtom> = VecDeque::new();
        seed_stratum(stratum, &index, &trie, &mut |fact| queue.push_back(fact))?;

        while let Some(fact) = queue.pop_front() {
            let Some(rules) = stratum.rules_by_delta.get(&fact.pred) else {
                continue;
            };
            for rule in rules {
                evaluate_delta(rule, &fact, &index, &trie, &mut |derived| {
                    index.add(&derived);
                    queue.push_back(derived);
                })?;
            }
        }

        tracing::debug!(stratum = number, facts = index.len(), "stratum saturated");
    }

    Ok(index)
}

/// Chunked concurrent saturation driver
pub struct ChunkedSaturator {
    config: SaturationConfig,
}

impl ChunkedSaturator {
    /// Create a driver with the given configuration
    pub fn new(config: SaturationConfig) -> Self {
        ChunkedSaturator { config }
    }

    /// Saturate the program on a dedicated pool, released on return
    pub fn saturate(&self, program: &AnnotatedProgram) -> Result<Arc<FactIndex>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| Error::ResourceExhaustion(e.to_string()))?;
        let pool = Arc::new(pool);
        let index = Arc::new(FactIndex::new());
        let trie = Arc::new(RedundancyTrie::new());
        let chunk_size = self.config.chunk_size.max(1);

        for (number, stratum) in program.strata.iter().enumerate() {
            let run = Arc::new(StratumRun {
                index: index.clone(),
                trie: trie.clone(),
                stratum: stratum.clone(),
                pool: pool.clone(),
                chunk_size,
                pending: Mutex::new(0),
                done: Condvar::new(),
                error: Mutex::new(None),
            });

            let mut seeds = Vec::new();
            seed_stratum(stratum, &index, &trie, &mut |fact| seeds.push(fact))?;
            for chunk in seeds.chunks(chunk_size) {
                submit(&run, chunk.to_vec());
            }

            run.wait();
            if let Some(error) = run.error.lock().take() {
                return Err(error);
            }

            tracing::debug!(stratum = number, facts = index.len(), "stratum saturated");
        }

        Ok(index)
    }
}

struct StratumRun {
    index: Arc<FactIndex>,
    trie: Arc<RedundancyTrie>,
    stratum: Stratum,
    pool: Arc<rayon::ThreadPool>,
    chunk_size: usize,
    pending: Mutex<usize>,
    done: Condvar,
    error: Mutex<Option<Error>>,
}

impl StratumRun {
    fn wait(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.done.wait(&mut pending);
        }
    }

    fn record_error(&self, error: Error) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn complete_one(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.done.notify_all();
        }
    }
}

/// Submit a work item; `pending` is incremented before the spawn and
/// decremented when the item finishes, even if it panics.
fn submit(run: &Arc<StratumRun>, chunk: Vec<GroundAtom>) {
    *run.pending.lock() += 1;
    let run = run.clone();
    let pool = run.pool.clone();
    pool.spawn(move || {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            process(&run, &chunk)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => run.record_error(error),
            Err(_) => run.record_error(Error::ResourceExhaustion(
                "saturation worker panicked".into(),
            )),
        }
        run.complete_one();
    });
}

/// Evaluate every annotated clause whose delta predicate matches each fact
/// in the item; derived facts accumulate into new work items of up to
/// `chunk_size` facts.
fn process(run: &Arc<StratumRun>, chunk: &[GroundAtom]) -> Result<()> {
    // A recorded error fails the whole query; drain remaining items cheaply
    if run.error.lock().is_some() {
        return Ok(());
    }

    let mut local: Vec<GroundAtom> = Vec::new();
    for fact in chunk {
        let Some(rules) = run.stratum.rules_by_delta.get(&fact.pred) else {
            continue;
        };
        for rule in rules {
            evaluate_delta(rule, fact, &run.index, &run.trie, &mut |derived| {
                run.index.add(&derived);
                local.push(derived);
                if local.len() >= run.chunk_size {
                    submit(run, std::mem::take(&mut local));
                }
            })?;
        }
    }
    if !local.is_empty() {
        submit(run, local);
    }
    Ok(())
}
