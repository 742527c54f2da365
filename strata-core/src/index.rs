//! Indexed storage of ground atoms
//!
//! Facts are sharded by predicate; each relation keeps a dedup set, an
//! insertion-ordered row log for scans, and per-`(position, constant)`
//! buckets for selective lookups. Concurrent `add` and `lookup` are
//! permitted: a fact added before a lookup begins is visible, a fact added
//! concurrently may or may not appear (the saturator re-evaluates via
//! work items, so this is benign).

use crate::interner::{ConstId, PredId};
use crate::types::GroundAtom;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use std::sync::Arc;

type Row = Arc<[ConstId]>;

#[derive(Default)]
struct Relation {
    seen: DashSet<Row, ahash::RandomState>,
    rows: RwLock<Vec<Row>>,
    by_arg: DashMap<(usize, ConstId), Vec<Row>, ahash::RandomState>,
}

impl Relation {
    fn add(&self, row: Row) -> bool {
        if !self.seen.insert(row.clone()) {
            return false;
        }
        for (position, constant) in row.iter().enumerate() {
            self.by_arg
                .entry((position, *constant))
                .or_default()
                .push(row.clone());
        }
        self.rows.write().push(row);
        true
    }

    fn lookup(&self, pattern: &[Option<ConstId>]) -> Vec<Row> {
        let matches = |row: &Row| {
            row.iter()
                .zip(pattern.iter())
                .all(|(arg, want)| want.map_or(true, |c| c == *arg))
        };

        // Any bound position narrows the scan to one bucket
        if let Some((position, constant)) = pattern
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.map(|c| (i, c)))
        {
            return match self.by_arg.get(&(position, constant)) {
                Some(bucket) => bucket.iter().filter(|r| matches(r)).cloned().collect(),
                None => Vec::new(),
            };
        }

        self.rows.read().clone()
    }

    fn contains(&self, row: &Row) -> bool {
        self.seen.contains(row)
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Concurrent fact store with per-predicate argument indexes
#[derive(Default)]
pub struct FactIndex {
    relations: DashMap<PredId, Arc<Relation>, ahash::RandomState>,
}

impl FactIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    fn relation(&self, pred: PredId) -> Arc<Relation> {
        let entry = self.relations.entry(pred).or_default();
        Arc::clone(entry.value())
    }

    /// Idempotent insert; returns whether the set changed
    pub fn add(&self, fact: &GroundAtom) -> bool {
        self.relation(fact.pred).add(fact.args.clone())
    }

    /// Whether the exact ground atom is present
    pub fn contains(&self, fact: &GroundAtom) -> bool {
        self.relations
            .get(&fact.pred)
            .map_or(false, |r| r.contains(&fact.args))
    }

    /// Ground atoms of `pred` matching the pattern: `Some(c)` positions
    /// must equal `c`, `None` positions are wildcards. Result ordering is
    /// unspecified.
    pub fn lookup(&self, pred: PredId, pattern: &[Option<ConstId>]) -> Vec<GroundAtom> {
        match self.relations.get(&pred) {
            Some(relation) => relation
                .lookup(pattern)
                .into_iter()
                .map(|args| GroundAtom { pred, args })
                .collect(),
            None => Vec::new(),
        }
    }

    /// All facts of one predicate
    pub fn all(&self, pred: PredId) -> Vec<GroundAtom> {
        match self.relations.get(&pred) {
            Some(relation) => relation
                .rows
                .read()
                .iter()
                .map(|args| GroundAtom {
                    pred,
                    args: args.clone(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Predicates with at least one fact
    pub fn predicates(&self) -> Vec<PredId> {
        self.relations.iter().map(|e| *e.key()).collect()
    }

    /// Total fact count across all predicates
    pub fn len(&self) -> usize {
        self.relations.iter().map(|e| e.value().len()).sum()
    }

    /// Whether the index holds no facts
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
