//! Symbol interning for constants and predicates
//!
//! Every constant and predicate symbol is interned once per engine instance,
//! so equality checks and index keys are dense `u32` ids rather than string
//! comparisons. The reverse tables exist only for display and serialization.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Interned constant symbol id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstId(pub u32);

/// Interned predicate symbol id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredId(pub u32);

impl fmt::Display for ConstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl fmt::Display for PredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Per-engine interning tables for constants and `(name, arity)` predicate
/// symbols. Interning is callable from concurrent contexts; ids are stable
/// for the lifetime of the engine.
pub struct Interner {
    consts: DashMap<Arc<str>, ConstId, ahash::RandomState>,
    const_names: RwLock<Vec<Arc<str>>>,
    preds: DashMap<(Arc<str>, usize), PredId, ahash::RandomState>,
    pred_syms: RwLock<Vec<(Arc<str>, usize)>>,
}

impl Interner {
    /// Create empty tables
    pub fn new() -> Self {
        Interner {
            consts: DashMap::with_hasher(ahash::RandomState::new()),
            const_names: RwLock::new(Vec::new()),
            preds: DashMap::with_hasher(ahash::RandomState::new()),
            pred_syms: RwLock::new(Vec::new()),
        }
    }

    /// Intern a constant symbol
    pub fn constant(&self, name: &str) -> ConstId {
        if let Some(id) = self.consts.get(name) {
            return *id;
        }
        let key: Arc<str> = Arc::from(name);
        *self.consts.entry(key.clone()).or_insert_with(|| {
            let mut names = self.const_names.write();
            let id = ConstId(names.len() as u32);
            names.push(key);
            id
        })
    }

    /// Resolve a constant id back to its name
    pub fn const_name(&self, id: ConstId) -> Arc<str> {
        self.const_names.read()[id.0 as usize].clone()
    }

    /// Intern a predicate symbol by name and arity
    pub fn predicate(&self, name: &str, arity: usize) -> PredId {
        let key = (Arc::<str>::from(name), arity);
        if let Some(id) = self.preds.get(&key) {
            return *id;
        }
        *self.preds.entry(key.clone()).or_insert_with(|| {
            let mut syms = self.pred_syms.write();
            let id = PredId(syms.len() as u32);
            syms.push(key);
            id
        })
    }

    /// Predicate name for an interned id
    pub fn pred_name(&self, id: PredId) -> Arc<str> {
        self.pred_syms.read()[id.0 as usize].0.clone()
    }

    /// Predicate arity for an interned id
    pub fn pred_arity(&self, id: PredId) -> usize {
        self.pred_syms.read()[id.0 as usize].1
    }

    /// All interned predicate ids sharing a name, in arity order
    pub fn predicates_named(&self, name: &str) -> Vec<PredId> {
        self.pred_syms
            .read()
            .iter()
            .enumerate()
            .filter(|(_, (n, _))| n.as_ref() == name)
            .map(|(i, _)| PredId(i as u32))
            .collect()
    }

    /// Number of interned constants
    pub fn const_count(&self) -> usize {
        self.const_names.read().len()
    }

    /// Number of interned predicate symbols
    pub fn pred_count(&self) -> usize {
        self.pred_syms.read().len()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
