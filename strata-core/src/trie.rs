//! Concurrent redundancy trie
//!
//! A concurrent set of derivation fingerprints: the sequence of interned
//! ids a ground atom resolves to (predicate first, then its constants).
//! `add` is the linearization point for "who first derived this fact" —
//! it returns `true` exactly once per distinct fingerprint across all
//! threads.

use crate::types::GroundAtom;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Node {
    children: DashMap<u32, Arc<Node>, ahash::RandomState>,
    present: AtomicBool,
}

/// Concurrent prefix tree keyed per-level by interned id
#[derive(Default)]
pub struct RedundancyTrie {
    root: Node,
}

impl RedundancyTrie {
    /// Create an empty trie
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fingerprint. Returns `true` if it was absent (the caller
    /// proceeds) and `false` if already present (the caller skips).
    pub fn add(&self, fingerprint: impl IntoIterator<Item = u32>) -> bool {
        let mut node: Option<Arc<Node>> = None;
        for key in fingerprint {
            let next = {
                let current = node.as_deref().unwrap_or(&self.root);
                let entry = current.children.entry(key).or_default();
                Arc::clone(entry.value())
            };
            node = Some(next);
        }
        let leaf = node.as_deref().unwrap_or(&self.root);
        !leaf.present.swap(true, Ordering::SeqCst)
    }

    /// Insert the fingerprint of a ground atom
    pub fn add_fact(&self, fact: &GroundAtom) -> bool {
        let pred = fact.pred.0;
        self.add(std::iter::once(pred).chain(fact.args.iter().map(|c| c.0)))
    }
}
