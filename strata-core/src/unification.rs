//! Unification over terms and atoms
//!
//! The general [`Substitution`] maps variables to terms with transitive
//! lookup; it is used by the validator's equality propagation and by the
//! magic-set transformer. Clause evaluation uses the dense constant-only
//! bindings in [`crate::annotate`] instead.

use crate::types::{Atom, Term};
use ahash::AHashMap;
use std::sync::Arc;

/// A partial mapping from variable names to terms. Composition is
/// left-to-right; lookups follow variable chains transitively.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    bindings: AHashMap<Arc<str>, Term>,
}

impl Substitution {
    /// Create an empty substitution
    pub fn new() -> Self {
        Substitution {
            bindings: AHashMap::new(),
        }
    }

    /// Bind a variable to a term
    pub fn bind(&mut self, variable: Arc<str>, term: Term) {
        self.bindings.insert(variable, term);
    }

    /// Resolve a term through the binding chain. A variable resolves to the
    /// last term in its chain; constants resolve to themselves.
    pub fn resolve(&self, term: &Term) -> Term {
        let mut current = term.clone();
        // Chains are acyclic: a variable is only ever bound while unbound.
        while let Term::Variable(name) = &current {
            match self.bindings.get(name) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Apply the substitution to an atom
    pub fn apply(&self, atom: &Atom) -> Atom {
        Atom::new(
            atom.pred,
            atom.terms.iter().map(|t| self.resolve(t)).collect(),
        )
    }

    /// Unify two terms under the existing bindings, extending on success.
    /// A variable may bind to any term; constants unify only with equal
    /// constants or unbound variables.
    pub fn unify_terms(&mut self, left: &Term, right: &Term) -> bool {
        let left = self.resolve(left);
        let right = self.resolve(right);

        match (&left, &right) {
            (Term::Constant(a), Term::Constant(b)) => a == b,
            (Term::Variable(v), other) | (other, Term::Variable(v)) => {
                // Identical unbound variables unify without a new binding
                if let Term::Variable(w) = other {
                    if v == w {
                        return true;
                    }
                }
                self.bind(v.clone(), other.clone());
                true
            }
        }
    }

    /// Unify two atoms, extending the substitution on success
    pub fn unify_atoms(&mut self, left: &Atom, right: &Atom) -> bool {
        if left.pred != right.pred || left.terms.len() != right.terms.len() {
            return false;
        }
        left.terms
            .iter()
            .zip(right.terms.iter())
            .all(|(l, r)| self.unify_terms(l, r))
    }

    /// Check if substitution is empty
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

/// Unify two atoms from an empty substitution
pub fn unify_atoms(left: &Atom, right: &Atom) -> Option<Substitution> {
    let mut sub = Substitution::new();
    sub.unify_atoms(left, right).then_some(sub)
}
