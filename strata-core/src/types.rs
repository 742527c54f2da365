//! Core Datalog data structures
//!
//! This module defines the fundamental types for the engine:
//! - Terms (variables and interned constants)
//! - Atoms (predicates with terms) and the four premise kinds
//! - Clauses (Horn clauses)
//! - Ground atoms (saturation output)
//!
//! All types are immutable after construction and cheap to clone.

use crate::interner::{ConstId, Interner, PredId};
use ahash::AHashSet;
use serde::Serialize;
use std::sync::Arc;

/// A term in Datalog (variable or interned constant)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Variable (e.g., X, Person). Anonymous variables carry generated
    /// names in the `_` namespace, one per occurrence.
    Variable(Arc<str>),
    /// Interned constant
    Constant(ConstId),
}

impl Term {
    /// Create a variable term
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(Arc::from(name.into().into_boxed_str()))
    }

    /// Create a constant term
    pub fn constant(id: ConstId) -> Self {
        Term::Constant(id)
    }

    /// Check if term is a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Get variable name if this is a variable
    pub fn as_variable(&self) -> Option<&Arc<str>> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Get constant id if this is a constant
    pub fn as_constant(&self) -> Option<ConstId> {
        match self {
            Term::Constant(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether this is an anonymous (`_`) variable occurrence
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Term::Variable(name) if name.starts_with('_'))
    }

    /// Render against the interner
    pub fn to_text(&self, interner: &Interner) -> String {
        match self {
            Term::Variable(name) => name.to_string(),
            Term::Constant(id) => interner.const_name(*id).to_string(),
        }
    }
}

/// An atom: predicate applied to terms, `terms.len() == arity`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    /// Interned predicate symbol
    pub pred: PredId,
    /// Argument terms
    pub terms: Vec<Term>,
}

impl Atom {
    /// Create a new atom
    pub fn new(pred: PredId, terms: Vec<Term>) -> Self {
        Atom { pred, terms }
    }

    /// Number of arguments
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Variable names occurring in this atom
    pub fn variables(&self) -> Vec<Arc<str>> {
        self.terms
            .iter()
            .filter_map(|t| t.as_variable().cloned())
            .collect()
    }

    /// Check if atom is ground (no variables)
    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(|t| !t.is_variable())
    }

    /// Convert to a ground atom; `None` if any term is a variable
    pub fn to_ground(&self) -> Option<GroundAtom> {
        let args: Option<Vec<ConstId>> = self.terms.iter().map(|t| t.as_constant()).collect();
        args.map(|args| GroundAtom::new(self.pred, args))
    }

    /// Render against the interner
    pub fn to_text(&self, interner: &Interner) -> String {
        let name = interner.pred_name(self.pred);
        if self.terms.is_empty() {
            return name.to_string();
        }
        let args: Vec<String> = self.terms.iter().map(|t| t.to_text(interner)).collect();
        format!("{}({})", name, args.join(", "))
    }
}

/// A premise in a clause body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Premise {
    /// Positive atom
    Atom(Atom),
    /// Negated atom (`not p(...)`)
    Negated(Atom),
    /// Explicit unification (`X = Y`)
    Unify(Term, Term),
    /// Explicit disunification (`X != Y`)
    Disunify(Term, Term),
}

impl Premise {
    /// Variable names occurring in this premise
    pub fn variables(&self) -> Vec<Arc<str>> {
        match self {
            Premise::Atom(a) | Premise::Negated(a) => a.variables(),
            Premise::Unify(l, r) | Premise::Disunify(l, r) => [l, r]
                .into_iter()
                .filter_map(|t| t.as_variable().cloned())
                .collect(),
        }
    }

    /// Render against the interner
    pub fn to_text(&self, interner: &Interner) -> String {
        match self {
            Premise::Atom(a) => a.to_text(interner),
            Premise::Negated(a) => format!("not {}", a.to_text(interner)),
            Premise::Unify(l, r) => format!("{} = {}", l.to_text(interner), r.to_text(interner)),
            Premise::Disunify(l, r) => {
                format!("{} != {}", l.to_text(interner), r.to_text(interner))
            }
        }
    }
}

/// A Datalog clause (Horn clause): `head :- body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Head of the clause
    pub head: Atom,
    /// Body premises, in source order
    pub body: Vec<Premise>,
}

impl Clause {
    /// Create a new clause
    pub fn new(head: Atom, body: Vec<Premise>) -> Self {
        Clause { head, body }
    }

    /// Create a fact (clause with empty body)
    pub fn fact(head: Atom) -> Self {
        Clause::new(head, vec![])
    }

    /// Check if this is a fact (empty body)
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// Distinct variable names in the clause
    pub fn variables(&self) -> AHashSet<Arc<str>> {
        let mut vars: AHashSet<Arc<str>> = self.head.variables().into_iter().collect();
        for premise in &self.body {
            vars.extend(premise.variables());
        }
        vars
    }

    /// Render against the interner
    pub fn to_text(&self, interner: &Interner) -> String {
        let head = self.head.to_text(interner);
        if self.body.is_empty() {
            return format!("{}.", head);
        }
        let body: Vec<String> = self.body.iter().map(|p| p.to_text(interner)).collect();
        format!("{} :- {}.", head, body.join(", "))
    }
}

/// A ground atom: all arguments are constants. The saturation output is a
/// set of these, partitioned by predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroundAtom {
    /// Interned predicate symbol
    pub pred: PredId,
    /// Constant arguments
    pub args: Arc<[ConstId]>,
}

impl GroundAtom {
    /// Create a new ground atom
    pub fn new(pred: PredId, args: Vec<ConstId>) -> Self {
        GroundAtom {
            pred,
            args: Arc::from(args.into_boxed_slice()),
        }
    }

    /// Render against the interner
    pub fn to_text(&self, interner: &Interner) -> String {
        let name = interner.pred_name(self.pred);
        if self.args.is_empty() {
            return name.to_string();
        }
        let args: Vec<String> = self
            .args
            .iter()
            .map(|c| interner.const_name(*c).to_string())
            .collect();
        format!("{}({})", name, args.join(", "))
    }

    /// Resolve ids to names for display and serialization
    pub fn resolve(&self, interner: &Interner) -> ResolvedAtom {
        ResolvedAtom {
            predicate: interner.pred_name(self.pred).to_string(),
            args: self
                .args
                .iter()
                .map(|c| interner.const_name(*c).to_string())
                .collect(),
        }
    }
}

/// A ground atom with interned ids resolved back to names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAtom {
    /// Predicate name
    pub predicate: String,
    /// Constant argument names
    pub args: Vec<String>,
}
