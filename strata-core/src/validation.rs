//! Program validation, rewriting, and stratification
//!
//! The validator accepts a raw clause set and produces a validated, possibly
//! rewritten program plus the EDB/IDB partition and a stratum assignment:
//!
//! - explicit unifications are resolved by substitution and eliminated
//! - range restriction and negation/disunification safety are enforced
//! - the predicate dependency graph is condensed with a Tarjan SCC pass and
//!   each component is assigned a stratum; a negative edge inside a
//!   component rejects the program

use crate::error::{ValidationError, ValidationErrorKind};
use crate::interner::{Interner, PredId};
use crate::types::{Atom, Clause, Premise};
use crate::unification::Substitution;
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;

/// Prefix reserved for predicates introduced by program transformations.
/// Source programs may not use it.
pub const RESERVED_PREFIX: &str = "%";

/// Whether a predicate is extensional or intensional
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredKind {
    /// Appears only in facts
    Edb,
    /// Head of at least one rule with a non-empty body
    Idb,
}

/// Validation output per predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredInfo {
    /// EDB/IDB classification
    pub kind: PredKind,
    /// Stratum index; negated dependencies live strictly below
    pub stratum: usize,
}

/// A validated, rewritten program
#[derive(Debug, Clone)]
pub struct ValidatedProgram {
    /// Surviving clauses; explicit unifications have been eliminated and
    /// clauses with unsatisfiable bodies dropped
    pub clauses: Vec<Clause>,
    /// Classification and stratum per predicate occurring in the program
    pub preds: AHashMap<PredId, PredInfo>,
    /// Number of strata (at least 1 for a non-empty program)
    pub stratum_count: usize,
}

impl ValidatedProgram {
    /// Info for a predicate, if it occurs in the program
    pub fn pred_info(&self, pred: PredId) -> Option<PredInfo> {
        self.preds.get(&pred).copied()
    }

    /// Ground facts (bodyless clauses) for one predicate
    pub fn facts_for(&self, pred: PredId) -> Vec<crate::types::GroundAtom> {
        self.clauses
            .iter()
            .filter(|c| c.is_fact() && c.head.pred == pred)
            .filter_map(|c| c.head.to_ground())
            .collect()
    }
}

/// Feature switches for explicit (dis)unification in rule bodies
#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    /// Allow `X = Y` premises
    pub allow_unification: bool,
    /// Allow `X != Y` premises
    pub allow_disunification: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            allow_unification: true,
            allow_disunification: true,
        }
    }
}

/// Validates raw clause sets into [`ValidatedProgram`]s
pub struct Validator {
    config: ValidatorConfig,
    interner: Arc<Interner>,
}

impl Validator {
    /// Create a validator with default configuration
    pub fn new(interner: Arc<Interner>) -> Self {
        Self::with_config(interner, ValidatorConfig::default())
    }

    /// Create a validator with explicit configuration
    pub fn with_config(interner: Arc<Interner>, config: ValidatorConfig) -> Self {
        Validator { config, interner }
    }

    /// Validate a raw clause set
    pub fn validate(&self, clauses: &[Clause]) -> Result<ValidatedProgram, ValidationError> {
        self.validate_with_reserved(clauses, false)
    }

    /// Validation entry point used for transformer output, where reserved
    /// predicate names are legitimate.
    pub(crate) fn validate_with_reserved(
        &self,
        clauses: &[Clause],
        allow_reserved: bool,
    ) -> Result<ValidatedProgram, ValidationError> {
        self.check_names(clauses, allow_reserved)?;

        let preds = self.classify(clauses);

        let mut rewritten = Vec::with_capacity(clauses.len());
        for clause in clauses {
            if let Some(clause) = self.rewrite_clause(clause)? {
                self.check_safety(&clause)?;
                rewritten.push(clause);
            }
        }

        let (preds, stratum_count) = self.stratify(&rewritten, preds)?;

        tracing::debug!(
            clauses = rewritten.len(),
            predicates = preds.len(),
            strata = stratum_count,
            "program validated"
        );

        Ok(ValidatedProgram {
            clauses: rewritten,
            preds,
            stratum_count,
        })
    }

    /// Reject reserved predicate names and per-name arity conflicts
    fn check_names(
        &self,
        clauses: &[Clause],
        allow_reserved: bool,
    ) -> Result<(), ValidationError> {
        let mut arities: AHashMap<Arc<str>, usize> = AHashMap::new();

        let mut check = |atom: &Atom, clause: &Clause| -> Result<(), ValidationError> {
            let name = self.interner.pred_name(atom.pred);
            if !allow_reserved && name.starts_with(RESERVED_PREFIX) {
                return Err(ValidationError::new(
                    ValidationErrorKind::DisallowedFeature,
                    format!(
                        "predicate name '{}' uses the reserved prefix '{}' in '{}'",
                        name,
                        RESERVED_PREFIX,
                        clause.to_text(&self.interner)
                    ),
                ));
            }
            match arities.get(&name).copied() {
                Some(arity) if arity != atom.arity() => Err(ValidationError::new(
                    ValidationErrorKind::ArityMismatch,
                    format!(
                        "predicate '{}' used with arity {} and {} in '{}'",
                        name,
                        arity,
                        atom.arity(),
                        clause.to_text(&self.interner)
                    ),
                )),
                Some(_) => Ok(()),
                None => {
                    arities.insert(name, atom.arity());
                    Ok(())
                }
            }
        };

        for clause in clauses {
            check(&clause.head, clause)?;
            for premise in &clause.body {
                if let Premise::Atom(a) | Premise::Negated(a) = premise {
                    check(a, clause)?;
                }
            }
        }
        Ok(())
    }

    /// EDB/IDB partition over every predicate occurring in the program.
    /// Classification runs on the raw clause set, so a predicate defined
    /// only by a clause later dropped as unsatisfiable stays known (and
    /// simply has an empty extent).
    fn classify(&self, clauses: &[Clause]) -> AHashMap<PredId, PredKind> {
        let mut idb: AHashSet<PredId> = AHashSet::new();
        let mut all: AHashSet<PredId> = AHashSet::new();

        for clause in clauses {
            all.insert(clause.head.pred);
            if !clause.is_fact() {
                idb.insert(clause.head.pred);
            }
            for premise in &clause.body {
                if let Premise::Atom(a) | Premise::Negated(a) = premise {
                    all.insert(a.pred);
                }
            }
        }

        all.into_iter()
            .map(|p| {
                let kind = if idb.contains(&p) {
                    PredKind::Idb
                } else {
                    PredKind::Edb
                };
                (p, kind)
            })
            .collect()
    }

    /// Resolve explicit unifications, decide ground disunifications, and
    /// reject anonymous head variables and disabled features. Returns
    /// `None` for clauses whose body is unsatisfiable.
    fn rewrite_clause(&self, clause: &Clause) -> Result<Option<Clause>, ValidationError> {
        let text = || clause.to_text(&self.interner);

        if clause.head.terms.iter().any(|t| t.is_anonymous()) {
            return Err(ValidationError::new(
                ValidationErrorKind::UnsafeVariable,
                format!("anonymous variable in head of '{}'", text()),
            ));
        }

        let mut sub = Substitution::new();
        for premise in &clause.body {
            match premise {
                Premise::Unify(l, r) => {
                    if !self.config.allow_unification {
                        return Err(ValidationError::new(
                            ValidationErrorKind::DisallowedFeature,
                            format!("unification is disabled: '{}'", text()),
                        ));
                    }
                    if l.is_anonymous() || r.is_anonymous() {
                        return Err(ValidationError::new(
                            ValidationErrorKind::UselessUnification,
                            format!("unification against '_' in '{}'", text()),
                        ));
                    }
                    if !sub.unify_terms(l, r) {
                        // Distinct constants forced equal: the body can
                        // never be satisfied.
                        return Ok(None);
                    }
                }
                Premise::Disunify(..) if !self.config.allow_disunification => {
                    return Err(ValidationError::new(
                        ValidationErrorKind::DisallowedFeature,
                        format!("disunification is disabled: '{}'", text()),
                    ));
                }
                _ => {}
            }
        }

        let head = sub.apply(&clause.head);
        let mut body = Vec::with_capacity(clause.body.len());
        for premise in &clause.body {
            match premise {
                Premise::Unify(..) => {} // resolved into the substitution
                Premise::Atom(a) => body.push(Premise::Atom(sub.apply(a))),
                Premise::Negated(a) => body.push(Premise::Negated(sub.apply(a))),
                Premise::Disunify(l, r) => {
                    let l = sub.resolve(l);
                    let r = sub.resolve(r);
                    match (l.as_constant(), r.as_constant()) {
                        // Decidable now: drop the premise or the clause
                        (Some(a), Some(b)) if a != b => {}
                        (Some(_), Some(_)) => return Ok(None),
                        _ => body.push(Premise::Disunify(l, r)),
                    }
                }
            }
        }

        Ok(Some(Clause::new(head, body)))
    }

    /// Range restriction plus negation/disunification safety: every head
    /// variable, and every variable in a negated atom or disunification,
    /// must occur in a positive body atom.
    fn check_safety(&self, clause: &Clause) -> Result<(), ValidationError> {
        let positive: AHashSet<Arc<str>> = clause
            .body
            .iter()
            .filter_map(|p| match p {
                Premise::Atom(a) => Some(a.variables()),
                _ => None,
            })
            .flatten()
            .collect();

        let unsafe_var = |var: &Arc<str>, place: &str| {
            ValidationError::new(
                ValidationErrorKind::UnsafeVariable,
                format!(
                    "variable '{}' in {} of '{}' is not bound by a positive body atom",
                    var,
                    place,
                    clause.to_text(&self.interner)
                ),
            )
        };

        for var in clause.head.variables() {
            if !positive.contains(&var) {
                return Err(unsafe_var(&var, "head"));
            }
        }
        for premise in &clause.body {
            let (vars, place) = match premise {
                Premise::Negated(a) => (a.variables(), "negated atom"),
                Premise::Disunify(..) => (premise.variables(), "disunification"),
                _ => continue,
            };
            for var in vars {
                if !positive.contains(&var) {
                    return Err(unsafe_var(&var, place));
                }
            }
        }
        Ok(())
    }

    /// Build the predicate dependency graph, condense it with Tarjan's
    /// algorithm over arena indices, and assign strata so that every
    /// negative edge goes strictly upward.
    fn stratify(
        &self,
        clauses: &[Clause],
        kinds: AHashMap<PredId, PredKind>,
    ) -> Result<(AHashMap<PredId, PredInfo>, usize), ValidationError> {
        let nodes: Vec<PredId> = {
            let mut nodes: Vec<PredId> = kinds.keys().copied().collect();
            nodes.sort();
            nodes
        };
        let index_of: AHashMap<PredId, usize> =
            nodes.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        // Edge head -> body predicate, true when through negation
        let mut adj: Vec<Vec<(usize, bool)>> = vec![Vec::new(); nodes.len()];
        for clause in clauses {
            let from = index_of[&clause.head.pred];
            for premise in &clause.body {
                match premise {
                    Premise::Atom(a) => adj[from].push((index_of[&a.pred], false)),
                    Premise::Negated(a) => adj[from].push((index_of[&a.pred], true)),
                    _ => {}
                }
            }
        }

        let sccs = tarjan_sccs(&adj);

        let mut scc_of = vec![0usize; nodes.len()];
        for (i, scc) in sccs.iter().enumerate() {
            for &v in scc {
                scc_of[v] = i;
            }
        }

        // Tarjan emits components in reverse topological order, so every
        // successor component already has its stratum.
        let mut scc_stratum = vec![0usize; sccs.len()];
        for (i, scc) in sccs.iter().enumerate() {
            let mut stratum = 0;
            for &v in scc {
                for &(w, negative) in &adj[v] {
                    if scc_of[w] == i {
                        if negative {
                            let name = self.interner.pred_name(nodes[v]);
                            return Err(ValidationError::new(
                                ValidationErrorKind::Unstratified,
                                format!("predicate '{}' depends negatively on its own cycle", name),
                            ));
                        }
                    } else {
                        stratum = stratum.max(scc_stratum[scc_of[w]] + negative as usize);
                    }
                }
            }
            scc_stratum[i] = stratum;
        }

        let stratum_count = scc_stratum.iter().max().map_or(0, |s| s + 1).max(1);

        let preds = kinds
            .into_iter()
            .map(|(p, kind)| {
                let stratum = scc_stratum[scc_of[index_of[&p]]];
                (p, PredInfo { kind, stratum })
            })
            .collect();

        Ok((preds, stratum_count))
    }
}

/// Strongly connected components of a directed graph over arena indices, in
/// reverse topological order of the condensation.
fn tarjan_sccs(adj: &[Vec<(usize, bool)>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;

    let n = adj.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next = 0usize;
    let mut sccs: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }

        let mut dfs: Vec<(usize, usize)> = vec![(start, 0)];
        index[start] = next;
        lowlink[start] = next;
        next += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(top) = dfs.last_mut() {
            let v = top.0;
            if top.1 < adj[v].len() {
                let (w, _) = adj[v][top.1];
                top.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next;
                    lowlink[w] = next;
                    next += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    dfs.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                dfs.pop();
                if let Some(parent) = dfs.last() {
                    let p = parent.0;
                    lowlink[p] = lowlink[p].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    let mut scc = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        scc.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(scc);
                }
            }
        }
    }

    sccs
}
