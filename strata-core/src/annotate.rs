//! Semi-naive annotation of validated programs
//!
//! Each clause is rewritten into one annotated clause per "delta" position:
//! a positive body atom whose predicate is derived in the clause's own
//! stratum. At evaluation time only derivations where the delta atom
//! matches a newly derived fact are considered; the other positives are
//! matched against the full index. Clauses with no delta candidate (all
//! positives extensional or saturated in a lower stratum) become one-shot
//! clauses, evaluated once when their stratum is seeded.
//!
//! The annotator also fixes the body execution order: the delta atom first,
//! the remaining positives in source order, and every negation and
//! (dis)unification placed immediately after the premise that binds the
//! last of its variables. Clause variables are renumbered densely so the
//! evaluator can use array-backed bindings.

use crate::interner::{ConstId, PredId};
use crate::types::{Atom, Clause, Premise, Term};
use crate::validation::{PredKind, ValidatedProgram};
use ahash::AHashMap;
use std::sync::Arc;

/// A term lowered to the evaluation representation: clause-local variable
/// index or interned constant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalTerm {
    /// Interned constant
    Const(ConstId),
    /// Dense clause-local variable index
    Var(usize),
}

/// An atom lowered for evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalAtom {
    /// Interned predicate symbol
    pub pred: PredId,
    /// Lowered argument terms
    pub terms: Box<[EvalTerm]>,
}

/// A body premise in annotator-fixed execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalPremise {
    /// Positive atom matched against the fact index
    Positive(EvalAtom),
    /// Negated atom; ground-resolved and required absent
    Negative(EvalAtom),
    /// Equality: bind or check
    Unify(EvalTerm, EvalTerm),
    /// Disequality: both sides must be ground and distinct
    Disunify(EvalTerm, EvalTerm),
}

/// A clause rewritten into an evaluation plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedClause {
    /// Head to derive
    pub head: EvalAtom,
    /// Delta atom; `None` for one-shot clauses
    pub delta: Option<EvalAtom>,
    /// Remaining premises in fixed execution order
    pub body: Vec<EvalPremise>,
    /// Number of distinct clause variables
    pub var_count: usize,
}

/// Evaluation plan for one stratum
#[derive(Debug, Clone, Default)]
pub struct Stratum {
    /// Annotated clauses keyed by their delta atom's predicate
    pub rules_by_delta: AHashMap<PredId, Vec<Arc<AnnotatedClause>>>,
    /// Clauses evaluated once when the stratum is seeded
    pub one_shot: Vec<Arc<AnnotatedClause>>,
    /// Ground facts (bodyless clauses) belonging to this stratum
    pub facts: Vec<crate::types::GroundAtom>,
}

/// The whole program as per-stratum evaluation plans
#[derive(Debug, Clone)]
pub struct AnnotatedProgram {
    /// Strata in evaluation order
    pub strata: Vec<Stratum>,
}

/// Annotate a validated program
pub fn annotate(program: &ValidatedProgram) -> AnnotatedProgram {
    let mut strata = vec![Stratum::default(); program.stratum_count];

    for clause in &program.clauses {
        let stratum_idx = program
            .pred_info(clause.head.pred)
            .map_or(0, |info| info.stratum);
        let stratum = &mut strata[stratum_idx];

        if clause.is_fact() {
            if let Some(fact) = clause.head.to_ground() {
                stratum.facts.push(fact);
            }
            continue;
        }

        let delta_positions: Vec<usize> = clause
            .body
            .iter()
            .enumerate()
            .filter_map(|(i, premise)| match premise {
                Premise::Atom(atom) => {
                    let info = program.pred_info(atom.pred)?;
                    (info.kind == PredKind::Idb && info.stratum == stratum_idx).then_some(i)
                }
                _ => None,
            })
            .collect();

        if delta_positions.is_empty() {
            stratum.one_shot.push(Arc::new(build(clause, None)));
        } else {
            for position in delta_positions {
                let annotated = Arc::new(build(clause, Some(position)));
                let delta_pred = match &annotated.delta {
                    Some(delta) => delta.pred,
                    None => continue,
                };
                stratum
                    .rules_by_delta
                    .entry(delta_pred)
                    .or_default()
                    .push(annotated);
            }
        }
    }

    AnnotatedProgram { strata }
}

/// Lower one clause into an annotated clause with the given delta position
fn build(clause: &Clause, delta_position: Option<usize>) -> AnnotatedClause {
    let mut numbering = Numbering::default();

    let delta = delta_position.map(|i| match &clause.body[i] {
        Premise::Atom(atom) => numbering.atom(atom),
        _ => unreachable!("delta positions are positive atoms"),
    });

    // Variables bound so far, by dense index; negations and
    // (dis)unifications wait here until their last variable is bound.
    let mut bound: Vec<bool> = Vec::new();
    let mut pending: Vec<EvalPremise> = Vec::new();
    let mut body: Vec<EvalPremise> = Vec::new();

    let mark_bound = |bound: &mut Vec<bool>, atom: &EvalAtom| {
        for term in atom.terms.iter() {
            if let EvalTerm::Var(v) = term {
                if *v >= bound.len() {
                    bound.resize(v + 1, false);
                }
                bound[*v] = true;
            }
        }
    };
    let is_bound = |bound: &[bool], premise: &EvalPremise| {
        let term_bound = |t: &EvalTerm| match t {
            EvalTerm::Const(_) => true,
            EvalTerm::Var(v) => bound.get(*v).copied().unwrap_or(false),
        };
        match premise {
            EvalPremise::Positive(a) | EvalPremise::Negative(a) => {
                a.terms.iter().all(term_bound)
            }
            EvalPremise::Unify(l, r) | EvalPremise::Disunify(l, r) => {
                term_bound(l) && term_bound(r)
            }
        }
    };

    if let Some(delta) = &delta {
        mark_bound(&mut bound, delta);
    }

    for (i, premise) in clause.body.iter().enumerate() {
        if Some(i) == delta_position {
            continue;
        }
        match premise {
            Premise::Atom(atom) => {
                let atom = numbering.atom(atom);
                mark_bound(&mut bound, &atom);
                body.push(EvalPremise::Positive(atom));
                // Release every pending premise that just became ground
                let mut i = 0;
                while i < pending.len() {
                    if is_bound(&bound, &pending[i]) {
                        body.push(pending.remove(i));
                    } else {
                        i += 1;
                    }
                }
            }
            Premise::Negated(atom) => {
                let premise = EvalPremise::Negative(numbering.atom(atom));
                if is_bound(&bound, &premise) {
                    body.push(premise);
                } else {
                    pending.push(premise);
                }
            }
            Premise::Unify(l, r) => {
                let premise = EvalPremise::Unify(numbering.term(l), numbering.term(r));
                if is_bound(&bound, &premise) {
                    body.push(premise);
                } else {
                    pending.push(premise);
                }
            }
            Premise::Disunify(l, r) => {
                let premise = EvalPremise::Disunify(numbering.term(l), numbering.term(r));
                if is_bound(&bound, &premise) {
                    body.push(premise);
                } else {
                    pending.push(premise);
                }
            }
        }
    }

    // Safety validation guarantees every variable is eventually bound by a
    // positive atom, so nothing stays pending.
    debug_assert!(pending.is_empty(), "premise left unbound after annotation");
    body.append(&mut pending);

    let head = numbering.atom(&clause.head);

    AnnotatedClause {
        head,
        delta,
        body,
        var_count: numbering.count(),
    }
}

/// Dense renumbering of clause variables
#[derive(Default)]
struct Numbering {
    map: AHashMap<Arc<str>, usize>,
}

impl Numbering {
    fn term(&mut self, term: &Term) -> EvalTerm {
        match term {
            Term::Constant(c) => EvalTerm::Const(*c),
            Term::Variable(name) => {
                let next = self.map.len();
                EvalTerm::Var(*self.map.entry(name.clone()).or_insert(next))
            }
        }
    }

    fn atom(&mut self, atom: &Atom) -> EvalAtom {
        EvalAtom {
            pred: atom.pred,
            terms: atom.terms.iter().map(|t| self.term(t)).collect(),
        }
    }

    fn count(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::Interner;
    use crate::parser::parse_program;
    use crate::validation::Validator;

    fn annotated(source: &str) -> (AnnotatedProgram, Arc<Interner>) {
        let interner = Arc::new(Interner::new());
        let program = parse_program(source, &interner).expect("parse");
        let validated = Validator::new(interner.clone())
            .validate(&program.clauses)
            .expect("validate");
        (annotate(&validated), interner)
    }

    #[test]
    fn test_one_annotated_clause_per_delta_position() {
        let (program, interner) = annotated(
            "edge(a, b). \
             tc(X, Y) :- edge(X, Y). \
             tc(X, Y) :- tc(X, Z), tc(Z, Y).",
        );

        let tc = interner.predicate("tc", 2);
        let stratum = &program.strata[0];

        // The doubly recursive clause annotates twice, once per tc atom
        assert_eq!(stratum.rules_by_delta[&tc].len(), 2);
        // tc(X,Y) :- edge(X,Y) has no same-stratum positive, so one-shot
        assert_eq!(stratum.one_shot.len(), 1);
        assert_eq!(stratum.facts.len(), 1);
    }

    #[test]
    fn test_delta_is_pulled_to_front() {
        let (program, interner) = annotated(
            "edge(a, b). \
             tc(X, Y) :- edge(X, Y). \
             tc(X, Y) :- edge(X, Z), tc(Z, Y).",
        );

        let tc = interner.predicate("tc", 2);
        let edge = interner.predicate("edge", 2);
        let rules = &program.strata[0].rules_by_delta[&tc];

        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.delta.as_ref().map(|d| d.pred), Some(tc));
        assert!(matches!(&rule.body[0], EvalPremise::Positive(a) if a.pred == edge));
    }

    #[test]
    fn test_comparisons_run_once_bound() {
        // X != Y can only run after tc binds both
        let (program, interner) = annotated(
            "edge(a, b). \
             tc(X, Y) :- edge(X, Y). \
             noncycle(X, Y) :- X != Y, tc(X, Y).",
        );

        let stratum = &program.strata[0];
        let noncycle = interner.predicate("noncycle", 2);
        let tc = interner.predicate("tc", 2);
        let rule = stratum.rules_by_delta[&tc]
            .iter()
            .find(|r| r.head.pred == noncycle)
            .expect("noncycle rule");

        // The disunification trails the delta atom that bound its variables
        assert_eq!(rule.body.len(), 1);
        assert!(matches!(rule.body[0], EvalPremise::Disunify(..)));
    }

    #[test]
    fn test_negation_waits_for_bindings() {
        let (program, interner) = annotated(
            "node(a). edge(a, b). \
             reach(X) :- edge(a, X). \
             isolated(X) :- not reach(X), node(X).",
        );

        // isolated is in stratum 1 and has no same-stratum positives
        let stratum = &program.strata[1];
        assert_eq!(stratum.one_shot.len(), 1);
        let rule = &stratum.one_shot[0];
        let node = interner.predicate("node", 1);

        // node(X) must run before the negation despite source order
        assert!(matches!(&rule.body[0], EvalPremise::Positive(a) if a.pred == node));
        assert!(matches!(rule.body[1], EvalPremise::Negative(_)));
    }

    #[test]
    fn test_variable_numbering_is_dense() {
        let (program, interner) = annotated(
            "edge(a, b). \
             tc(X, Y) :- edge(X, Y). \
             tc(X, Y) :- edge(X, Z), tc(Z, Y).",
        );

        let tc = interner.predicate("tc", 2);
        let rule = &program.strata[0].rules_by_delta[&tc][0];
        assert_eq!(rule.var_count, 3);
    }
}
