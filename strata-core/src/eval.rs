//! Clause evaluation
//!
//! Given an annotated clause and a candidate fact for its delta atom,
//! enumerate all ground head atoms derivable from the candidate plus the
//! facts currently in the index. The walk follows the annotator-fixed
//! premise order with backtracking over dense constant bindings. The
//! evaluator does no I/O and mutates no shared state directly; cross-worker
//! effects go through the redundancy trie, the index, and the caller's
//! callback.

use crate::annotate::{AnnotatedClause, EvalAtom, EvalPremise, EvalTerm};
use crate::error::{Error, Result};
use crate::index::FactIndex;
use crate::interner::ConstId;
use crate::trie::RedundancyTrie;
use crate::types::GroundAtom;

type Bindings = Vec<Option<ConstId>>;

/// Evaluate an annotated clause against a newly derived fact for its delta
/// atom. Fresh head facts (per the redundancy trie) are passed to `report`.
pub fn evaluate_delta(
    clause: &AnnotatedClause,
    fact: &GroundAtom,
    index: &FactIndex,
    trie: &RedundancyTrie,
    report: &mut dyn FnMut(GroundAtom),
) -> Result<()> {
    let delta = match &clause.delta {
        Some(delta) => delta,
        None => {
            return Err(Error::Invariant(
                "delta evaluation of a one-shot clause".into(),
            ))
        }
    };
    debug_assert_eq!(delta.pred, fact.pred);
    if delta.terms.len() != fact.args.len() {
        return Err(Error::Invariant("delta arity does not match fact".into()));
    }

    let mut bindings: Bindings = vec![None; clause.var_count];
    for (term, constant) in delta.terms.iter().zip(fact.args.iter()) {
        match term {
            EvalTerm::Const(c) => {
                if c != constant {
                    return Ok(());
                }
            }
            EvalTerm::Var(v) => match bindings[*v] {
                Some(bound) if bound != *constant => return Ok(()),
                _ => bindings[*v] = Some(*constant),
            },
        }
    }

    walk(clause, 0, &mut bindings, index, trie, report)
}

/// Evaluate a one-shot clause (no delta atom) against the index
pub fn evaluate_one_shot(
    clause: &AnnotatedClause,
    index: &FactIndex,
    trie: &RedundancyTrie,
    report: &mut dyn FnMut(GroundAtom),
) -> Result<()> {
    let mut bindings: Bindings = vec![None; clause.var_count];
    walk(clause, 0, &mut bindings, index, trie, report)
}

fn resolve(term: &EvalTerm, bindings: &Bindings) -> Option<ConstId> {
    match term {
        EvalTerm::Const(c) => Some(*c),
        EvalTerm::Var(v) => bindings[*v],
    }
}

fn resolve_atom(atom: &EvalAtom, bindings: &Bindings) -> Option<GroundAtom> {
    let args: Option<Vec<ConstId>> = atom.terms.iter().map(|t| resolve(t, bindings)).collect();
    args.map(|args| GroundAtom::new(atom.pred, args))
}

fn walk(
    clause: &AnnotatedClause,
    position: usize,
    bindings: &mut Bindings,
    index: &FactIndex,
    trie: &RedundancyTrie,
    report: &mut dyn FnMut(GroundAtom),
) -> Result<()> {
    let Some(premise) = clause.body.get(position) else {
        let head = resolve_atom(&clause.head, bindings).ok_or_else(|| {
            Error::Invariant("head variable unbound after body evaluation".into())
        })?;
        if trie.add_fact(&head) {
            report(head);
        }
        return Ok(());
    };

    match premise {
        EvalPremise::Positive(atom) => {
            let pattern: Vec<Option<ConstId>> =
                atom.terms.iter().map(|t| resolve(t, bindings)).collect();
            for row in index.lookup(atom.pred, &pattern) {
                let mut touched: Vec<usize> = Vec::new();
                let mut compatible = true;
                for (term, constant) in atom.terms.iter().zip(row.args.iter()) {
                    if let EvalTerm::Var(v) = term {
                        match bindings[*v] {
                            Some(bound) => {
                                if bound != *constant {
                                    compatible = false;
                                    break;
                                }
                            }
                            None => {
                                bindings[*v] = Some(*constant);
                                touched.push(*v);
                            }
                        }
                    }
                }
                if compatible {
                    walk(clause, position + 1, bindings, index, trie, report)?;
                }
                for v in touched {
                    bindings[v] = None;
                }
            }
            Ok(())
        }
        EvalPremise::Negative(atom) => {
            // The annotator placed this after its variables were bound
            match resolve_atom(atom, bindings) {
                Some(ground) if !index.contains(&ground) => {
                    walk(clause, position + 1, bindings, index, trie, report)
                }
                _ => Ok(()),
            }
        }
        EvalPremise::Unify(left, right) => {
            match (resolve(left, bindings), resolve(right, bindings)) {
                (Some(l), Some(r)) => {
                    if l == r {
                        walk(clause, position + 1, bindings, index, trie, report)
                    } else {
                        Ok(())
                    }
                }
                (Some(c), None) | (None, Some(c)) => {
                    // Exactly one side is an unbound variable: bind it
                    let var = match (resolve(left, bindings), left, right) {
                        (None, EvalTerm::Var(v), _) => *v,
                        (_, _, EvalTerm::Var(v)) => *v,
                        _ => return Ok(()),
                    };
                    bindings[var] = Some(c);
                    walk(clause, position + 1, bindings, index, trie, report)?;
                    bindings[var] = None;
                    Ok(())
                }
                // Two unbound variables cannot occur in validated programs
                (None, None) => Ok(()),
            }
        }
        EvalPremise::Disunify(left, right) => {
            // Both sides must be ground; delayed disunification is not
            // supported and fails the evaluation path.
            match (resolve(left, bindings), resolve(right, bindings)) {
                (Some(l), Some(r)) if l != r => {
                    walk(clause, position + 1, bindings, index, trie, report)
                }
                _ => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{annotate, AnnotatedProgram};
    use crate::interner::Interner;
    use crate::parser::parse_program;
    use crate::validation::Validator;
    use std::sync::Arc;

    fn setup(source: &str) -> (AnnotatedProgram, Arc<Interner>) {
        let interner = Arc::new(Interner::new());
        let program = parse_program(source, &interner).expect("parse");
        let validated = Validator::new(interner.clone())
            .validate(&program.clauses)
            .expect("validate");
        (annotate(&validated), interner)
    }

    #[test]
    fn test_one_shot_projects_edb() {
        let (program, interner) = setup(
            "edge(a, b). edge(b, c). \
             tc(X, Y) :- edge(X, Y).",
        );

        let index = FactIndex::new();
        let trie = RedundancyTrie::new();
        for fact in &program.strata[0].facts {
            index.add(fact);
        }

        let mut derived = Vec::new();
        for clause in &program.strata[0].one_shot {
            evaluate_one_shot(clause, &index, &trie, &mut |f| derived.push(f)).unwrap();
        }

        let tc = interner.predicate("tc", 2);
        assert_eq!(derived.len(), 2);
        assert!(derived.iter().all(|f| f.pred == tc));
    }

    #[test]
    fn test_delta_joins_against_index() {
        let (program, interner) = setup(
            "edge(a, b). edge(b, c). \
             tc(X, Y) :- edge(X, Y). \
             tc(X, Y) :- edge(X, Z), tc(Z, Y).",
        );

        let index = FactIndex::new();
        let trie = RedundancyTrie::new();
        for fact in &program.strata[0].facts {
            index.add(fact);
        }

        let tc = interner.predicate("tc", 2);
        let b = interner.constant("b");
        let c = interner.constant("c");

        // Pretend tc(b, c) was just derived; the recursive rule must join
        // it with edge(a, b) to produce tc(a, c).
        let candidate = GroundAtom::new(tc, vec![b, c]);
        let mut derived = Vec::new();
        for clause in &program.strata[0].rules_by_delta[&tc] {
            evaluate_delta(clause, &candidate, &index, &trie, &mut |f| derived.push(f)).unwrap();
        }

        let a = interner.constant("a");
        assert_eq!(derived, vec![GroundAtom::new(tc, vec![a, c])]);
    }

    #[test]
    fn test_redundancy_suppresses_rederivation() {
        let (program, interner) = setup(
            "edge(a, b). \
             tc(X, Y) :- edge(X, Y).",
        );

        let index = FactIndex::new();
        let trie = RedundancyTrie::new();
        for fact in &program.strata[0].facts {
            index.add(fact);
        }

        let mut count = 0;
        for _ in 0..2 {
            for clause in &program.strata[0].one_shot {
                evaluate_one_shot(clause, &index, &trie, &mut |_| count += 1).unwrap();
            }
        }
        let _ = interner;
        assert_eq!(count, 1);
    }

    #[test]
    fn test_negation_checks_absence() {
        let (program, interner) = setup(
            "node(a). node(b). edge(a, b). \
             reach(X) :- edge(a, X). \
             isolated(X) :- node(X), not reach(X).",
        );

        let index = FactIndex::new();
        let trie = RedundancyTrie::new();
        // Stratum 0 saturated by hand: reach(b)
        for fact in &program.strata[0].facts {
            index.add(fact);
        }
        let reach = interner.predicate("reach", 1);
        let b = interner.constant("b");
        index.add(&GroundAtom::new(reach, vec![b]));

        let mut derived = Vec::new();
        for clause in &program.strata[1].one_shot {
            evaluate_one_shot(clause, &index, &trie, &mut |f| derived.push(f)).unwrap();
        }

        let isolated = interner.predicate("isolated", 1);
        let a = interner.constant("a");
        assert_eq!(derived, vec![GroundAtom::new(isolated, vec![a])]);
    }

    #[test]
    fn test_disunification_requires_distinct() {
        let (program, interner) = setup(
            "edge(a, a). edge(a, b). \
             distinct(X, Y) :- edge(X, Y), X != Y.",
        );

        let index = FactIndex::new();
        let trie = RedundancyTrie::new();
        for fact in &program.strata[0].facts {
            index.add(fact);
        }

        let mut derived = Vec::new();
        for clause in &program.strata[0].one_shot {
            evaluate_one_shot(clause, &index, &trie, &mut |f| derived.push(f)).unwrap();
        }

        let distinct = interner.predicate("distinct", 2);
        let a = interner.constant("a");
        let b = interner.constant("b");
        assert_eq!(derived, vec![GroundAtom::new(distinct, vec![a, b])]);
    }
}
