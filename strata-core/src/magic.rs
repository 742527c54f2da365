//! Magic-set program transformation
//!
//! Rewrites a query-and-program pair into an equivalent program whose
//! bottom-up saturation simulates a goal-directed strategy. Adornments are
//! computed with a left-to-right sideways-information-passing walk; each
//! adorned rule is decomposed through supplementary relations carrying
//! exactly the bindings needed downstream, and `input` relations propagate
//! call patterns. All generated predicates live under the reserved `%`
//! prefix, which the validator denies to source programs.
//!
//! Negated body atoms are not adorned: every predicate reachable through a
//! negation keeps its original rules, so its full extent is materialized in
//! a lower stratum before being consulted.

use crate::interner::{Interner, PredId};
use crate::types::{Atom, Clause, Premise, Term};
use crate::validation::{PredKind, ValidatedProgram};
use ahash::AHashSet;
use std::sync::Arc;

/// Per-argument bound/free pattern derived from a call site
pub type Adornment = Vec<bool>;

/// A predicate together with a call-site adornment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AdornedPred {
    pred: PredId,
    adornment: Adornment,
}

/// The rewritten program plus the predicate answering the query
#[derive(Debug, Clone)]
pub struct MagicProgram {
    /// Rewritten clauses, including the input seed fact and EDB facts
    pub clauses: Vec<Clause>,
    /// Adorned predicate holding the query's answers
    pub adorned_query: PredId,
}

/// Rewrite `program` for goal-directed evaluation of `query`
pub fn transform(program: &ValidatedProgram, query: &Atom, interner: &Interner) -> MagicProgram {
    Transformer {
        program,
        interner,
        seen: AHashSet::new(),
        worklist: Vec::new(),
        negation_roots: AHashSet::new(),
        out: Vec::new(),
        rule_counter: 0,
    }
    .run(query)
}

struct Transformer<'a> {
    program: &'a ValidatedProgram,
    interner: &'a Interner,
    seen: AHashSet<AdornedPred>,
    worklist: Vec<AdornedPred>,
    negation_roots: AHashSet<PredId>,
    out: Vec<Clause>,
    rule_counter: usize,
}

impl Transformer<'_> {
    fn run(mut self, query: &Atom) -> MagicProgram {
        let root = AdornedPred {
            pred: query.pred,
            adornment: query.terms.iter().map(|t| !t.is_variable()).collect(),
        };
        let adorned_query = self.adorned_pred(&root);
        self.enqueue(root.clone());

        while let Some(adorned) = self.worklist.pop() {
            self.adorn_predicate(&adorned);
        }

        self.emit_negation_closure();
        self.emit_edb_facts();

        // The single seed: the query's constants flow into the top call
        let seed_args: Vec<Term> = query
            .terms
            .iter()
            .filter(|t| !t.is_variable())
            .cloned()
            .collect();
        let seed = Atom::new(self.input_pred(&root), seed_args);
        self.out.push(Clause::fact(seed));

        tracing::debug!(
            clauses = self.out.len(),
            adorned = self.seen.len(),
            "magic-set transformation complete"
        );

        MagicProgram {
            clauses: self.out,
            adorned_query,
        }
    }

    fn is_idb(&self, pred: PredId) -> bool {
        self.program
            .pred_info(pred)
            .map_or(false, |info| info.kind == PredKind::Idb)
    }

    fn enqueue(&mut self, adorned: AdornedPred) {
        if self.seen.insert(adorned.clone()) {
            self.worklist.push(adorned);
        }
    }

    fn adorned_pred(&self, adorned: &AdornedPred) -> PredId {
        let name = format!(
            "%{}_{}",
            self.interner.pred_name(adorned.pred),
            adornment_text(&adorned.adornment)
        );
        self.interner.predicate(&name, adorned.adornment.len())
    }

    fn input_pred(&self, adorned: &AdornedPred) -> PredId {
        let name = format!(
            "%input_{}_{}",
            self.interner.pred_name(adorned.pred),
            adornment_text(&adorned.adornment)
        );
        let bound = adorned.adornment.iter().filter(|b| **b).count();
        self.interner.predicate(&name, bound)
    }

    fn sup_pred(&self, rule: usize, position: usize, arity: usize) -> PredId {
        self.interner
            .predicate(&format!("%sup_{}_{}", rule, position), arity)
    }

    /// Adorn every clause defining one adorned predicate
    fn adorn_predicate(&mut self, adorned: &AdornedPred) {
        let clauses: Vec<Clause> = self
            .program
            .clauses
            .iter()
            .filter(|c| c.head.pred == adorned.pred)
            .cloned()
            .collect();

        for clause in clauses {
            if clause.is_fact() {
                // Facts of an adorned predicate are filtered by the call
                // pattern: p<a>(args) :- input_p<a>(bound-args).
                let bound_args = bound_terms(&clause.head, &adorned.adornment);
                let input = Atom::new(self.input_pred(adorned), bound_args);
                let head = Atom::new(self.adorned_pred(adorned), clause.head.terms.clone());
                self.out.push(Clause::new(head, vec![Premise::Atom(input)]));
            } else {
                self.adorn_rule(&clause, adorned);
            }
        }
    }

    /// Decompose one rule through supplementary relations
    fn adorn_rule(&mut self, clause: &Clause, adorned: &AdornedPred) {
        let rule_idx = self.rule_counter;
        self.rule_counter += 1;

        let head = &clause.head;
        let mut available: AHashSet<Arc<str>> = head
            .terms
            .iter()
            .zip(adorned.adornment.iter())
            .filter(|(_, bound)| **bound)
            .filter_map(|(t, _)| t.as_variable().cloned())
            .collect();

        let elements = reorder_body(&clause.body, &available);
        let count = elements.len();

        // needed[i]: variables used by elements i.. or by the head
        let head_vars: AHashSet<Arc<str>> = head.variables().into_iter().collect();
        let mut needed: Vec<AHashSet<Arc<str>>> = vec![head_vars; count + 1];
        for i in (0..count).rev() {
            let mut set = needed[i + 1].clone();
            set.extend(elements[i].variables());
            needed[i] = set;
        }

        // Deterministic argument order for supplementary relations
        let mut var_order: Vec<Arc<str>> = Vec::new();
        let push_vars = |vars: Vec<Arc<str>>, order: &mut Vec<Arc<str>>| {
            for var in vars {
                if !order.contains(&var) {
                    order.push(var);
                }
            }
        };
        push_vars(head.variables(), &mut var_order);
        for element in &elements {
            push_vars(element.variables(), &mut var_order);
        }

        // sup0 is elided: the input relation itself carries the head's
        // bound variables.
        let mut prev = Atom::new(
            self.input_pred(adorned),
            bound_terms(head, &adorned.adornment),
        );

        for (i, element) in elements.iter().enumerate() {
            let rewritten = self.rewrite_element(element, &prev, &mut available);

            let sup_vars: Vec<Term> = var_order
                .iter()
                .filter(|v| available.contains(*v) && needed[i + 1].contains(*v))
                .map(|v| Term::Variable(v.clone()))
                .collect();
            let sup = Atom::new(self.sup_pred(rule_idx, i + 1, sup_vars.len()), sup_vars);

            self.out
                .push(Clause::new(sup.clone(), vec![Premise::Atom(prev), rewritten]));
            prev = sup;
        }

        // p<a>(head-args) :- sup_n(vars).
        let adorned_head = Atom::new(self.adorned_pred(adorned), head.terms.clone());
        self.out
            .push(Clause::new(adorned_head, vec![Premise::Atom(prev)]));
    }

    /// Rewrite one body element, emitting input rules for IDB calls
    fn rewrite_element(
        &mut self,
        element: &Premise,
        prev: &Atom,
        available: &mut AHashSet<Arc<str>>,
    ) -> Premise {
        match element {
            Premise::Atom(atom) => {
                if self.is_idb(atom.pred) {
                    let adornment: Adornment = atom
                        .terms
                        .iter()
                        .map(|t| match t.as_variable() {
                            Some(var) => available.contains(var),
                            None => true,
                        })
                        .collect();
                    let called = AdornedPred {
                        pred: atom.pred,
                        adornment,
                    };

                    // Propagate the call: input_q<b>(bound) :- sup_(i-1).
                    let input = Atom::new(
                        self.input_pred(&called),
                        bound_terms(atom, &called.adornment),
                    );
                    self.out
                        .push(Clause::new(input, vec![Premise::Atom(prev.clone())]));
                    self.enqueue(called.clone());

                    available.extend(atom.variables());
                    Premise::Atom(Atom::new(self.adorned_pred(&called), atom.terms.clone()))
                } else {
                    // EDB relations are fully materialized; keep as-is
                    available.extend(atom.variables());
                    element.clone()
                }
            }
            Premise::Negated(atom) => {
                if self.is_idb(atom.pred) {
                    self.negation_roots.insert(atom.pred);
                }
                element.clone()
            }
            Premise::Unify(..) | Premise::Disunify(..) => element.clone(),
        }
    }

    /// Every predicate consulted through negation keeps its original rules
    /// (and, transitively, the rules of everything they read).
    fn emit_negation_closure(&mut self) {
        let program = self.program;
        let mut closure: AHashSet<PredId> = AHashSet::new();
        let mut stack: Vec<PredId> = self.negation_roots.iter().copied().collect();

        while let Some(pred) = stack.pop() {
            if !closure.insert(pred) {
                continue;
            }
            for clause in program.clauses.iter().filter(|c| c.head.pred == pred) {
                for premise in &clause.body {
                    if let Premise::Atom(atom) | Premise::Negated(atom) = premise {
                        if self.is_idb(atom.pred) && !closure.contains(&atom.pred) {
                            stack.push(atom.pred);
                        }
                    }
                }
                self.out.push(clause.clone());
            }
        }
    }

    fn emit_edb_facts(&mut self) {
        let edb_facts: Vec<Clause> = self
            .program
            .clauses
            .iter()
            .filter(|c| c.is_fact() && !self.is_idb(c.head.pred))
            .cloned()
            .collect();
        self.out.extend(edb_facts);
    }
}

fn adornment_text(adornment: &Adornment) -> String {
    adornment.iter().map(|b| if *b { 'b' } else { 'f' }).collect()
}

/// Arguments at bound positions, in order
fn bound_terms(atom: &Atom, adornment: &Adornment) -> Vec<Term> {
    atom.terms
        .iter()
        .zip(adornment.iter())
        .filter(|(_, bound)| **bound)
        .map(|(t, _)| t.clone())
        .collect()
}

/// Order body premises for the left-to-right walk: positives keep their
/// source order; each negation and disunification moves to the earliest
/// point where all its variables are available.
fn reorder_body(body: &[Premise], initially_bound: &AHashSet<Arc<str>>) -> Vec<Premise> {
    let mut bound = initially_bound.clone();
    let mut pending: Vec<Premise> = Vec::new();
    let mut ordered: Vec<Premise> = Vec::new();

    let ready = |premise: &Premise, bound: &AHashSet<Arc<str>>| {
        premise.variables().iter().all(|v| bound.contains(v))
    };

    for premise in body {
        match premise {
            Premise::Atom(atom) => {
                bound.extend(atom.variables());
                ordered.push(premise.clone());
                let mut i = 0;
                while i < pending.len() {
                    if ready(&pending[i], &bound) {
                        ordered.push(pending.remove(i));
                    } else {
                        i += 1;
                    }
                }
            }
            other => {
                if ready(other, &bound) {
                    ordered.push(other.clone());
                } else {
                    pending.push(other.clone());
                }
            }
        }
    }

    // Safety validation guarantees every variable is bound somewhere
    ordered.append(&mut pending);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use crate::interner::Interner;
    use crate::parser::parse_program;
    use crate::saturate::saturate_serial;
    use crate::validation::Validator;
    use ahash::AHashSet;

    fn validated(source: &str) -> (ValidatedProgram, Arc<Interner>) {
        let interner = Arc::new(Interner::new());
        let parsed = parse_program(source, &interner).expect("parse");
        let program = Validator::new(interner.clone())
            .validate(&parsed.clauses)
            .expect("validate");
        (program, interner)
    }

    const TC: &str = "edge(a, b). edge(b, c). edge(c, c). edge(c, d). \
                      tc(X, Y) :- edge(X, Y). \
                      tc(X, Y) :- edge(X, Z), tc(Z, Y).";

    #[test]
    fn test_transform_emits_seed_and_adorned_rules() {
        let (program, interner) = validated(TC);
        let c = interner.constant("c");
        let query = Atom::new(
            interner.predicate("tc", 2),
            vec![Term::constant(c), Term::var("X")],
        );

        let magic = transform(&program, &query, &interner);

        assert_eq!(
            interner.pred_name(magic.adorned_query).as_ref(),
            "%tc_bf"
        );
        // Exactly one seed fact, for the input of the query adornment
        let seeds: Vec<&Clause> = magic
            .clauses
            .iter()
            .filter(|c| c.is_fact() && interner.pred_name(c.head.pred).starts_with("%input"))
            .collect();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].head.to_text(&interner), "%input_tc_bf(c)");
    }

    #[test]
    fn test_transformed_saturation_answers_bound_query() {
        let (program, interner) = validated(TC);
        let c = interner.constant("c");
        let tc = interner.predicate("tc", 2);
        let query = Atom::new(tc, vec![Term::constant(c), Term::var("X")]);

        let magic = transform(&program, &query, &interner);
        let validator = Validator::new(interner.clone());
        let rewritten = validator
            .validate_with_reserved(&magic.clauses, true)
            .expect("rewritten program validates");
        let index = saturate_serial(&annotate(&rewritten)).unwrap();

        let answers: AHashSet<String> = index
            .all(magic.adorned_query)
            .into_iter()
            .map(|f| interner.const_name(f.args[1]).to_string())
            .collect();
        assert_eq!(answers, ["c", "d"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn test_irrelevant_facts_not_materialized() {
        // Two disconnected components; a query bound to the first must not
        // derive closure facts for the second.
        let source = "edge(a, b). edge(b, c). edge(x, y). edge(y, z). \
                      tc(X, Y) :- edge(X, Y). \
                      tc(X, Y) :- edge(X, Z), tc(Z, Y).";
        let (program, interner) = validated(source);
        let a = interner.constant("a");
        let tc = interner.predicate("tc", 2);
        let query = Atom::new(tc, vec![Term::constant(a), Term::var("X")]);

        let magic = transform(&program, &query, &interner);
        let rewritten = Validator::new(interner.clone())
            .validate_with_reserved(&magic.clauses, true)
            .expect("validate");
        let index = saturate_serial(&annotate(&rewritten)).unwrap();

        let x = interner.constant("x");
        let answers = index.all(magic.adorned_query);
        assert!(!answers.is_empty());
        assert!(answers.iter().all(|f| f.args[0] != x));
    }

    #[test]
    fn test_negated_predicate_keeps_original_rules() {
        let source = "node(a). node(b). edge(a, b). \
                      reach(X) :- edge(a, X). \
                      reach(Y) :- reach(X), edge(X, Y). \
                      isolated(X) :- node(X), not reach(X).";
        let (program, interner) = validated(source);
        let isolated = interner.predicate("isolated", 1);
        let query = Atom::new(isolated, vec![Term::var("X")]);

        let magic = transform(&program, &query, &interner);

        // reach appears under negation, so its original rules survive
        let reach = interner.predicate("reach", 1);
        let reach_rules = magic
            .clauses
            .iter()
            .filter(|c| c.head.pred == reach)
            .count();
        assert_eq!(reach_rules, 2);

        let rewritten = Validator::new(interner.clone())
            .validate_with_reserved(&magic.clauses, true)
            .expect("validate");
        let index = saturate_serial(&annotate(&rewritten)).unwrap();
        let answers: AHashSet<String> = index
            .all(magic.adorned_query)
            .into_iter()
            .map(|f| interner.const_name(f.args[0]).to_string())
            .collect();
        assert_eq!(answers, ["a"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn test_idb_facts_filtered_by_call_pattern() {
        let source = "likes(a, b). \
                      likes(X, Y) :- close(X, Y). \
                      close(a, c).";
        let (program, interner) = validated(source);
        let likes = interner.predicate("likes", 2);
        let a = interner.constant("a");
        let query = Atom::new(likes, vec![Term::constant(a), Term::var("Y")]);

        let magic = transform(&program, &query, &interner);
        let rewritten = Validator::new(interner.clone())
            .validate_with_reserved(&magic.clauses, true)
            .expect("validate");
        let index = saturate_serial(&annotate(&rewritten)).unwrap();

        let answers: AHashSet<String> = index
            .all(magic.adorned_query)
            .into_iter()
            .map(|f| interner.const_name(f.args[1]).to_string())
            .collect();
        assert_eq!(answers, ["b", "c"].iter().map(|s| s.to_string()).collect());
    }
}
