//! End-to-end scenarios for the Datalog engine
//!
//! Each scenario runs against every engine variant; the variants must agree
//! on every query (engine equivalence).

use std::collections::BTreeSet;
use strata_core::{Engine, EngineConfig, EngineVariant, Error, ValidationErrorKind};

const VARIANTS: [EngineVariant; 4] = [
    EngineVariant::SemiNaiveSerial,
    EngineVariant::SemiNaiveConcurrent,
    EngineVariant::ChunkedConcurrent,
    EngineVariant::MagicSetOverConcurrent,
];

/// Load a program and answer its embedded queries, as rendered text
fn answers(variant: EngineVariant, source: &str) -> Vec<BTreeSet<String>> {
    let mut engine = Engine::new(EngineConfig {
        variant,
        ..EngineConfig::default()
    });
    let queries = engine.load(source).expect("program loads");
    queries
        .iter()
        .map(|query| {
            engine
                .query(query)
                .expect("query succeeds")
                .iter()
                .map(|fact| fact.to_text(engine.interner()))
                .collect()
        })
        .collect()
}

fn expect(atoms: &[&str]) -> BTreeSet<String> {
    atoms.iter().map(|s| s.to_string()).collect()
}

fn assert_all_variants(source: &str, expected: Vec<BTreeSet<String>>) {
    for variant in VARIANTS {
        assert_eq!(
            answers(variant, source),
            expected,
            "variant {:?} disagrees",
            variant
        );
    }
}

const TC_BASE: &str = "tc(X, Y) :- edge(X, Y). \
                       tc(X, Y) :- edge(X, Z), tc(Z, Y). \
                       edge(a, b). edge(b, c). edge(c, c). edge(c, d).";

#[test]
fn test_transitive_closure_with_cycle() {
    let source = format!("{} cycle(X) :- X = Y, tc(X, Y). cycle(X)?", TC_BASE);
    assert_all_variants(&source, vec![expect(&["cycle(c)"])]);
}

#[test]
fn test_begins_at_constant() {
    let source = format!(
        "{} beginsAtC(X, Y) :- tc(X, Y), c = X. beginsAtC(X, Y)?",
        TC_BASE
    );
    assert_all_variants(
        &source,
        vec![expect(&["beginsAtC(c, c)", "beginsAtC(c, d)"])],
    );
}

#[test]
fn test_disunification_noncycle() {
    let source = format!(
        "{} noncycle(X, Y) :- X != Y, tc(X, Y). noncycle(X, Y)?",
        TC_BASE
    );
    assert_all_variants(
        &source,
        vec![expect(&[
            "noncycle(a, b)",
            "noncycle(a, c)",
            "noncycle(a, d)",
            "noncycle(b, c)",
            "noncycle(b, d)",
            "noncycle(c, d)",
        ])],
    );
}

#[test]
fn test_bare_unification_rules() {
    let source = "p(X, b) :- X = a. \
                  p(b, Y) :- Y = a. \
                  p(X, Y) :- X = c, Y = d. \
                  p(X, X) :- X = c. \
                  p(X, Y) :- X = d, Y = X. \
                  p(X, Y) :- X = Y, X = e. \
                  p(X, Y)?";
    assert_all_variants(
        source,
        vec![expect(&[
            "p(a, b)",
            "p(b, a)",
            "p(c, d)",
            "p(c, c)",
            "p(d, d)",
            "p(e, e)",
        ])],
    );
}

#[test]
fn test_impossible_bodies_yield_empty_sets() {
    assert_all_variants("p :- a = b. p?", vec![expect(&[])]);
    assert_all_variants("p :- a != a. p?", vec![expect(&[])]);
}

#[test]
fn test_anonymous_disunification_rejected() {
    for variant in VARIANTS {
        let mut engine = Engine::with_variant(variant);
        let err = engine.load("p(X) :- q(X), Y != _. q(a).").unwrap_err();
        match err {
            Error::Validation(v) => assert!(
                v.kind == ValidationErrorKind::UnsafeVariable
                    || v.kind == ValidationErrorKind::DisallowedFeature,
                "unexpected kind {:?}",
                v.kind
            ),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}

#[test]
fn test_stratified_negation_equivalence() {
    // Two strata: reachability below, its complement above
    let source = "node(a). node(b). node(c). node(d). \
                  edge(a, b). edge(b, c). \
                  reach(X) :- edge(a, X). \
                  reach(Y) :- reach(X), edge(X, Y). \
                  unreached(X) :- node(X), not reach(X). \
                  unreached(X)? reach(X)?";
    assert_all_variants(
        source,
        vec![
            expect(&["unreached(a)", "unreached(d)"]),
            expect(&["reach(b)", "reach(c)"]),
        ],
    );
}

#[test]
fn test_bound_query_equivalence() {
    // A bound first argument exercises the magic seed path
    let mut expected: Option<BTreeSet<String>> = None;
    for variant in VARIANTS {
        let mut engine = Engine::with_variant(variant);
        let queries = engine
            .load(&format!("{} tc(b, X)?", TC_BASE))
            .expect("program loads");
        let result: BTreeSet<String> = engine
            .query(&queries[0])
            .expect("query succeeds")
            .iter()
            .map(|f| f.to_text(engine.interner()))
            .collect();
        match &expected {
            Some(e) => assert_eq!(e, &result, "variant {:?} disagrees", variant),
            None => expected = Some(result),
        }
    }
    assert_eq!(expected, Some(expect(&["tc(b, c)", "tc(b, d)"])));
}

#[test]
fn test_mixed_negation_and_disunification() {
    let source = "emp(a, sales). emp(b, sales). emp(c, eng). \
                  mgr(a). \
                  peer(X, Y) :- emp(X, D), emp(Y, D), X != Y. \
                  nonmgr_peer(X, Y) :- peer(X, Y), not mgr(Y). \
                  nonmgr_peer(X, Y)?";
    assert_all_variants(source, vec![expect(&["nonmgr_peer(a, b)"])]);
}

#[test]
fn test_chunk_size_does_not_change_results() {
    for chunk_size in [1, 2, 7, 256] {
        let mut engine = Engine::new(EngineConfig {
            variant: EngineVariant::ChunkedConcurrent,
            chunk_size,
            ..EngineConfig::default()
        });
        let queries = engine
            .load(&format!("{} tc(X, Y)?", TC_BASE))
            .expect("program loads");
        let result = engine.query(&queries[0]).expect("query succeeds");
        assert_eq!(result.len(), 7, "chunk size {}", chunk_size);
    }
}

#[test]
fn test_larger_graph_concurrent_saturation() {
    // A denser graph to give the workers real contention
    let mut source = String::new();
    for i in 0..30 {
        source.push_str(&format!("edge(n{}, n{}). ", i, (i + 1) % 30));
        source.push_str(&format!("edge(n{}, n{}). ", i, (i + 7) % 30));
    }
    source.push_str(
        "tc(X, Y) :- edge(X, Y). \
         tc(X, Y) :- edge(X, Z), tc(Z, Y). \
         tc(X, Y)?",
    );

    // Every node reaches every node in this strongly connected graph
    let expected_len = 30 * 30;
    for variant in VARIANTS {
        let mut engine = Engine::with_variant(variant);
        let queries = engine.load(&source).expect("program loads");
        let result = engine.query(&queries[0]).expect("query succeeds");
        assert_eq!(result.len(), expected_len, "variant {:?}", variant);
    }
}
