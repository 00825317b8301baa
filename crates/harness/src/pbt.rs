// ==============================================================================
// Property-based tests for the validator
// ==============================================================================
//
// Candidate lists are built from the annotation itself: expected symbols in
// order, interleaved with noise that can never collide with a symbol. Such a
// list must pass; swapping two expected symbols, dropping one, or appending an
// unwanted one must fail with the matching error.

use std::path::Path;

use fixture_parser::{extract_cases, Dialect, TestCase};
use proptest::prelude::*;

use crate::service::Candidate;
use crate::validate::{validate, ValidationError};

// Lowercase symbols, uppercase noise.
fn arb_symbols() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,4}", 1..6).prop_map(|set| set.into_iter().collect())
}

fn arb_noise() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Z]{1,4}", 0..8)
}

fn case_for(expected: &[String], unwanted: &[String]) -> TestCase {
    let tokens: Vec<String> = expected
        .iter()
        .cloned()
        .chain(unwanted.iter().map(|s| format!("!{s}")))
        .collect();
    let text = format!("obj. // {}\n", tokens.join("; "));
    extract_cases(Path::new("pbt.ts"), &text, Dialect::TypeScript)
        .remove(0)
        .expect("generated symbols never conflict")
}

/// Spread `expected` over `noise`, keeping the relative order of both.
fn interleave(expected: &[String], noise: &[String], seed: usize) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut noise = noise.iter();
    for (i, symbol) in expected.iter().enumerate() {
        for _ in 0..((seed + i) % 3) {
            if let Some(n) = noise.next() {
                out.push(Candidate::new(n.as_str()));
            }
        }
        out.push(Candidate::new(symbol.as_str()));
    }
    out.extend(noise.map(|n| Candidate::new(n.as_str())));
    out
}

proptest! {
    #[test]
    fn ordered_subsequence_passes(
        symbols in arb_symbols(),
        noise in arb_noise(),
        seed in 0usize..3,
    ) {
        let case = case_for(&symbols, &["zzzzz".to_string()]);
        let candidates = interleave(&symbols, &noise, seed);
        prop_assert_eq!(validate(&case, &candidates), Ok(()));
    }

    #[test]
    fn swapped_symbols_fail(
        symbols in arb_symbols().prop_filter("need two", |s| s.len() >= 2),
        noise in arb_noise(),
        seed in 0usize..3,
    ) {
        let case = case_for(&symbols, &[]);
        let mut shuffled = symbols.clone();
        let last = shuffled.len() - 1;
        shuffled.swap(0, last);
        let candidates = interleave(&shuffled, &noise, seed);
        let is_out_of_order = matches!(
            validate(&case, &candidates),
            Err(ValidationError::OutOfOrder { .. })
        );
        prop_assert!(is_out_of_order);
    }

    #[test]
    fn dropped_symbol_is_missing(
        symbols in arb_symbols(),
        noise in arb_noise(),
        pick in any::<prop::sample::Index>(),
    ) {
        let case = case_for(&symbols, &[]);
        let dropped = pick.index(symbols.len());
        let kept: Vec<String> = symbols
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != dropped)
            .map(|(_, s)| s.clone())
            .collect();
        let candidates = interleave(&kept, &noise, 0);
        match validate(&case, &candidates) {
            Err(ValidationError::Missing { symbol, received, .. }) => {
                prop_assert_eq!(symbol.as_str(), symbols[dropped].as_str());
                prop_assert_eq!(received, candidates.len());
            }
            other => prop_assert!(false, "expected Missing, got {:?}", other),
        }
    }

    #[test]
    fn unwanted_anywhere_fails(
        symbols in arb_symbols(),
        noise in arb_noise(),
        at in any::<prop::sample::Index>(),
    ) {
        let case = case_for(&symbols, &["zzzzz".to_string()]);
        let mut candidates = interleave(&symbols, &noise, 1);
        let index = at.index(candidates.len() + 1);
        candidates.insert(index, Candidate::new("zzzzz"));
        let failed_as_unwanted = matches!(
            validate(&case, &candidates),
            Err(ValidationError::Unwanted { .. })
        );
        prop_assert!(failed_as_unwanted);
    }
}
