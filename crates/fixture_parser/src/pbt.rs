// ==============================================================================
// Property-based tests for extraction offsets
// ==============================================================================
//
// Generates fixtures mixing plain code lines and annotated lines, then checks
// the offset bookkeeping against the text itself rather than against a second
// implementation of the same arithmetic.

use std::path::Path;

use proptest::prelude::*;

use crate::{
    extract_cases, parse_expectations, parse_payload_text, resolve_cursor, AnnotationError,
    Dialect,
};

fn arb_code() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(\\.[a-z]{1,6}){0,2}\\.? {0,3}"
}

fn arb_plain_line() -> impl Strategy<Value = String> {
    "[a-z =();{}]{0,20}"
}

fn arb_symbol() -> impl Strategy<Value = String> {
    "[a-z]{1,5}(\\.[a-z]{1,5})?"
}

fn arb_payload() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    (
        prop::collection::vec(arb_symbol(), 0..4),
        prop::collection::vec(arb_symbol().prop_map(|s| format!("!{s}")), 0..3),
    )
}

/// A fixture line: either plain code or `code <marker> payload`.
fn arb_line(dialect: Dialect) -> impl Strategy<Value = String> {
    prop_oneof![
        arb_plain_line(),
        (arb_code(), arb_payload()).prop_map(move |(code, (expected, unwanted))| {
            let tokens: Vec<String> = expected.into_iter().chain(unwanted).collect();
            format!("{code}{} {}", dialect.marker(), tokens.join("; "))
        }),
    ]
}

fn arb_fixture() -> impl Strategy<Value = (Dialect, String)> {
    prop_oneof![Just(Dialect::TypeScript), Just(Dialect::Python)].prop_flat_map(|dialect| {
        prop::collection::vec(arb_line(dialect), 0..12)
            .prop_map(move |lines| (dialect, lines.join("\n")))
    })
}

proptest! {
    #[test]
    fn every_payload_is_grammatical(payload in "\\PC{0,40}") {
        prop_assert!(parse_payload_text(&payload).is_ok());
        prop_assert!(!matches!(
            parse_expectations(&payload),
            Err(AnnotationError::Syntax(_))
        ));
    }

    #[test]
    fn cursor_stays_within_line(code in "[ a-z.()]{0,16}") {
        if let Some(offset) = resolve_cursor(&code) {
            prop_assert!(offset <= code.len());
            prop_assert!(code.is_char_boundary(offset));
        } else {
            prop_assert!(code.chars().all(|c| c == ' '));
        }
    }

    #[test]
    fn extracted_offsets_point_into_the_annotated_line((dialect, text) in arb_fixture()) {
        let found = extract_cases(Path::new("pbt"), &text, dialect);

        let marker_lines = text
            .split('\n')
            .filter(|line| line.contains(dialect.marker()))
            .count();
        prop_assert_eq!(found.len(), marker_lines);

        // Generated expected/unwanted sets may overlap; those lines are
        // errors and say nothing about offsets.
        for case in found.iter().filter_map(|found| found.as_ref().ok()) {
            prop_assert_eq!(case.cursor, case.word_start());
            prop_assert_eq!(case.cursor, case.word_end());

            let line = text[case.line_start..].split('\n').next().unwrap_or("");
            prop_assert!(line.starts_with(case.line_text.as_str()));
            prop_assert!(case.cursor >= case.line_start);
            prop_assert!(case.cursor <= case.line_start + case.line_text.len());
            prop_assert!(case.line_start == 0 || text.as_bytes()[case.line_start - 1] == b'\n');
        }
    }
}
