// ==============================================================================
// Candidate list validation
// ==============================================================================
//
// Expected symbols must all be present, and each must be found (first match)
// at a strictly greater index than the expected symbol before it. They don't
// have to be adjacent or at the top of the list. Unwanted symbols must not
// appear anywhere. The first violated condition is reported.

use fixture_parser::TestCase;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::service::Candidate;

/// Below this many candidates, a "missing symbol" failure lists what was
/// actually returned.
const LIST_ACTUAL_BELOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ValidationError {
    #[error(
        "did not receive symbol '{symbol}' for '{line}'; instead we got {received} other symbols{}",
        listing(.actual)
    )]
    #[diagnostic(code(harness::validate::missing))]
    Missing {
        symbol: SmolStr,
        line: SmolStr,
        received: usize,
        /// Only kept for short candidate lists.
        actual: Option<Vec<SmolStr>>,
    },

    #[error(
        "found symbol '{symbol}', but in the wrong order at index: {index}. Expected it after: {previous}"
    )]
    #[diagnostic(
        code(harness::validate::out_of_order),
        help("'{previous}' was found at index {previous_index}")
    )]
    OutOfOrder {
        symbol: SmolStr,
        index: usize,
        previous: SmolStr,
        previous_index: usize,
    },

    #[error("received explicitly unwanted symbol '{symbol}' for '{line}'")]
    #[diagnostic(code(harness::validate::unwanted))]
    Unwanted {
        symbol: SmolStr,
        line: SmolStr,
        index: usize,
    },
}

fn listing(actual: &Option<Vec<SmolStr>>) -> String {
    match actual {
        Some(names) => format!(": {}", names.join(", ")),
        None => ".".to_string(),
    }
}

/// Check a returned candidate list against one case's expectations.
pub fn validate(case: &TestCase, candidates: &[Candidate]) -> Result<(), ValidationError> {
    let names: Vec<&str> = candidates
        .iter()
        .map(|candidate| candidate.name_for(case.dialect))
        .collect();
    let position = |symbol: &str| names.iter().position(|name| *name == symbol);

    let mut last_found: Option<usize> = None;
    for symbol in &case.expected {
        let Some(index) = position(symbol) else {
            return Err(ValidationError::Missing {
                symbol: symbol.clone(),
                line: case.line_text.clone(),
                received: names.len(),
                actual: (names.len() < LIST_ACTUAL_BELOW)
                    .then(|| names.iter().map(|name| SmolStr::new(name)).collect()),
            });
        };

        if let Some(previous_index) = last_found {
            if index <= previous_index {
                return Err(ValidationError::OutOfOrder {
                    symbol: symbol.clone(),
                    index,
                    previous: names[previous_index].into(),
                    previous_index,
                });
            }
        }
        last_found = Some(index);
    }

    for symbol in &case.unwanted {
        if let Some(index) = position(symbol) {
            return Err(ValidationError::Unwanted {
                symbol: symbol.clone(),
                line: case.line_text.clone(),
                index,
            });
        }
    }

    Ok(())
}
