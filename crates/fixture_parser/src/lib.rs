// ==============================================================================
// Completion fixture parsing
// ==============================================================================
//
// Turns annotated source files into completion test cases. A fixture is an
// ordinary TypeScript or Python file where some lines end in a comment that
// encodes what a completion request at that line must (and must not) return:
//
//   let x = obj.   // obj.a; obj.b; !obj.secret
//
// The pieces are kept separate so each can be tested on its own:
// - `dialect`: extension, comment marker and synthetic file name per syntax
// - `cursor`: where on the annotated line completion is requested
// - `collect`: payload grammar (`annotation.pest`) → expected/unwanted symbols
// - `extract`: line scanning and offset bookkeeping over a whole fixture

mod collect;
pub mod cursor;
pub mod dialect;
pub mod extract;
#[cfg(test)]
mod pbt;

use std::collections::BTreeSet;

use miette::Diagnostic;
use pest::{iterators::Pairs, Parser};
use pest_derive::Parser;
use smol_str::SmolStr;
use thiserror::Error;

pub use cursor::resolve_cursor;
pub use dialect::Dialect;
pub use extract::{extract_cases, scan_line, ExtractError, LineScan, TestCase};

#[derive(Parser)]
#[grammar = "annotation.pest"]
pub struct AnnotationParser;

// pest errors are large; boxed to keep `Result`s small.
pub type ParseError = Box<pest::error::Error<Rule>>;

pub fn parse_payload_text(source: &str) -> Result<Pairs<'_, Rule>, ParseError> {
    Ok(AnnotationParser::parse(Rule::payload, source)?)
}

/// What a single annotation asks of the completion list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    /// Symbols that must be present, in at least this relative order.
    pub expected: Vec<SmolStr>,
    /// Symbols that must not be present anywhere.
    pub unwanted: BTreeSet<SmolStr>,
}

impl Expectations {
    pub fn is_empty(&self) -> bool {
        self.expected.is_empty() && self.unwanted.is_empty()
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum AnnotationError {
    /// The grammar accepts every payload today; kept so a stricter grammar
    /// has somewhere to report to.
    #[error("malformed annotation payload: {0}")]
    #[diagnostic(code(fixture::annotation::syntax))]
    Syntax(#[from] ParseError),

    #[error("symbol `{symbol}` is both expected and forbidden")]
    #[diagnostic(
        code(fixture::annotation::conflict),
        help("drop either `{symbol}` or `!{symbol}` from the annotation")
    )]
    Conflict { symbol: SmolStr },
}

/// Decode an annotation payload (the trimmed text after the comment marker).
pub fn parse_expectations(payload: &str) -> Result<Expectations, AnnotationError> {
    let pairs = parse_payload_text(payload)?;
    collect::collect_expectations(pairs)
}
