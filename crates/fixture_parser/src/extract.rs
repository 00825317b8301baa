// ==============================================================================
// Fixture → test case extraction
// ==============================================================================
//
// One test case per line that contains the dialect's comment marker. The line
// is cut at the first marker: the code before it positions the cursor, the
// payload after it lists the expectations.
//
// Offsets are byte offsets into the fixture text. Lines are split on `\n` and
// each line start is the sum of `line.len() + 1` over every preceding line, so
// a `\r` before the newline simply counts as part of its line.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::{Diagnostic, SourceSpan};
use smol_str::SmolStr;
use thiserror::Error;

use crate::{parse_expectations, resolve_cursor, AnnotationError, Dialect};

/// Result of scanning a single line for an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineScan<'a> {
    Annotated {
        /// Everything before the marker.
        code: &'a str,
        /// Everything after the marker, trimmed.
        payload: &'a str,
    },
    Plain,
}

pub fn scan_line(line: &str, dialect: Dialect) -> LineScan<'_> {
    let marker = dialect.marker();
    match line.find(marker) {
        Some(idx) => LineScan::Annotated {
            code: &line[..idx],
            payload: line[idx + marker.len()..].trim(),
        },
        None => LineScan::Plain,
    }
}

/// A single completion check derived from one annotated fixture line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub source: PathBuf,
    /// Whole fixture text, shared by every case of the fixture.
    pub full_text: Arc<str>,
    /// The annotated line up to (not including) the marker.
    pub line_text: SmolStr,
    /// 1-based.
    pub line_number: usize,
    pub line_start: usize,
    pub dialect: Dialect,
    pub cursor: usize,
    pub expected: Vec<SmolStr>,
    pub unwanted: BTreeSet<SmolStr>,
}

impl TestCase {
    // Partial-word completion is never modelled: the word range collapses
    // onto the cursor.
    pub fn word_start(&self) -> usize {
        self.cursor
    }

    pub fn word_end(&self) -> usize {
        self.cursor
    }

    pub fn is_alternate_dialect(&self) -> bool {
        self.dialect.is_alternate()
    }

    /// Name the check is registered under.
    pub fn name(&self) -> String {
        format!("get completions {}:{}", self.source.display(), self.cursor)
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("{}:{line}: {kind}", .source_path.display())]
#[diagnostic(code(fixture::annotation))]
pub struct ExtractError {
    pub source_path: PathBuf,
    pub line: usize,
    #[label("this annotation")]
    pub span: SourceSpan,
    #[diagnostic_source]
    pub kind: AnnotationError,
}

/// Extract one entry per annotated line, in line order. A line whose payload
/// can't be decoded yields an error in its slot; the other lines are still
/// extracted.
pub fn extract_cases(
    source: &Path,
    text: &str,
    dialect: Dialect,
) -> Vec<Result<TestCase, ExtractError>> {
    let full_text: Arc<str> = Arc::from(text);
    let mut cases = Vec::new();
    let mut line_start = 0usize;

    for (idx, line) in text.split('\n').enumerate() {
        if let LineScan::Annotated { code, payload } = scan_line(line, dialect) {
            let expectations = match parse_expectations(payload) {
                Ok(expectations) => expectations,
                Err(kind) => {
                    cases.push(Err(ExtractError {
                        source_path: source.to_path_buf(),
                        line: idx + 1,
                        span: SourceSpan::from((line_start + code.len(), line.len() - code.len())),
                        kind,
                    }));
                    line_start += line.len() + 1;
                    continue;
                }
            };

            let relative = resolve_cursor(code).unwrap_or_else(|| {
                log::warn!(
                    "{}:{}: no code before the annotation marker; cursor placed at line start",
                    source.display(),
                    idx + 1
                );
                0
            });

            cases.push(Ok(TestCase {
                source: source.to_path_buf(),
                full_text: full_text.clone(),
                line_text: code.into(),
                line_number: idx + 1,
                line_start,
                dialect,
                cursor: line_start + relative,
                expected: expectations.expected,
                unwanted: expectations.unwanted,
            }));
        }

        line_start += line.len() + 1;
    }

    log::debug!("{}: {} annotated line(s)", source.display(), cases.len());
    cases
}
