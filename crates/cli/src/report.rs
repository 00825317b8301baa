// ==============================================================================
// Console reporting
// ==============================================================================
//
// One line per check while the suite runs, then every failure rendered as a
// miette diagnostic against the fixture text, then a summary line.

use std::io::Write;
use std::path::Path;

use fixture_parser::{ExtractError, TestCase};
use harness::{Check, CheckKind, FixtureError, Outcome, Reporter, RunSummary, Suite};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

/// A failed check, pointing at the annotated line.
#[derive(Debug, Error, Diagnostic)]
#[error("{name}: {message}")]
#[diagnostic(code(cli::check_failed))]
pub struct FailedCheck {
    pub name: String,
    pub message: String,
    #[source_code]
    pub fixture: NamedSource<String>,
    #[label("{label}")]
    pub span: Option<SourceSpan>,
    pub label: &'static str,
    #[help]
    pub help: Option<String>,
}

// Annotation errors keep their help on the wrapped cause.
fn help_of(diagnostic: &dyn Diagnostic) -> Option<String> {
    diagnostic
        .help()
        .map(|help| help.to_string())
        .or_else(|| diagnostic.diagnostic_source().and_then(help_of))
}

fn fixture_source(path: &Path, text: String) -> NamedSource<String> {
    NamedSource::new(path.display().to_string(), text)
}

fn case_report(check: &Check, case: &TestCase, error: &dyn Diagnostic) -> Report {
    Report::new(FailedCheck {
        name: check.name.clone(),
        message: error.to_string(),
        fixture: fixture_source(&case.source, case.full_text.to_string()),
        span: Some(SourceSpan::from((case.line_start, case.line_text.len()))),
        label: "completion requested on this line",
        help: help_of(error),
    })
}

fn broken_fixture_report(check: &Check, error: &FixtureError) -> Report {
    let span = match error {
        FixtureError::Annotation(ExtractError { span, .. }) => Some(*span),
        FixtureError::Read { .. } => None,
    };
    // An unreadable fixture has no span, so empty source text is fine.
    let text = std::fs::read_to_string(&check.fixture).unwrap_or_default();
    Report::new(FailedCheck {
        name: check.name.clone(),
        message: error.to_string(),
        fixture: fixture_source(&check.fixture, text),
        span,
        label: "this annotation",
        help: help_of(error),
    })
}

/// Build the diagnostic for a check that did not pass.
pub fn failure_report(check: &Check, outcome: &Outcome) -> Option<Report> {
    match (&check.kind, outcome) {
        (_, Outcome::Passed) => None,
        (CheckKind::Case(case), Outcome::Failed(failure)) => Some(case_report(check, case, failure)),
        (CheckKind::Case(case), Outcome::Errored(err)) => Some(case_report(check, case, err)),
        (CheckKind::BrokenFixture(err), _) => Some(broken_fixture_report(check, err)),
        (CheckKind::Case(_), Outcome::Broken) => None,
    }
}

pub fn summary_line(summary: &RunSummary) -> String {
    format!(
        "test result: {}. {} passed; {} failed; {} errored; {} broken; {} skipped",
        if summary.is_success() { "ok" } else { "FAILED" },
        summary.passed,
        summary.failed,
        summary.errored,
        summary.broken,
        summary.skipped,
    )
}

/// Prints progress to `out` and failures to stderr.
pub struct ConsoleReporter<W: Write> {
    out: W,
    failures: Vec<Report>,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        ConsoleReporter {
            out,
            failures: Vec::new(),
        }
    }

    pub fn failures(&self) -> &[Report] {
        &self.failures
    }
}

// Console write errors are not worth failing the run over.
impl<W: Write> Reporter for ConsoleReporter<W> {
    fn suite_started(&mut self, suite: &Suite) {
        let _ = writeln!(
            self.out,
            "running {} checks from {}",
            suite.checks.len(),
            suite.dir.display()
        );
        if suite.scan.isolated {
            let _ = writeln!(self.out, "note: an ONLY fixture is restricting this run");
        }
    }

    fn check_finished(&mut self, check: &Check, outcome: &Outcome) {
        let _ = writeln!(self.out, "{} ... {}", check.name, outcome.label());
        if let Some(report) = failure_report(check, outcome) {
            self.failures.push(report);
        }
    }

    fn suite_finished(&mut self, summary: &RunSummary) {
        for report in &self.failures {
            eprintln!("{report:?}");
        }
        let _ = writeln!(self.out, "\n{}", summary_line(summary));
    }
}
