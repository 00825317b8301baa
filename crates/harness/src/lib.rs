// ==============================================================================
// Completion conformance harness
// ==============================================================================
//
// Drives a completion service through the cases found in a directory of
// annotated fixtures and checks every returned candidate list against its
// annotation. The service is reached only through the `CompletionService`
// trait, so the same suite runs against a real language server or an
// in-memory script.
//
// Scanner → extractor (`fixture_parser`) → engine → validator, one case at a
// time, with the runner collecting outcomes for a `Reporter`.

pub mod engine;
#[cfg(test)]
mod pbt;
pub mod runner;
pub mod scan;
pub mod service;
pub mod test_util;
pub mod validate;

pub use engine::{run_case, CaseFailure, Verdict};
pub use runner::{Check, CheckKind, Outcome, Reporter, RunSummary, Suite};
pub use scan::{scan_fixtures, Fixture, FixtureError, ScanError, ScanOutcome, SkipReason, Skipped};
pub use service::{
    Candidate, CompileOptions, CompletionReply, CompletionRequest, CompletionService, ServiceError,
};
pub use validate::{validate, ValidationError};
