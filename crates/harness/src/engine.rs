// ==============================================================================
// Single case execution
// ==============================================================================
//
// Configure the service with the case's fixture as its only file, let it
// prepare, ask for completions at the case's cursor and validate the reply.
// A service-reported operation error fails the case; transport failures are
// returned as errors so the runner can tell them apart.

use fixture_parser::TestCase;
use miette::Diagnostic;
use thiserror::Error;

use crate::service::{
    CompileOptions, CompletionReply, CompletionRequest, CompletionService, ServiceError,
};
use crate::validate::{validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum CaseFailure {
    #[error("completion service reported an error: {message}")]
    #[diagnostic(code(harness::engine::service_error))]
    ServiceCrashed { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expectation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(CaseFailure),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Run one case against `service`. `settings` is handed to the service
/// untouched as part of its configuration.
pub async fn run_case<S>(
    service: &mut S,
    case: &TestCase,
    settings: &serde_json::Value,
) -> Result<Verdict, ServiceError>
where
    S: CompletionService + ?Sized,
{
    let options = CompileOptions::single_file(case, settings);
    service.set_configuration(&options).await?;
    service.ensure_metadata().await?;

    let reply = service
        .get_completions(CompletionRequest::for_case(case))
        .await?;

    let verdict = match reply {
        CompletionReply::OpError { message } => {
            Verdict::Fail(CaseFailure::ServiceCrashed { message })
        }
        CompletionReply::Completions(candidates) => {
            log::trace!("{}: {} candidate(s)", case.name(), candidates.len());
            match validate(case, &candidates) {
                Ok(()) => Verdict::Pass,
                Err(err) => Verdict::Fail(err.into()),
            }
        }
    };
    Ok(verdict)
}
