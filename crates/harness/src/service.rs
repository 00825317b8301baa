// ==============================================================================
// Completion service boundary
// ==============================================================================
//
// The engine under test is opaque: it is configured with a single-file
// project, asked to prepare its metadata, then queried for completions at a
// byte offset. It keeps one "current configuration" at a time, so callers hold
// it by `&mut` and every case overwrites the configuration before use.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fixture_parser::{Dialect, TestCase};
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

/// Project configuration handed to the service before each case.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Source files keyed by the name the service knows them under.
    pub files: BTreeMap<String, Arc<str>>,
    pub dialect: Dialect,
    /// Caller-provided settings, passed through untouched.
    pub settings: serde_json::Value,
}

impl CompileOptions {
    /// Options for a project made of the case's fixture alone, stored under
    /// the dialect's synthetic file name.
    pub fn single_file(case: &TestCase, settings: &serde_json::Value) -> Self {
        let mut files = BTreeMap::new();
        files.insert(
            case.dialect.synthetic_file_name().to_string(),
            case.full_text.clone(),
        );
        CompileOptions {
            files,
            dialect: case.dialect,
            settings: settings.clone(),
        }
    }

    pub fn main_file(&self) -> &'static str {
        self.dialect.synthetic_file_name()
    }

    pub fn main_text(&self) -> Option<&str> {
        self.files.get(self.main_file()).map(|text| &**text)
    }
}

/// One completion suggestion, reduced to the names fixtures compare against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub qualified_name: SmolStr,
    /// Name used for the alternate dialect. Falls back to `qualified_name`.
    pub dialect_qualified_name: Option<SmolStr>,
}

impl Candidate {
    pub fn new(qualified_name: impl Into<SmolStr>) -> Self {
        Candidate {
            qualified_name: qualified_name.into(),
            dialect_qualified_name: None,
        }
    }

    pub fn with_dialect_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.dialect_qualified_name = Some(name.into());
        self
    }

    pub fn name_for(&self, dialect: Dialect) -> &str {
        if dialect.is_alternate() {
            self.dialect_qualified_name
                .as_deref()
                .unwrap_or(&self.qualified_name)
        } else {
            &self.qualified_name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRequest<'a> {
    pub file_name: &'a str,
    pub cursor: usize,
    pub word_start: usize,
    pub word_end: usize,
    pub file_text: &'a str,
}

impl<'a> CompletionRequest<'a> {
    pub fn for_case(case: &'a TestCase) -> Self {
        CompletionRequest {
            file_name: case.dialect.synthetic_file_name(),
            cursor: case.cursor,
            word_start: case.word_start(),
            word_end: case.word_end(),
            file_text: &case.full_text,
        }
    }
}

/// What the service answered. `OpError` is the service reporting its own
/// internal failure, which is different from returning no completions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReply {
    Completions(Vec<Candidate>),
    OpError { message: String },
}

/// Failure to talk to the service at all.
#[derive(Debug, Error, Diagnostic)]
pub enum ServiceError {
    #[error("I/O error talking to the completion service: {0}")]
    #[diagnostic(code(harness::service::io))]
    Io(#[from] std::io::Error),

    #[error("completion service protocol error: {0}")]
    #[diagnostic(code(harness::service::protocol))]
    Protocol(String),

    #[error("no response to `{method}` within {timeout:?}")]
    #[diagnostic(code(harness::service::timeout))]
    Timeout { method: String, timeout: Duration },

    #[error("completion service exited")]
    #[diagnostic(code(harness::service::exited))]
    Exited,
}

#[async_trait]
pub trait CompletionService: Send {
    async fn set_configuration(&mut self, options: &CompileOptions) -> Result<(), ServiceError>;

    /// Prime whatever the service needs before completion requests are
    /// meaningful.
    async fn ensure_metadata(&mut self) -> Result<(), ServiceError>;

    async fn get_completions(
        &mut self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionReply, ServiceError>;
}
