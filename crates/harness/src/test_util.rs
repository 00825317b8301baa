// Helpers shared by unit tests, integration tests and downstream crates.

use async_trait::async_trait;

use crate::service::{
    Candidate, CompileOptions, CompletionReply, CompletionRequest, CompletionService, ServiceError,
};

/// One recorded interaction with a [`ScriptedService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetConfiguration { file: String, text: String },
    EnsureMetadata,
    GetCompletions { file: String, cursor: usize },
}

type Responder = Box<dyn FnMut(&str, &CompletionRequest<'_>) -> CompletionReply + Send>;

/// In-memory completion service. Answers every request through a responder
/// that sees the currently configured file text, and records each call.
pub struct ScriptedService {
    pub calls: Vec<Call>,
    pub last_settings: Option<serde_json::Value>,
    current_text: Option<String>,
    responder: Responder,
    connected: bool,
}

impl ScriptedService {
    /// Always answer with `candidates`.
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self::with_responder(move |_, _| CompletionReply::Completions(candidates.clone()))
    }

    pub fn with_names(names: &[&str]) -> Self {
        Self::new(names.iter().map(|name| Candidate::new(*name)).collect())
    }

    /// Always answer with an operation error.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::with_responder(move |_, _| CompletionReply::OpError {
            message: message.clone(),
        })
    }

    pub fn with_responder(
        responder: impl FnMut(&str, &CompletionRequest<'_>) -> CompletionReply + Send + 'static,
    ) -> Self {
        ScriptedService {
            calls: Vec::new(),
            last_settings: None,
            current_text: None,
            responder: Box::new(responder),
            connected: true,
        }
    }

    /// Make every later call fail as if the service process had exited.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Number of completion requests answered so far.
    pub fn completion_requests(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::GetCompletions { .. }))
            .count()
    }

    fn check_connected(&self) -> Result<(), ServiceError> {
        if self.connected {
            Ok(())
        } else {
            Err(ServiceError::Exited)
        }
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn set_configuration(&mut self, options: &CompileOptions) -> Result<(), ServiceError> {
        self.check_connected()?;
        let text = options.main_text().unwrap_or_default().to_string();
        self.calls.push(Call::SetConfiguration {
            file: options.main_file().to_string(),
            text: text.clone(),
        });
        self.current_text = Some(text);
        self.last_settings = Some(options.settings.clone());
        Ok(())
    }

    async fn ensure_metadata(&mut self) -> Result<(), ServiceError> {
        self.check_connected()?;
        self.calls.push(Call::EnsureMetadata);
        Ok(())
    }

    async fn get_completions(
        &mut self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionReply, ServiceError> {
        self.check_connected()?;
        self.calls.push(Call::GetCompletions {
            file: request.file_name.to_string(),
            cursor: request.cursor,
        });
        let text = self.current_text.as_deref().ok_or_else(|| {
            ServiceError::Protocol("completion requested before configuration".into())
        })?;
        Ok((self.responder)(text, &request))
    }
}
