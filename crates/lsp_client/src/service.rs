// ==============================================================================
// CompletionService over LSP
// ==============================================================================
//
// Each fixture's synthetic file (`main.ts` / `main.py`) becomes one open
// document under the configured root. Reconfiguring replaces its whole text;
// metadata is ready once the server publishes diagnostics for the new version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use fixture_parser::Dialect;
use harness::{
    Candidate, CompileOptions, CompletionReply, CompletionRequest, CompletionService, ServiceError,
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tower_lsp::lsp_types::{CompletionItem, CompletionResponse, Url};

use crate::client::LspClient;
use crate::convert::LineIndex;

const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";

// ==============================================================================
// Candidate name fields
// ==============================================================================

/// Where on a `CompletionItem` a candidate name is read from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum NameField {
    Label,
    Detail,
    InsertText,
    FilterText,
    SortText,
    /// Dotted path into the item's `data` value, e.g. `data.qName`.
    Data(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown completion item field `{0}`; expected label, detail, insertText, filterText, sortText or data.<path>")]
pub struct UnknownNameField(String);

impl FromStr for NameField {
    type Err = UnknownNameField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "label" => Ok(NameField::Label),
            "detail" => Ok(NameField::Detail),
            "insertText" => Ok(NameField::InsertText),
            "filterText" => Ok(NameField::FilterText),
            "sortText" => Ok(NameField::SortText),
            _ => match s.strip_prefix("data.") {
                Some(path) if !path.is_empty() && path.split('.').all(|seg| !seg.is_empty()) => {
                    Ok(NameField::Data(path.split('.').map(str::to_owned).collect()))
                }
                _ => Err(UnknownNameField(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for NameField {
    type Error = UnknownNameField;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl NameField {
    pub fn read<'a>(&self, item: &'a CompletionItem) -> Option<&'a str> {
        match self {
            NameField::Label => Some(&item.label),
            NameField::Detail => item.detail.as_deref(),
            NameField::InsertText => item.insert_text.as_deref(),
            NameField::FilterText => item.filter_text.as_deref(),
            NameField::SortText => item.sort_text.as_deref(),
            NameField::Data(path) => path
                .iter()
                .try_fold(item.data.as_ref()?, |value, seg| value.get(seg))
                .and_then(Value::as_str),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFields {
    pub qualified: NameField,
    pub dialect_qualified: Option<NameField>,
}

impl Default for NameFields {
    fn default() -> Self {
        NameFields {
            qualified: NameField::Label,
            dialect_qualified: None,
        }
    }
}

impl NameFields {
    /// Missing fields fall back to the item's label.
    pub fn candidate(&self, item: &CompletionItem) -> Candidate {
        let qualified = self.qualified.read(item).unwrap_or(&item.label);
        let mut candidate = Candidate::new(qualified);
        if let Some(name) = self
            .dialect_qualified
            .as_ref()
            .and_then(|field| field.read(item))
        {
            candidate = candidate.with_dialect_name(name);
        }
        candidate
    }
}

// ==============================================================================
// Service
// ==============================================================================

#[derive(Debug, Clone)]
pub struct LspOptions {
    /// Directory the synthetic documents live under.
    pub root: PathBuf,
    pub ready_timeout: Duration,
    pub request_timeout: Duration,
    pub names: NameFields,
}

impl Default for LspOptions {
    fn default() -> Self {
        LspOptions {
            root: PathBuf::from("."),
            ready_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            names: NameFields::default(),
        }
    }
}

fn language_id(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::TypeScript => "typescript",
        Dialect::Python => "python",
    }
}

fn root_uri(root: &Path) -> Result<Url, ServiceError> {
    let root = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()?.join(root)
    };
    Url::from_directory_path(&root)
        .map_err(|()| ServiceError::Protocol(format!("invalid root {}", root.display())))
}

struct OpenDocument {
    uri: Url,
    version: i32,
}

pub struct LspCompletionService {
    client: LspClient,
    child: Option<Child>,
    root_uri: Url,
    options: LspOptions,
    /// Keyed by synthetic file name.
    documents: HashMap<String, OpenDocument>,
    current: Option<String>,
}

impl LspCompletionService {
    /// Start `command` and initialize it over its stdio.
    pub async fn spawn(
        command: &str,
        args: &[String],
        options: LspOptions,
        settings: &Value,
    ) -> Result<Self, ServiceError> {
        log::info!("starting language server: {command} {}", args.join(" "));
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ServiceError::Protocol("language server stdio not captured".into()));
        };

        let mut service = Self::connect(stdout, stdin, options, settings).await?;
        service.child = Some(child);
        Ok(service)
    }

    /// Initialize a server already reachable through `reader`/`writer`.
    pub async fn connect<R, W>(
        reader: R,
        writer: W,
        options: LspOptions,
        settings: &Value,
    ) -> Result<Self, ServiceError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let root_uri = root_uri(&options.root)?;
        let mut client = LspClient::new(reader, writer, options.request_timeout);

        let params = json!({
            "processId": std::process::id(),
            "rootUri": root_uri.as_str(),
            "capabilities": {
                "textDocument": {
                    "completion": { "completionItem": { "snippetSupport": false } },
                    "publishDiagnostics": { "versionSupport": true },
                },
                "workspace": { "configuration": true },
            },
            "initializationOptions": settings,
        });
        if let Err(err) = client.request("initialize", params).await? {
            return Err(ServiceError::Protocol(format!("initialize failed: {err}")));
        }
        client.notify("initialized", json!({})).await?;
        log::debug!("language server initialized at {root_uri}");

        Ok(LspCompletionService {
            client,
            child: None,
            root_uri,
            options,
            documents: HashMap::new(),
            current: None,
        })
    }

    pub async fn shutdown(mut self) -> Result<(), ServiceError> {
        self.client.shutdown().await?;
        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(self.options.request_timeout, child.wait()).await {
                Ok(status) => log::debug!("language server exited: {}", status?),
                Err(_) => {
                    log::warn!("language server did not exit; killing it");
                    child.kill().await?;
                }
            }
        }
        Ok(())
    }

    fn document_uri(&self, file_name: &str) -> Result<Url, ServiceError> {
        self.root_uri
            .join(file_name)
            .map_err(|err| ServiceError::Protocol(format!("invalid document uri: {err}")))
    }
}

#[async_trait]
impl CompletionService for LspCompletionService {
    async fn set_configuration(&mut self, options: &CompileOptions) -> Result<(), ServiceError> {
        self.client
            .notify(
                "workspace/didChangeConfiguration",
                json!({ "settings": options.settings }),
            )
            .await?;

        let file_name = options.main_file();
        let text = options
            .main_text()
            .ok_or_else(|| ServiceError::Protocol(format!("no source for {file_name}")))?;

        let (uri, version) = match self.documents.get_mut(file_name) {
            Some(doc) => {
                doc.version += 1;
                let (uri, version) = (doc.uri.clone(), doc.version);
                self.client
                    .notify(
                        "textDocument/didChange",
                        json!({
                            "textDocument": { "uri": uri.as_str(), "version": version },
                            "contentChanges": [{ "text": text }],
                        }),
                    )
                    .await?;
                (uri, version)
            }
            None => {
                let uri = self.document_uri(file_name)?;
                self.client
                    .notify(
                        "textDocument/didOpen",
                        json!({
                            "textDocument": {
                                "uri": uri.as_str(),
                                "languageId": language_id(options.dialect),
                                "version": 1,
                                "text": text,
                            }
                        }),
                    )
                    .await?;
                self.documents.insert(
                    file_name.to_string(),
                    OpenDocument {
                        uri: uri.clone(),
                        version: 1,
                    },
                );
                (uri, 1)
            }
        };

        // Diagnostics for older text must not count as readiness.
        self.client
            .forget_notifications(PUBLISH_DIAGNOSTICS, |params| params["uri"] == uri.as_str())
            .await?;
        self.current = Some(file_name.to_string());
        log::trace!("configured {uri} at version {version}");
        Ok(())
    }

    async fn ensure_metadata(&mut self) -> Result<(), ServiceError> {
        let Some(doc) = self.current.as_ref().and_then(|name| self.documents.get(name)) else {
            return Ok(());
        };
        let (uri, version) = (doc.uri.clone(), doc.version);

        // Servers that omit `version` are taken at their word: any
        // diagnostics for the uri that arrive after the last sync count.
        let published = self
            .client
            .wait_for_notification(
                PUBLISH_DIAGNOSTICS,
                |params| {
                    params["uri"] == uri.as_str()
                        && params
                            .get("version")
                            .and_then(Value::as_i64)
                            .map_or(true, |v| v == i64::from(version))
                },
                self.options.ready_timeout,
            )
            .await?;

        if published.is_none() {
            log::warn!(
                "no diagnostics for {uri} within {:?}; requesting completions anyway",
                self.options.ready_timeout
            );
        }
        Ok(())
    }

    async fn get_completions(
        &mut self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionReply, ServiceError> {
        let uri = self.document_uri(request.file_name)?;
        let position = LineIndex::new(request.file_text).position(request.cursor);

        let result = self
            .client
            .request(
                "textDocument/completion",
                json!({
                    "textDocument": { "uri": uri.as_str() },
                    "position": position,
                    "context": { "triggerKind": 1 },
                }),
            )
            .await?;

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                return Ok(CompletionReply::OpError {
                    message: err.message.into_owned(),
                })
            }
        };

        let response: Option<CompletionResponse> = serde_json::from_value(value)
            .map_err(|err| ServiceError::Protocol(format!("bad completion result: {err}")))?;
        let items = match response {
            Some(CompletionResponse::Array(items)) => items,
            Some(CompletionResponse::List(list)) => list.items,
            None => Vec::new(),
        };

        Ok(CompletionReply::Completions(
            items
                .iter()
                .map(|item| self.options.names.candidate(item))
                .collect(),
        ))
    }
}
