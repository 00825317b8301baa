// ==============================================================================
// E2E LSP Test Harness
// ==============================================================================
//
// A scripted language server running in-process on the other end of a
// `tokio::io::duplex` pipe. It speaks real framed JSON-RPC, so the adapter
// under test goes through the same transport, client and document sync code
// it uses against a spawned server.
//
// Behaviour:
// - `initialize` → empty capabilities
// - `didOpen` / `didChange` → remember the text, then optionally ask the
//   client for `workspace/configuration` and publish empty diagnostics
// - `textDocument/completion` → whatever the completion handler returns
// - `shutdown` → null, `exit` → stop

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lsp_client::transport::{read_message, write_message};
use lsp_client::{LspCompletionService, LspOptions};
use serde_json::{json, Value};
use tokio::io::{split, BufReader};
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::Position;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// What the fake server answers a completion request with: a JSON result,
/// or a JSON-RPC error message.
pub type CompletionHandler = Box<dyn Fn(&str, Position) -> Result<Value, String> + Send + Sync>;

#[derive(Default)]
pub struct ServerLog {
    /// Every method received, in order.
    pub methods: Vec<String>,
    /// Settings from `initializationOptions` and each `didChangeConfiguration`.
    pub settings: Vec<Value>,
    /// `(version, text)` per document sync.
    pub syncs: Vec<(i64, String)>,
    /// Completion positions requested.
    pub positions: Vec<Position>,
    /// Results the client sent back for our server requests.
    pub replies: Vec<Value>,
}

pub struct RunningServer {
    pub log: Arc<Mutex<ServerLog>>,
    task: JoinHandle<()>,
}

#[allow(dead_code)]
impl RunningServer {
    /// Wait for the server loop to end (after `exit` or a closed pipe).
    pub async fn join(self) -> Arc<Mutex<ServerLog>> {
        tokio::time::timeout(TIMEOUT, self.task)
            .await
            .expect("fake server did not stop")
            .expect("fake server panicked");
        self.log
    }
}

pub struct FakeServer {
    pub completions: CompletionHandler,
    pub publish_diagnostics: bool,
    pub ask_configuration: bool,
    pub answer_completions: bool,
}

#[allow(dead_code)]
impl FakeServer {
    pub fn new(completions: impl Fn(&str, Position) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        FakeServer {
            completions: Box::new(completions),
            publish_diagnostics: true,
            ask_configuration: false,
            answer_completions: true,
        }
    }

    /// Always answer with `items` as a plain `CompletionItem[]`.
    pub fn with_items(items: Value) -> Self {
        Self::new(move |_, _| Ok(items.clone()))
    }

    /// Start the server task and connect an adapter to it.
    pub async fn start(
        self,
        options: LspOptions,
        settings: Value,
    ) -> (LspCompletionService, RunningServer) {
        let (client_io, server_io) = tokio::io::duplex(1 << 16);
        let log = Arc::new(Mutex::new(ServerLog::default()));

        let task = tokio::spawn(self.serve(server_io, log.clone()));

        let (reader, writer) = split(client_io);
        let service = LspCompletionService::connect(reader, writer, options, &settings)
            .await
            .expect("initialize");
        (service, RunningServer { log, task })
    }

    async fn serve(self, io: tokio::io::DuplexStream, log: Arc<Mutex<ServerLog>>) {
        let (reader, mut writer) = split(io);
        let mut reader = BufReader::new(reader);
        let mut documents: std::collections::HashMap<String, String> = Default::default();
        let mut next_server_id = 1000;

        while let Ok(Some(message)) = read_message(&mut reader).await {
            let Some(method) = message["method"].as_str().map(str::to_owned) else {
                // A reply to one of our requests.
                log.lock().unwrap().replies.push(message["result"].clone());
                continue;
            };
            log.lock().unwrap().methods.push(method.clone());
            let id = message["id"].clone();
            let params = &message["params"];

            let reply = match method.as_str() {
                "initialize" => {
                    log.lock().unwrap().settings.push(params["initializationOptions"].clone());
                    Some(json!({ "capabilities": { "completionProvider": {} } }))
                }
                "workspace/didChangeConfiguration" => {
                    log.lock().unwrap().settings.push(params["settings"].clone());
                    None
                }
                "textDocument/didOpen" | "textDocument/didChange" => {
                    let doc = &params["textDocument"];
                    let uri = doc["uri"].as_str().unwrap_or_default().to_string();
                    let version = doc["version"].as_i64().unwrap_or_default();
                    let text = if method == "textDocument/didOpen" {
                        doc["text"].as_str().unwrap_or_default().to_string()
                    } else {
                        params["contentChanges"][0]["text"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string()
                    };
                    log.lock().unwrap().syncs.push((version, text.clone()));
                    documents.insert(uri.clone(), text);

                    if self.ask_configuration {
                        next_server_id += 1;
                        let request = json!({
                            "jsonrpc": "2.0",
                            "id": next_server_id,
                            "method": "workspace/configuration",
                            "params": { "items": [{ "section": "fake" }] },
                        });
                        let _ = write_message(&mut writer, &request).await;
                    }
                    if self.publish_diagnostics {
                        let notification = json!({
                            "jsonrpc": "2.0",
                            "method": "textDocument/publishDiagnostics",
                            "params": { "uri": uri, "version": version, "diagnostics": [] },
                        });
                        let _ = write_message(&mut writer, &notification).await;
                    }
                    None
                }
                "textDocument/completion" => {
                    let position: Position =
                        serde_json::from_value(params["position"].clone()).unwrap();
                    log.lock().unwrap().positions.push(position);
                    if !self.answer_completions {
                        continue;
                    }
                    let uri = params["textDocument"]["uri"].as_str().unwrap_or_default();
                    let text = documents.get(uri).map(String::as_str).unwrap_or_default();
                    match (self.completions)(text, position) {
                        Ok(result) => Some(result),
                        Err(message) => {
                            let error = json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "error": { "code": -32603, "message": message },
                            });
                            let _ = write_message(&mut writer, &error).await;
                            continue;
                        }
                    }
                }
                "shutdown" => Some(Value::Null),
                "exit" => break,
                _ => None,
            };

            if let Some(result) = reply {
                if !id.is_null() {
                    let response = json!({ "jsonrpc": "2.0", "id": id, "result": result });
                    let _ = write_message(&mut writer, &response).await;
                }
            }
        }
    }
}

#[allow(dead_code)]
pub fn options() -> LspOptions {
    LspOptions {
        root: std::env::temp_dir(),
        ready_timeout: Duration::from_millis(500),
        request_timeout: TIMEOUT,
        ..LspOptions::default()
    }
}

/// Completion items with only a label.
#[allow(dead_code)]
pub fn labels(names: &[&str]) -> Value {
    Value::Array(names.iter().map(|name| json!({ "label": name })).collect())
}
