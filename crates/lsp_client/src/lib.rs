// ==============================================================================
// LSP adapter for the completion harness
// ==============================================================================
//
// Runs the harness against any language server that speaks LSP over stdio.
// `transport` frames JSON-RPC messages, `client` pairs requests with responses
// and answers server requests, `service` maps the harness's completion service
// calls onto document sync and `textDocument/completion`.

pub mod client;
pub mod convert;
pub mod service;
pub mod transport;

pub use client::LspClient;
pub use service::{LspCompletionService, LspOptions, NameField, NameFields, UnknownNameField};
