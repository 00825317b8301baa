// ==============================================================================
// Minimal LSP client
// ==============================================================================
//
// Owns the write half of a server connection. A background task reads framed
// messages off the read half and forwards them through an unbounded channel,
// so waiting with a timeout never leaves a half-read frame behind.
//
// Server→client traffic seen while waiting:
// - responses are matched against the pending request id
// - server requests (`workspace/configuration`, ...) get a `null` result
// - notifications are buffered for `wait_for_notification`

use std::collections::VecDeque;
use std::time::Duration;

use harness::ServiceError;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tower_lsp::jsonrpc::{self, Id, Request, Response};

use crate::transport::{read_message, write_message};

/// Cap on buffered notifications; the oldest are dropped past this.
const MAX_BUFFERED: usize = 256;

enum Incoming {
    Response(Response),
    Notification(Request),
    ServerRequest(Request),
}

pub struct LspClient {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    incoming: mpsc::UnboundedReceiver<Value>,
    notifications: VecDeque<Request>,
    next_id: i64,
    request_timeout: Duration,
}

impl LspClient {
    pub fn new<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            loop {
                match read_message(&mut reader).await {
                    Ok(Some(message)) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        log::debug!("language server closed its output");
                        break;
                    }
                    Err(err) => {
                        log::error!("reading from language server: {err}");
                        break;
                    }
                }
            }
        });

        LspClient {
            writer: Box::new(writer),
            incoming: rx,
            notifications: VecDeque::new(),
            next_id: 1,
            request_timeout,
        }
    }

    /// Send a request and wait for its response. The outer `Result` is the
    /// transport; the inner one is the server's JSON-RPC result or error.
    pub async fn request(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<Result<Value, jsonrpc::Error>, ServiceError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = Request::build(method.to_string())
            .params(params)
            .id(id)
            .finish();
        log::trace!("--> {method} #{id}");
        write_message(&mut self.writer, &request).await?;

        let timeout = self.request_timeout;
        tokio::time::timeout(timeout, self.response_to(Id::Number(id)))
            .await
            .map_err(|_| ServiceError::Timeout {
                method: method.to_string(),
                timeout,
            })?
    }

    pub async fn notify(&mut self, method: &str, params: Value) -> Result<(), ServiceError> {
        let notification = Request::build(method.to_string()).params(params).finish();
        log::trace!("--> {method}");
        write_message(&mut self.writer, &notification).await
    }

    /// Wait for a notification named `method` whose params satisfy `accept`.
    /// Buffered notifications are checked first. `Ok(None)` on timeout.
    pub async fn wait_for_notification(
        &mut self,
        method: &str,
        accept: impl Fn(&Value) -> bool,
        timeout: Duration,
    ) -> Result<Option<Value>, ServiceError> {
        let matches = |request: &Request| {
            request.method() == method && request.params().is_some_and(|params| accept(params))
        };

        if let Some(pos) = self.notifications.iter().position(|n| matches(n)) {
            let found = self.notifications.remove(pos);
            return Ok(found.map(|n| n.params().cloned().unwrap_or(Value::Null)));
        }

        match tokio::time::timeout(timeout, self.next_matching(&matches)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Drop notifications named `method` that satisfy `discard`. Messages the
    /// reader task has already queued are taken in first, so nothing received
    /// before this call survives it.
    pub async fn forget_notifications(
        &mut self,
        method: &str,
        discard: impl Fn(&Value) -> bool,
    ) -> Result<(), ServiceError> {
        while let Ok(message) = self.incoming.try_recv() {
            match decode(message)? {
                Incoming::Notification(n) => self.buffer(n),
                Incoming::ServerRequest(r) => self.answer(r).await?,
                Incoming::Response(r) => log::debug!("unexpected response: {r:?}"),
            }
        }

        self.notifications.retain(|n| {
            !(n.method() == method && n.params().is_some_and(|params| discard(params)))
        });
        Ok(())
    }

    /// `shutdown` followed by `exit`.
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        if let Err(err) = self.request("shutdown", Value::Null).await? {
            log::warn!("language server refused shutdown: {err}");
        }
        self.notify("exit", Value::Null).await
    }

    async fn next_matching(
        &mut self,
        matches: &impl Fn(&Request) -> bool,
    ) -> Result<Value, ServiceError> {
        loop {
            match self.next_incoming().await? {
                Incoming::Notification(n) if matches(&n) => {
                    return Ok(n.params().cloned().unwrap_or(Value::Null));
                }
                Incoming::Notification(n) => log::trace!("<-- {} (ignored)", n.method()),
                Incoming::ServerRequest(r) => self.answer(r).await?,
                Incoming::Response(r) => log::debug!("unexpected response: {r:?}"),
            }
        }
    }

    async fn response_to(&mut self, id: Id) -> Result<Result<Value, jsonrpc::Error>, ServiceError> {
        loop {
            match self.next_incoming().await? {
                Incoming::Response(response) => {
                    let (response_id, result) = response.into_parts();
                    if response_id == id {
                        return Ok(result);
                    }
                    log::debug!("dropping response for stale request {response_id}");
                }
                Incoming::Notification(n) => self.buffer(n),
                Incoming::ServerRequest(r) => self.answer(r).await?,
            }
        }
    }

    fn buffer(&mut self, notification: Request) {
        log::trace!("<-- {}", notification.method());
        if self.notifications.len() == MAX_BUFFERED {
            self.notifications.pop_front();
        }
        self.notifications.push_back(notification);
    }

    async fn next_incoming(&mut self) -> Result<Incoming, ServiceError> {
        let message = self.incoming.recv().await.ok_or(ServiceError::Exited)?;
        decode(message)
    }

    async fn answer(&mut self, request: Request) -> Result<(), ServiceError> {
        log::debug!("<-- server request {}; answering null", request.method());
        if let Some(id) = request.id() {
            let response = Response::from_ok(id.clone(), Value::Null);
            write_message(&mut self.writer, &response).await?;
        }
        Ok(())
    }
}

fn decode(message: Value) -> Result<Incoming, ServiceError> {
    let decode_err =
        |err: serde_json::Error| ServiceError::Protocol(format!("undecodable message: {err}"));

    if message.get("method").is_some() {
        let request: Request = serde_json::from_value(message).map_err(decode_err)?;
        if request.id().is_some() {
            Ok(Incoming::ServerRequest(request))
        } else {
            Ok(Incoming::Notification(request))
        }
    } else {
        let response: Response = serde_json::from_value(message).map_err(decode_err)?;
        Ok(Incoming::Response(response))
    }
}
