// ==============================================================================
// JSON-RPC framing
// ==============================================================================
//
// LSP base protocol: each message is a header block (`Content-Length: N`,
// optionally `Content-Type`) terminated by an empty line, followed by exactly
// N bytes of UTF-8 JSON.

use harness::ServiceError;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read one message. `Ok(None)` on a clean end of stream before any header.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<serde_json::Value>, ServiceError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            if saw_header {
                return Err(ServiceError::Protocol(
                    "stream ended inside a message header".into(),
                ));
            }
            return Ok(None);
        }

        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            if !saw_header {
                // Stray blank line between messages.
                continue;
            }
            break;
        }
        saw_header = true;

        let Some((name, value)) = header.split_once(':') else {
            return Err(ServiceError::Protocol(format!("malformed header: {header:?}")));
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let length = value.trim().parse().map_err(|_| {
                ServiceError::Protocol(format!("bad Content-Length: {:?}", value.trim()))
            })?;
            content_length = Some(length);
        }
    }

    let length = content_length
        .ok_or_else(|| ServiceError::Protocol("message without Content-Length".into()))?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    let value = serde_json::from_slice(&body)
        .map_err(|err| ServiceError::Protocol(format!("invalid JSON body: {err}")))?;
    Ok(Some(value))
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ServiceError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let body = serde_json::to_vec(message)
        .map_err(|err| ServiceError::Protocol(format!("failed to encode message: {err}")))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
