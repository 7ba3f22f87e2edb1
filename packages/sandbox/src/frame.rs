// ABOUTME: Reads a sandbox worker's output streams
// ABOUTME: The first prefixed stdout line is the worker's message; everything else is plain output

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, SandboxError};

/// Fixed start of the line carrying the worker's message. Starts with an ASCII
/// record separator so ordinary console output does not collide with it by
/// accident.
pub const FRAME_PREFIX: &str = "\u{1e}evald-result:";

/// Random per-worker part of the frame marker.
///
/// It is embedded only in the staged wrapper's module scope and handed to the
/// stdout reader, so a line printed by the untrusted module cannot pass for
/// the worker's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameToken(String);

impl FrameToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Full line prefix, `FRAME_PREFIX` followed by the token and `:`
    pub fn marker(&self) -> String {
        format!("{}{}:", FRAME_PREFIX, self.0)
    }
}

/// Longest plain output line that is traced as-is
const MAX_OUTPUT_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, PartialEq)]
pub(crate) enum Line {
    Complete,
    Oversized,
    Eof,
}

/// Read one `\n`-terminated line into `buf`, holding at most `limit` bytes.
/// Longer lines are skipped up to their terminator and reported as
/// `Oversized` with their first `limit + 1` bytes left in `buf`.
pub(crate) async fn read_bounded_line<R>(
    reader: &mut R,
    limit: usize,
    buf: &mut Vec<u8>,
) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', buf)
        .await?;

    if read == 0 {
        return Ok(Line::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(Line::Complete);
    }

    if read > limit {
        skip_line(reader).await?;
        return Ok(Line::Oversized);
    }

    // Final line without a terminator
    Ok(Line::Complete)
}

async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        let (found, used) = match available.iter().position(|b| *b == b'\n') {
            Some(index) => (true, index + 1),
            None => (false, available.len()),
        };
        reader.consume(used);
        if found {
            return Ok(());
        }
    }
}

/// Drain a worker's stdout until a line starting with `marker` arrives.
///
/// The decoded message, or the reason it could not be decoded, is sent on
/// `tx` exactly once. If the stream ends first, `tx` is dropped so the
/// receiver observes a closed channel.
pub(crate) async fn pump_stdout<R>(
    stdout: R,
    marker: String,
    max_message_bytes: usize,
    tx: oneshot::Sender<Result<Value>>,
    worker_id: Uuid,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let prefix = marker.as_bytes();
    let limit = max_message_bytes + prefix.len();

    loop {
        match read_bounded_line(&mut reader, limit, &mut buf).await {
            Ok(Line::Complete) => {
                if let Some(payload) = buf.strip_prefix(prefix) {
                    let message = serde_json::from_slice::<Value>(payload)
                        .map_err(|e| SandboxError::MalformedMessage(e.to_string()));
                    let _ = tx.send(message);
                    return;
                }
                trace_output(worker_id, "stdout", &buf);
            }
            Ok(Line::Oversized) => {
                if buf.starts_with(prefix) {
                    let _ = tx.send(Err(SandboxError::MessageTooLarge {
                        limit: max_message_bytes,
                    }));
                    return;
                }
                warn!(worker_id = %worker_id, limit, "Discarded oversized worker output line");
            }
            Ok(Line::Eof) => {
                debug!(worker_id = %worker_id, "Worker stdout closed");
                return;
            }
            Err(e) => {
                warn!(worker_id = %worker_id, error = %e, "Failed to read worker stdout");
                return;
            }
        }
    }
}

/// Forward a worker's stderr to tracing until it closes.
pub(crate) async fn pump_stderr<R>(stderr: R, worker_id: Uuid)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    loop {
        match read_bounded_line(&mut reader, MAX_OUTPUT_LINE_BYTES, &mut buf).await {
            Ok(Line::Complete) => trace_output(worker_id, "stderr", &buf),
            Ok(Line::Oversized) => {
                debug!(worker_id = %worker_id, stream = "stderr", "Skipped oversized line")
            }
            Ok(Line::Eof) | Err(_) => return,
        }
    }
}

fn trace_output(worker_id: Uuid, stream: &'static str, line: &[u8]) {
    if line.is_empty() {
        return;
    }
    let line = &line[..line.len().min(MAX_OUTPUT_LINE_BYTES)];
    debug!(
        target: "evald::worker",
        worker_id = %worker_id,
        stream,
        "{}",
        String::from_utf8_lossy(line)
    );
}
