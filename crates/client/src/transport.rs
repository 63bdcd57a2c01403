// stepscope - interactive step debugger
// Copyright (C) 2024 The stepscope contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Single-flight pipe transport
//!
//! Both processes read and write one unmultiplexed byte pipe, so strict
//! command/response ordering is the only correctness mechanism: a
//! bounded capacity-1 request channel feeds a dedicated task that owns
//! both pipe ends and completes one full round trip before accepting
//! the next request.
//!
//! One request is a batch of command lines (e.g. `step` + `where`)
//! answered by exactly one framed response. The task writes the batch,
//! then scans lines for a framing header, stripping the backend prompt
//! tag and discarding junk such as stop banners; once the header is
//! found it reads exactly N payload lines verbatim. While scanning it
//! concurrently awaits backend exit: exit or EOF there is the distinct
//! [`TransportError::Closed`] outcome, after which the transport
//! refuses further requests. EOF *after* the header is a framing error
//! instead, because the backend died mid-payload.

use std::future::Future;
use std::process::Stdio;

use stepscope_common::{parse_header, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

/// How a round trip can fail.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The backend exited or closed the pipe. Not recoverable; build a
    /// new transport to restart.
    #[error("backend closed the pipe")]
    Closed,
    /// The bytes on the pipe violated the wire grammar.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Pipe I/O failed outright.
    #[error("pipe i/o error: {0}")]
    Io(#[from] std::io::Error),
}

struct Request {
    lines: Vec<String>,
    reply: oneshot::Sender<Result<Vec<String>, TransportError>>,
}

/// Handle to the transport task. Cloning is deliberately not offered:
/// one owner, one queue, one request in flight.
#[derive(Debug)]
pub struct PipeTransport {
    tx: mpsc::Sender<Request>,
    kill: Option<oneshot::Sender<()>>,
}

impl PipeTransport {
    /// Spawn the transport task over arbitrary pipe ends. `exit`
    /// resolves when the backend is known to be gone; for a child
    /// process use [`PipeTransport::spawn_child`].
    pub fn spawn<W, R, F>(writer: W, reader: R, exit: F) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        // Capacity 1: the queue itself is the single-flight discipline.
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(run(writer, reader, exit, rx));
        Self { tx, kill: None }
    }

    /// Spawn a backend child process on piped stdio and build the
    /// transport over it. Stderr is inherited (it carries logs).
    pub fn spawn_child(mut command: Command) -> std::io::Result<Self> {
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::inherit());
        let mut child = command.spawn()?;
        let stdin = child.stdin.take().expect("child stdin is piped");
        let stdout = child.stdout.take().expect("child stdout is piped");

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(monitor_child(child, kill_rx, exit_tx));

        let mut transport = Self::spawn(stdin, stdout, async move {
            let _ = exit_rx.await;
        });
        transport.kill = Some(kill_tx);
        Ok(transport)
    }

    /// Issue one request: a batch of command lines answered by one
    /// framed response. Blocks (asynchronously) until the previous
    /// round trip is complete.
    pub async fn request(&self, lines: Vec<String>) -> Result<Vec<String>, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request { lines, reply: reply_tx })
            .await
            .map_err(|_| TransportError::Closed)?;
        reply_rx.await.map_err(|_| TransportError::Closed)?
    }

    /// Coarse cancellation: kill the backend outright. The only
    /// supported way to interrupt a session.
    pub fn shutdown(mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Owns the child for its whole life: forwards the kill signal and
/// reports exit, however it came about.
async fn monitor_child(mut child: Child, kill: oneshot::Receiver<()>, exited: oneshot::Sender<()>) {
    tokio::select! {
        status = child.wait() => {
            debug!(?status, "backend child exited");
        }
        _ = kill => {
            debug!("killing backend child");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill backend child");
            }
        }
    }
    let _ = exited.send(());
}

async fn run<W, R, F>(mut writer: W, reader: R, exit: F, mut rx: mpsc::Receiver<Request>)
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    F: Future<Output = ()>,
{
    let mut lines = BufReader::new(reader).lines();
    tokio::pin!(exit);
    let mut closed = false;

    while let Some(request) = rx.recv().await {
        if closed {
            let _ = request.reply.send(Err(TransportError::Closed));
            continue;
        }
        let result = round_trip(&mut writer, &mut lines, exit.as_mut(), &request.lines).await;
        if matches!(result, Err(TransportError::Closed)) {
            closed = true;
        }
        if matches!(result, Err(TransportError::Protocol(_))) {
            error!("protocol violation on the pipe; mirror must treat itself as desynchronized");
        }
        let _ = request.reply.send(result);
    }
    trace!("transport task ending");
}

async fn round_trip<W, R, F>(
    writer: &mut W,
    lines: &mut Lines<BufReader<R>>,
    mut exit: std::pin::Pin<&mut F>,
    batch: &[String],
) -> Result<Vec<String>, TransportError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    F: Future<Output = ()>,
{
    for line in batch {
        trace!(command = %line, "sending");
        // Write failure means the backend went away under us.
        writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|_| TransportError::Closed)?;
    }
    writer.flush().await.map_err(|_| TransportError::Closed)?;

    // Header scan: junk (stop banners, glued prompt tags) is skipped,
    // liveness is awaited concurrently.
    let expected = loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => match parse_header(&line) {
                    Some(count) => break count?,
                    None => trace!(junk = %line, "skipping unframed line"),
                },
                // EOF while looking for a header: the backend is gone.
                None => return Err(TransportError::Closed),
            },
            _ = &mut exit => {
                debug!("backend exit detected during header scan");
                return Err(TransportError::Closed);
            }
        }
    };

    // Payload: exactly N literal lines. EOF here is a framing error,
    // not Closed; the response was cut mid-flight.
    let mut payload = Vec::with_capacity(expected);
    for got in 0..expected {
        match lines.next_line().await? {
            Some(line) => payload.push(line),
            None => {
                return Err(ProtocolError::TruncatedPayload { expected, got }.into());
            }
        }
    }
    trace!(lines = payload.len(), "response complete");
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    /// A transport over an in-memory pipe, with a scripted raw peer.
    fn scripted(raw_response: &'static str) -> PipeTransport {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut sink = [0u8; 1024];
            // Consume the request batch, then play the canned bytes.
            let _ = server.read(&mut sink).await;
            let _ = server.write_all(raw_response.as_bytes()).await;
            // Dropping `server` closes the pipe.
        });
        let (read, write) = tokio::io::split(client);
        PipeTransport::spawn(write, read, futures::future::pending())
    }

    #[tokio::test]
    async fn test_plain_round_trip() {
        let transport = scripted("lines: 2\na\nb\n");
        let payload = transport.request(vec!["where".to_string()]).await.unwrap();
        assert_eq!(payload, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_junk_and_prompt_tag_skipped() {
        let transport = scripted("[stepscope] > demo.rs(2)main()\nnoise\n[stepscope] lines: 1\nok\n");
        let payload = transport.request(vec!["step".to_string(), "where".to_string()]).await.unwrap();
        assert_eq!(payload, vec!["ok".to_string()]);
    }

    #[tokio::test]
    async fn test_declared_count_must_match() {
        let transport = scripted("lines: 3\nonly\ntwo\n");
        let err = transport.request(vec!["frames".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Protocol(ProtocolError::TruncatedPayload { expected: 3, got: 2 })
        ));
    }

    #[tokio::test]
    async fn test_eof_during_header_scan_is_closed() {
        let transport = scripted("some banner, then death\n");
        let err = transport.request(vec!["step".to_string()]).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));

        // And the transport stays closed.
        let err = transport.request(vec!["where".to_string()]).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn test_bad_header_count_is_protocol_error() {
        let transport = scripted("lines: soon\n");
        let err = transport.request(vec!["where".to_string()]).await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(ProtocolError::BadHeader(_))));
    }
}
