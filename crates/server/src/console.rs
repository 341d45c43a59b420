//! Line-delimited JSON transport over stdin/stdout.
//!
//! Input:  `{"identity": 42, "text": "/register"}` per line.
//! Output: one serialized [`OutboundReply`] per line.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::warn;

use gradedesk_chat::runner::{ChatTransport, InboundMessage, OutboundReply, TransportError};
use gradedesk_core::domain::identity::Identity;

#[derive(Debug, Deserialize)]
struct ConsoleLine {
    identity: Identity,
    text: String,
}

pub struct ConsoleTransport<R, W> {
    lines: Mutex<Lines<R>>,
    writer: Mutex<W>,
    sequence: AtomicU64,
}

impl ConsoleTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            writer: Mutex::new(writer),
            sequence: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl<R, W> ChatTransport for ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Blank and malformed lines are skipped.
    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError> {
        let mut lines = self.lines.lock().await;
        loop {
            let Some(line) = lines
                .next_line()
                .await
                .map_err(|error| TransportError::Receive(error.to_string()))?
            else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<ConsoleLine>(&line) {
                Ok(parsed) => {
                    let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
                    return Ok(Some(InboundMessage {
                        message_id: format!("console-{sequence}"),
                        identity: parsed.identity,
                        text: parsed.text,
                    }));
                }
                Err(error) => {
                    warn!(
                        event_name = "ingress.console.malformed_line",
                        error = %error,
                        "skipping console line that is not a message object"
                    );
                }
            }
        }
    }

    async fn send(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        let mut encoded =
            serde_json::to_string(reply).map_err(|error| TransportError::Send(error.to_string()))?;
        encoded.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(encoded.as_bytes())
            .await
            .map_err(|error| TransportError::Send(error.to_string()))?;
        writer.flush().await.map_err(|error| TransportError::Send(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
