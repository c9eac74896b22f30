use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::conversation::Turn;
use crate::ollama::{ChatChunk, LineDecoder, OllamaClient, parse_chunk};

/// Events one streaming session delivers to the controller, in strict
/// arrival order. Exactly one terminal event (`Completed` or `Failed`) is
/// sent per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Accumulated reply text so far; grows with every content chunk.
    Partial(String),
    /// Final reply text, equal to the concatenation of every chunk.
    Completed(String),
    /// The request or transport failed; no assistant turn may be appended.
    Failed(String),
}

/// Start one streaming exchange for the given conversation snapshot.
///
/// The worker owns the network side and hands progress back only through
/// the returned channel; it never touches conversation state itself. The
/// controller drops the receiver on the terminal event, which also tears
/// the worker down if the body is still open.
pub fn spawn(
    client: OllamaClient,
    model: String,
    turns: Vec<Turn>,
) -> mpsc::UnboundedReceiver<StreamEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Err(e) = pump(client, model, turns, &tx).await {
            let _ = tx.send(StreamEvent::Failed(e.to_string()));
        }
    });
    rx
}

async fn pump(
    client: OllamaClient,
    model: String,
    turns: Vec<Turn>,
    tx: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<()> {
    let response = client.chat_stream(&model, &turns).await?;
    let mut body = response.bytes_stream();
    let mut decoder = LineDecoder::new();
    let mut reply = Accumulator::new();

    while let Some(item) = body.next().await {
        let bytes = item?;
        for line in decoder.feed(&bytes) {
            match reply.apply(&parse_chunk(&line)?) {
                Step::Grew(partial) => {
                    if tx.send(StreamEvent::Partial(partial)).is_err() {
                        // Controller went away; nothing left to report to.
                        return Ok(());
                    }
                }
                Step::Done(final_text) => {
                    let _ = tx.send(StreamEvent::Completed(final_text));
                    return Ok(());
                }
                Step::Quiet => {}
            }
        }
    }

    Err(anyhow!("connection closed before the response completed"))
}

/// Concatenates chunk contents in arrival order. Append-only: earlier text
/// is never replaced, so the rendered reply can only grow.
#[derive(Default)]
pub struct Accumulator {
    text: String,
}

pub enum Step {
    /// A content chunk landed; carries the accumulated text so far.
    Grew(String),
    /// The transport signalled end-of-stream; carries the final text.
    Done(String),
    /// Chunk with nothing to show (e.g. an empty delta).
    Quiet,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, chunk: &ChatChunk) -> Step {
        let grew = match &chunk.message {
            Some(msg) if !msg.content.is_empty() => {
                self.text.push_str(&msg.content);
                true
            }
            _ => false,
        };

        if chunk.done {
            Step::Done(std::mem::take(&mut self.text))
        } else if grew {
            Step::Grew(self.text.clone())
        } else {
            Step::Quiet
        }
    }
}
