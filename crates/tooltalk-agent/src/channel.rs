//! Chat channels: where inbound messages come from and replies go.

use async_trait::async_trait;
use std::io::Write;
use tooltalk_core::{TooltalkError, TooltalkResult};

/// One inbound chat message.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Peer identifier when the channel knows one.
    pub sender: Option<String>,
    /// The message text, surrounding whitespace preserved.
    pub text: String,
}

/// A bidirectional chat surface the agent serves.
#[async_trait]
pub trait ChatChannel: Send {
    /// Next inbound message; `None` when the channel has closed.
    async fn recv(&mut self) -> TooltalkResult<Option<InboundMessage>>;

    /// Deliver one reply to the peer.
    async fn send(&mut self, text: &str) -> TooltalkResult<()>;
}

/// Console channel: prompts on stdout, reads lines from stdin.
#[derive(Debug, Default)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatChannel for ConsoleChannel {
    async fn recv(&mut self) -> TooltalkResult<Option<InboundMessage>> {
        // Blocking stdin read off the async runtime.
        let line = tokio::task::spawn_blocking(|| -> std::io::Result<Option<String>> {
            let mut stdout = std::io::stdout();
            stdout.write_all(b"> ")?;
            stdout.flush()?;

            let mut line = String::new();
            match std::io::stdin().read_line(&mut line)? {
                0 => Ok(None),
                _ => Ok(Some(line)),
            }
        })
        .await
        .map_err(|e| TooltalkError::Channel(format!("stdin reader task failed: {e}")))??;

        Ok(line.map(|text| InboundMessage {
            sender: None,
            text: text.trim_end_matches(['\r', '\n']).to_string(),
        }))
    }

    async fn send(&mut self, text: &str) -> TooltalkResult<()> {
        println!("{text}\n");
        Ok(())
    }
}
