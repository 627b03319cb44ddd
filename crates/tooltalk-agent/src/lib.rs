//! The chat-facing agent: command dispatch over a session manager, plus the
//! channel abstraction and the message pump that serves one channel until
//! it closes.

pub mod agent;
pub mod channel;

pub use agent::ChatAgent;
pub use channel::{ChatChannel, ConsoleChannel, InboundMessage};

use tooltalk_core::TooltalkResult;
use tracing::info;

/// Serve `channel` with `agent` until the channel closes.
///
/// Messages are handled strictly one at a time: a message is processed to
/// completion (including any transport I/O) before the next is read.
/// `quit` and `exit` end the loop, as does end-of-input.
pub async fn run<C: ChatChannel>(agent: &mut ChatAgent, channel: &mut C) -> TooltalkResult<()> {
    channel.send(&agent.welcome()).await?;

    while let Some(message) = channel.recv().await? {
        let text = message.text.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("quit") || text.eq_ignore_ascii_case("exit") {
            info!("Chat session ended");
            break;
        }
        let reply = agent.process_chat(text, message.sender.as_deref()).await;
        channel.send(&reply).await?;
    }
    Ok(())
}
