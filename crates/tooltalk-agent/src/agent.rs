//! The chat agent: one entry point per message, every failure mode
//! rendered as chat text.

use tooltalk_command::{Command, CommandParser, ParsedCommand, PhraseRecognizer};
use tooltalk_core::{CallArgs, TooltalkError};
use tooltalk_format::Formatter;
use tooltalk_session::SessionManager;
use tracing::debug;

/// Chat-facing front end over one [`SessionManager`].
///
/// All collaborators are injected at construction; the agent holds no
/// global state. Replies are always plain text — errors included — so a
/// message can never take the agent down.
pub struct ChatAgent {
    parser: CommandParser,
    recognizer: PhraseRecognizer,
    session: SessionManager,
    formatter: Formatter,
}

impl ChatAgent {
    pub fn new(
        parser: CommandParser,
        recognizer: PhraseRecognizer,
        session: SessionManager,
        formatter: Formatter,
    ) -> Self {
        Self {
            parser,
            recognizer,
            session,
            formatter,
        }
    }

    /// Handle one structured message: `!`-commands are dispatched, anything
    /// else gets the introduction reply.
    pub async fn process_message(&mut self, text: &str, sender: Option<&str>) -> String {
        debug!(
            sender = sender.unwrap_or("unknown"),
            text = %text,
            "Processing message"
        );

        if !self.parser.is_command(text) {
            return introduction();
        }
        let parsed = self.parser.parse(text);
        self.dispatch(parsed).await
    }

    /// Handle one conversational message: structured commands still work,
    /// free-text phrases go through the recognizer, and anything else gets
    /// the didn't-understand reply with example phrases.
    pub async fn process_chat(&mut self, text: &str, sender: Option<&str>) -> String {
        if self.parser.is_command(text) {
            return self.process_message(text, sender).await;
        }
        match self.recognizer.recognize(text) {
            Some(parsed) => {
                debug!(
                    sender = sender.unwrap_or("unknown"),
                    command = %parsed.raw,
                    "Recognized phrase"
                );
                self.dispatch(parsed).await
            }
            None => misunderstood(),
        }
    }

    /// Session-start greeting with the example phrases.
    pub fn welcome(&self) -> String {
        format!(
            "Welcome to the MCP Client Agent! You can interact with MCP tool servers \
             using natural language commands.\n\nExamples:\n{}",
            example_lines()
        )
    }

    /// Connect to an MCP server without going through the command grammar.
    ///
    /// Startup connects sourced from flags or a config file come in here;
    /// the reply is the same chat text a `connect` command would produce.
    pub async fn connect(
        &mut self,
        url: &str,
        token: Option<&str>,
        token_env_var: Option<&str>,
    ) -> String {
        match self.session.connect(url, token, token_env_var).await {
            Ok(outcome) => self.formatter.connect_success(&outcome),
            Err(TooltalkError::Connection(message)) => self.formatter.connect_failure(&message),
            Err(other) => self.formatter.connect_failure(&other.to_string()),
        }
    }

    async fn dispatch(&mut self, parsed: ParsedCommand) -> String {
        match parsed.command {
            Command::Connect {
                url,
                token,
                token_env_var,
            } => {
                self.connect(&url, token.as_deref(), token_env_var.as_deref())
                    .await
            }
            Command::Disconnect => match self.session.disconnect().await {
                Ok(url) => self.formatter.disconnect_success(&url),
                Err(TooltalkError::NotConnected) => self.formatter.not_connected(),
                Err(other) => self.formatter.disconnect_failure(&other.to_string()),
            },
            Command::List => {
                if !self.session.is_connected() {
                    return self.formatter.not_connected();
                }
                self.formatter.tool_list(self.session.tools())
            }
            Command::Call { tool, args } | Command::Shorthand { tool, args } => {
                self.invoke_tool(&tool, args).await
            }
            Command::Status => self.formatter.status(&self.session.status()),
            Command::Help { topic } => self.parser.help_text(topic.as_deref()),
            Command::Schema { tool } => self.render_schema(&tool).await,
            Command::Unknown { note } => match note {
                Some(note) => self.formatter.error(&note),
                None => self.formatter.unknown_command(&parsed.raw),
            },
        }
    }

    async fn invoke_tool(&mut self, tool: &str, args: CallArgs) -> String {
        if !self.session.is_connected() {
            return self.formatter.not_connected();
        }
        match self.session.call_tool(tool, args).await {
            Ok(result) => self.formatter.tool_call_result(&result),
            Err(TooltalkError::MissingParameters {
                tool,
                missing,
                schema,
            }) => self
                .formatter
                .parameter_validation_error(&tool, &missing, &schema),
            Err(TooltalkError::NotConnected) => self.formatter.not_connected(),
            Err(other) => self.formatter.error(&other.to_string()),
        }
    }

    async fn render_schema(&mut self, tool: &str) -> String {
        if !self.session.is_connected() {
            return self.formatter.not_connected();
        }
        match self.session.schema(tool).await {
            Ok(schema) if schema.is_empty() => self
                .formatter
                .error(&format!("No schema found for tool {tool}")),
            Ok(schema) => self.formatter.schema_result(tool, &schema),
            Err(TooltalkError::NotConnected) => self.formatter.not_connected(),
            Err(other) => self.formatter.error(&other.to_string()),
        }
    }
}

fn introduction() -> String {
    "I'm an MCP Client Agent that can connect to MCP servers and call tools.\n\n\
     Use `help` to see available commands."
        .to_string()
}

fn misunderstood() -> String {
    format!(
        "I didn't understand that command. Here are some examples of what you can say:\n\n{}",
        example_lines()
    )
}

fn example_lines() -> String {
    PhraseRecognizer::examples()
        .iter()
        .map(|phrase| format!("- {phrase}"))
        .collect::<Vec<_>>()
        .join("\n")
}
