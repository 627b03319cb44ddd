//! Structured `!`-command parsing.
//!
//! One pattern per command keeps the grammar honest: the vocabulary is
//! small and fixed, so there is no general grammar to maintain. Parsing
//! never fails; anything the grammar does not recognize comes back as
//! [`Command::Unknown`], optionally with a note saying what went wrong.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tooltalk_core::CallArgs;

use crate::compiled;

/// Marker a message must start with (after trimming) to count as a command.
pub const COMMAND_MARKER: char = '!';

/// One `key=value` pair: double-quoted, single-quoted or bare value.
static SHORTHAND_PAIR: LazyLock<Regex> =
    LazyLock::new(|| compiled(r#"(\w+)=(?:"([^"]*)"|'([^']*)'|(\S*))"#));

/// A command extracted from one line of chat text.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a session against an MCP server.
    Connect {
        /// Server URL, first token after the command word.
        url: String,
        /// Bearer token passed inline with `--token`.
        token: Option<String>,
        /// Environment variable to source the token from, `--token-env-var`.
        token_env_var: Option<String>,
    },
    /// Tear down the current session.
    Disconnect,
    /// List the tools of the connected server.
    List,
    /// Call a tool with a JSON-object argument payload.
    Call {
        /// Tool to invoke.
        tool: String,
        /// Arguments exactly as the user wrote them.
        args: CallArgs,
    },
    /// Call a tool with `key=value` shorthand arguments.
    Shorthand {
        /// Tool to invoke.
        tool: String,
        /// Arguments after type coercion of bare values.
        args: CallArgs,
    },
    /// Report connection status.
    Status,
    /// Show help, optionally for one command.
    Help {
        /// Command name to show help for.
        topic: Option<String>,
    },
    /// Show the full parameter schema of a tool.
    Schema {
        /// Tool whose schema to show.
        tool: String,
    },
    /// Anything the grammar does not recognize.
    Unknown {
        /// Diagnostic for the user, e.g. a JSON parse complaint.
        note: Option<String>,
    },
}

/// A [`Command`] together with the trimmed line it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    /// The parsed command.
    pub command: Command,
    /// The trimmed input line.
    pub raw: String,
}

/// Parser for structured `!`-prefixed commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandParser;

impl CommandParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    /// Whether the trimmed text starts with the command marker.
    pub fn is_command(&self, text: &str) -> bool {
        text.trim_start().starts_with(COMMAND_MARKER)
    }

    /// Parse one line of chat text. Never fails; unrecognized input
    /// yields [`Command::Unknown`].
    pub fn parse(&self, text: &str) -> ParsedCommand {
        let raw = text.trim();
        ParsedCommand {
            command: self.command_for(raw),
            raw: raw.to_string(),
        }
    }

    fn command_for(&self, raw: &str) -> Command {
        let Some(rest) = raw.strip_prefix(COMMAND_MARKER) else {
            return Command::Unknown { note: None };
        };
        let mut parts = rest.splitn(2, char::is_whitespace);
        let word = parts.next().unwrap_or_default();
        let remainder = parts.next().map(str::trim).filter(|r| !r.is_empty());

        // The command word is case-sensitive; `!LIST` is not a command.
        match (word, remainder) {
            ("connect", Some(line)) => parse_connect(line),
            ("call", Some(line)) => parse_call(line),
            ("shorthand", Some(line)) => parse_shorthand(line),
            ("help", None) => Command::Help { topic: None },
            ("help", Some(topic)) if !topic.contains(char::is_whitespace) => Command::Help {
                topic: Some(topic.to_string()),
            },
            ("schema", Some(tool)) if !tool.contains(char::is_whitespace) => Command::Schema {
                tool: tool.to_string(),
            },
            // Argument-free commands reject trailing text outright.
            ("disconnect", None) => Command::Disconnect,
            ("list", None) => Command::List,
            ("status", None) => Command::Status,
            _ => Command::Unknown { note: None },
        }
    }

    /// Help text, either the command overview or one command's detail.
    pub fn help_text(&self, topic: Option<&str>) -> String {
        match topic {
            None => GENERAL_HELP.to_string(),
            Some("connect") => concat!(
                "**connect [url] [--token TOKEN] [--token-env-var VAR_NAME]**\n",
                "Connect to an MCP server at the specified URL.\n\n",
                "Examples:\n",
                "```\n",
                "connect http://localhost:8000\n",
                "connect https://mcp-server.example.com --token your-auth-token\n",
                "connect https://mcp-server.example.com --token-env-var MCP_TOKEN\n",
                "```"
            )
            .to_string(),
            Some("disconnect") => {
                "**disconnect**\nDisconnect from the current MCP server.".to_string()
            }
            Some("list") => {
                "**list**\nList available tools on the connected MCP server.".to_string()
            }
            Some("call") => concat!(
                "**call [tool_name] [json_args]**\n",
                "Call a tool with JSON arguments.\n\n",
                "Your parameters are validated against the tool's schema:\n",
                "- Required parameters are checked\n",
                "- Optional parameters are auto-filled from their defaults\n",
                "- Validation failures come back as readable messages\n\n",
                "Example:\n",
                "```\n",
                "call search_models {\"query\": \"stable-diffusion\"}\n",
                "```"
            )
            .to_string(),
            Some("shorthand") => concat!(
                "**shorthand [tool_name] [arg1=value1] [arg2=value2] ...**\n",
                "Call a tool with shorthand syntax.\n\n",
                "Your parameters are validated against the tool's schema:\n",
                "- Required parameters are checked\n",
                "- Optional parameters are auto-filled from their defaults\n",
                "- Validation failures come back as readable messages\n\n",
                "Example:\n",
                "```\n",
                "shorthand search_models query=\"stable-diffusion\"\n",
                "```"
            )
            .to_string(),
            Some("status") => "**status**\nShow current connection status.".to_string(),
            Some("help") => {
                "**help [command]**\nShow help for all commands or a specific command.".to_string()
            }
            Some("schema") => concat!(
                "**schema [tool_name]**\n",
                "Get the schema for a specific tool.\n\n",
                "Returns the full schema for a tool, including all parameters, ",
                "their types, descriptions, and default values.\n\n",
                "Example:\n",
                "```\n",
                "schema text-to-image\n",
                "```"
            )
            .to_string(),
            Some(other) => format!("Unknown command: {other}"),
        }
    }
}

const GENERAL_HELP: &str = concat!(
    "**MCP Client Agent Commands**\n\n",
    "- **connect [url] [--token TOKEN] [--token-env-var VAR_NAME]**\n",
    "  Connect to an MCP server\n\n",
    "- **disconnect**\n",
    "  Disconnect from the current server\n\n",
    "- **list**\n",
    "  List available tools\n\n",
    "- **call [tool_name] [json_args]**\n",
    "  Call a tool with JSON arguments (with automatic parameter validation)\n\n",
    "- **shorthand [tool_name] [arg1=value1] [arg2=value2] ...**\n",
    "  Call a tool with shorthand syntax (with automatic parameter validation)\n\n",
    "- **schema [tool_name]**\n",
    "  Get the full schema for a specific tool\n\n",
    "- **status**\n",
    "  Show connection status\n\n",
    "- **help [command]**\n",
    "  Show help for commands\n\n",
    "Use `help [command]` for more details on a specific command."
);

/// `connect <url> [--token T] [--token-env-var NAME]`, shell-style quoting.
fn parse_connect(line: &str) -> Command {
    let Ok(tokens) = shell_words::split(line) else {
        // Unbalanced quotes. Not worth a dedicated message.
        return Command::Unknown { note: None };
    };
    let url = tokens.first().cloned().unwrap_or_default();
    let mut token = None;
    let mut token_env_var = None;

    let mut i = 1;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "--token" if i + 1 < tokens.len() => {
                token = Some(tokens[i + 1].clone());
                i += 2;
            }
            "--token-env-var" if i + 1 < tokens.len() => {
                token_env_var = Some(tokens[i + 1].clone());
                i += 2;
            }
            // Unrecognized tokens are ignored, not an error.
            _ => i += 1,
        }
    }

    Command::Connect {
        url,
        token,
        token_env_var,
    }
}

/// `call <tool> <jsonObject>`; the payload must be a JSON object.
fn parse_call(line: &str) -> Command {
    let mut parts = line.splitn(2, char::is_whitespace);
    let tool = parts.next().unwrap_or_default();
    let Some(payload) = parts.next().map(str::trim_start).filter(|p| !p.is_empty()) else {
        return Command::Unknown { note: None };
    };

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(args)) => Command::Call {
            tool: tool.to_string(),
            args,
        },
        _ => Command::Unknown {
            note: Some("Invalid JSON arguments".to_string()),
        },
    }
}

/// `shorthand <tool> key=value ...`; pairs that do not match the pair
/// pattern are skipped, so a pairless line yields an empty argument map.
fn parse_shorthand(line: &str) -> Command {
    let mut parts = line.splitn(2, char::is_whitespace);
    let tool = parts.next().unwrap_or_default();
    let Some(pairs) = parts.next() else {
        return Command::Unknown { note: None };
    };

    let mut args = CallArgs::new();
    for caps in SHORTHAND_PAIR.captures_iter(pairs) {
        let Some(key) = caps.get(1) else { continue };
        let value = if let Some(quoted) = caps.get(2).or_else(|| caps.get(3)) {
            // Quoted values stay strings no matter what they contain.
            Value::String(quoted.as_str().to_string())
        } else {
            coerce_bare(caps.get(4).map_or("", |m| m.as_str()))
        };
        args.insert(key.as_str().to_string(), value);
    }

    Command::Shorthand {
        tool: tool.to_string(),
        args,
    }
}

/// Coerce a bare value: all-digit integer, then `-?\d+\.\d+` float, then
/// case-insensitive boolean, else string.
fn coerce_bare(value: &str) -> Value {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = value.parse::<u64>() {
            return Value::from(n);
        }
    }
    if is_float_literal(value) {
        if let Some(n) = value.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    if value.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(value.to_string())
}

/// `-?\d+\.\d+` without pulling a regex into the hot path.
fn is_float_literal(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let Some((whole, frac)) = digits.split_once('.') else {
        return false;
    };
    !whole.is_empty()
        && !frac.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}
