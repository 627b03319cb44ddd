//! Natural-language phrase recognition.
//!
//! A fixed, ordered list of phrase patterns maps conversational text onto
//! the same commands the structured parser produces. The first matching
//! pattern wins. Matching is case-insensitive, but tool names and argument
//! text are re-extracted from the original input so URLs and string
//! arguments keep their case. Phrases are rewritten to their structured
//! form and fed through [`CommandParser`], so the two front doors cannot
//! drift apart in how arguments are interpreted.

use regex::{Captures, Regex};

use crate::compiled;
use crate::parser::{CommandParser, ParsedCommand};

/// Example phrases offered when a message is not understood, and in the
/// session welcome.
const EXAMPLE_PHRASES: [&str; 6] = [
    "list tools",
    "call tool_name {\"param\": \"value\"}",
    "schema tool_name",
    "status",
    "help",
    "disconnect",
];

struct Rule {
    pattern: Regex,
    rewrite: fn(&Captures) -> String,
}

/// Recognizer for conversational command phrases.
///
/// Holds its own [`CommandParser`] so recognized phrases and structured
/// commands share one grammar for arguments.
pub struct PhraseRecognizer {
    parser: CommandParser,
    rules: Vec<Rule>,
}

impl PhraseRecognizer {
    /// Build the recognizer with its fixed pattern table.
    pub fn new() -> Self {
        let rules = vec![
            Rule {
                pattern: compiled(r"(?i)^disconnect$"),
                rewrite: |_| "!disconnect".to_string(),
            },
            Rule {
                pattern: compiled(r"(?i)^list tools$"),
                rewrite: |_| "!list".to_string(),
            },
            Rule {
                pattern: compiled(r"(?i)^call\s+(\S+)\s+(.+)$"),
                rewrite: |caps| {
                    format!("!call {} {}", group(caps, 1).trim(), group(caps, 2).trim())
                },
            },
            Rule {
                pattern: compiled(r"(?i)^status$"),
                rewrite: |_| "!status".to_string(),
            },
            Rule {
                pattern: compiled(r"(?i)^help(?:\s+(\S+))?$"),
                rewrite: |caps| match caps.get(1) {
                    Some(topic) => format!("!help {}", topic.as_str()),
                    None => "!help".to_string(),
                },
            },
            Rule {
                pattern: compiled(r"(?i)^schema\s+(\S+)$"),
                rewrite: |caps| format!("!schema {}", group(caps, 1).trim()),
            },
        ];
        Self {
            parser: CommandParser::new(),
            rules,
        }
    }

    /// Try to recognize a conversational phrase.
    ///
    /// Returns `None` when no pattern matches; the caller decides what a
    /// non-command message means. A matched phrase always yields a parsed
    /// command, though a bad argument payload (say, broken JSON after
    /// `call`) produces the same `Unknown` the structured parser would.
    pub fn recognize(&self, text: &str) -> Option<ParsedCommand> {
        let trimmed = text.trim();
        self.rules.iter().find_map(|rule| {
            rule.pattern
                .captures(trimmed)
                .map(|caps| self.parser.parse(&(rule.rewrite)(&caps)))
        })
    }

    /// Phrases worth suggesting to a user.
    pub fn examples() -> &'static [&'static str] {
        &EXAMPLE_PHRASES
    }
}

impl Default for PhraseRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map_or("", |m| m.as_str())
}
