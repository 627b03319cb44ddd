//! Command parsing for the tooltalk chat surface.
//!
//! Two front doors lead to the same command vocabulary: [`CommandParser`]
//! handles structured `!`-prefixed lines, and [`PhraseRecognizer`] maps a
//! small set of natural-language phrases onto the same commands. Both are
//! pure text adapters; neither touches a session or a network.

pub mod parser;
pub mod recognizer;

pub use parser::{Command, CommandParser, ParsedCommand, COMMAND_MARKER};
pub use recognizer::PhraseRecognizer;

/// Compile a pattern that is a source-code literal.
///
/// Panics on an invalid pattern, which can only happen while editing this
/// crate; every pattern is exercised by the tests below it.
pub(crate) fn compiled(pattern: &str) -> regex::Regex {
    match regex::Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("built-in pattern {pattern:?} does not compile: {err}"),
    }
}
