//! Command parsing
//!
//! Handles the slash-commands accepted at the question prompt.

pub mod parser;

pub use parser::{Command, HELP_TEXT, is_command, parse_command};
