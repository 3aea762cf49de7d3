//! Command parsing
//!
//! Lines starting with `/` at the question prompt are commands rather than
//! questions (e.g. `/schema`, `/voice off`).

use crate::error::{CommandError, CommandResult};

/// Commands accepted at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the schema description the model sees
    Schema,

    /// Toggle echoing the synthesized statement
    ShowSql(bool),

    /// Toggle spoken answers
    Voice(bool),

    /// Show help
    Help,

    /// End the session
    Quit,
}

/// Help text printed for `/help`
pub const HELP_TEXT: &str = "\
Ask a question about the database in plain language, or use a command:
  /schema          show the tables and columns available
  /sql on|off      show the generated query before running it
  /voice on|off    speak answers aloud
  /help            show this help
  /quit            end the session (same as typing exit)";

/// Whether `input` should be parsed as a command
pub fn is_command(input: &str) -> bool {
    input.trim_start().starts_with('/')
}

/// Parse a command string into a Command enum
pub fn parse_command(input: &str) -> CommandResult<Command> {
    let input = input.trim();
    let input = input.strip_prefix('/').unwrap_or(input);
    let parts: Vec<&str> = input.split_whitespace().collect();

    let Some(&name) = parts.first() else {
        return Err(CommandError::Unknown(String::new()));
    };

    match name.to_ascii_lowercase().as_str() {
        "schema" | "s" => Ok(Command::Schema),
        "sql" => parse_toggle(parts.get(1).copied()).map(Command::ShowSql),
        "voice" | "v" => parse_toggle(parts.get(1).copied()).map(Command::Voice),
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        unknown => Err(CommandError::Unknown(unknown.to_string())),
    }
}

fn parse_toggle(arg: Option<&str>) -> CommandResult<bool> {
    match arg.map(str::to_ascii_lowercase).as_deref() {
        Some("on") | Some("true") | Some("yes") => Ok(true),
        Some("off") | Some("false") | Some("no") => Ok(false),
        Some(other) => Err(CommandError::InvalidArgument(other.to_string())),
        None => Err(CommandError::MissingArgument),
    }
}
