//! Error types for talkgres
//!
//! This module defines the error hierarchy used throughout the application.
//! We use `thiserror` for library-style errors with clear error chains.
//!
//! Only [`DbError::SchemaLoadFailed`] and a lost connection end a session.
//! Everything grouped under [`TurnError`] is reported and the loop carries on.

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Schema introspection failed
    #[error("Schema loading failed: {0}")]
    SchemaLoadFailed(String),

    /// Not connected to a database
    #[error("Not connected to database")]
    NotConnected,

    /// The background connection task reported a failure
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file not found
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Connection profile not found
    #[error("Connection profile '{0}' not found")]
    ProfileNotFound(String),

    /// Required environment variable is not set
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Unknown command
    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),

    /// Missing required argument
    #[error("Missing required argument for command")]
    MissingArgument,

    /// Invalid argument
    #[error("Invalid argument: {0} (expected on or off)")]
    InvalidArgument(String),
}

/// Errors from the language-generation service
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure (DNS, TLS, timeout, ...)
    #[error("Request failed: {0}")]
    Request(String),

    /// Non-success HTTP status
    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Response decoded but carried no text
    #[error("Model returned no text")]
    EmptyResponse,
}

/// The model could not produce a single usable statement
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The model explicitly declined (or returned nothing)
    #[error("Not able to generate a query for that question")]
    Declined,

    /// The model answered, but not with exactly one bare statement
    #[error("Model response was not a single statement: {reason}")]
    Malformed { reason: String },

    /// The request to the model failed
    #[error("Query generation failed: {0}")]
    Model(#[from] LlmError),
}

/// Why the execution guard refused a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing left after stripping comments and whitespace
    Empty,
    /// Statement does not start with a retrieval keyword
    NotReadOnly { keyword: String },
    /// A data-modifying keyword appears somewhere in the body
    ForbiddenKeyword { keyword: String },
    /// More than one statement separated by `;`
    MultipleStatements,
    /// `/*` without a matching `*/`
    UnterminatedComment,
    /// Quote or dollar-quote without a closing delimiter
    UnterminatedLiteral,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "statement is empty"),
            RejectReason::NotReadOnly { keyword } => {
                write!(f, "statement starts with {} instead of SELECT", keyword)
            }
            RejectReason::ForbiddenKeyword { keyword } => {
                write!(f, "statement contains data-modifying keyword {}", keyword)
            }
            RejectReason::MultipleStatements => write!(f, "more than one statement"),
            RejectReason::UnterminatedComment => write!(f, "unterminated block comment"),
            RejectReason::UnterminatedLiteral => write!(f, "unterminated quoted text"),
        }
    }
}

/// A statement refused by the execution guard
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Query rejected: {reason}")]
pub struct RejectedQuery {
    pub reason: RejectReason,
}

/// Text-to-speech or playback failure
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Speech service call failed
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    /// Audio bytes could not be turned into samples
    #[error("Invalid audio data: {0}")]
    Decode(String),

    /// No output device, or playback aborted
    #[error("Audio playback failed: {0}")]
    Playback(String),
}

/// Any failure confined to a single question/answer turn
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Rejected(#[from] RejectedQuery),

    #[error("Error executing query: {0}")]
    Execution(DbError),

    #[error("Could not interpret the result: {0}")]
    Interpretation(LlmError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized Result type for command operations
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Specialized Result type for language model calls
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Specialized Result type for audio output
pub type RenderResult<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_carries_server_message() {
        let err = TurnError::Execution(DbError::QueryFailed(
            "column \"nme\" does not exist".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Error executing query: Query execution failed: column \"nme\" does not exist"
        );
    }

    #[test]
    fn test_rejection_message_names_keyword() {
        let err = RejectedQuery {
            reason: RejectReason::ForbiddenKeyword {
                keyword: "DROP".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Query rejected: statement contains data-modifying keyword DROP"
        );
    }

    #[test]
    fn test_declined_and_malformed_are_distinct() {
        let declined = SynthesisError::Declined.to_string();
        let malformed = SynthesisError::Malformed {
            reason: "code fence".to_string(),
        }
        .to_string();
        assert_ne!(declined, malformed);
    }
}
