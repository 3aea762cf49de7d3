//! Session loop
//!
//! Reads one question at a time and drives it through
//! `Synthesizing → Authorizing → Executing → Interpreting → Rendering`,
//! returning to `AwaitingInput` after every turn whatever the outcome.
//! Only the exit token, end of input, an I/O failure on the terminal, or a
//! lost database connection moves the session to `Closed`, and the
//! connection is released exactly once on every one of those paths.

use crate::commands::{Command, HELP_TEXT, is_command, parse_command};
use crate::config::Settings;
use crate::db::{Database, SchemaDescriptor};
use crate::error::{DbError, DbResult, TurnError};
use crate::llm::LanguageModel;
use crate::pipeline::{Answer, interpret, synthesize};
use crate::sql::{AuthorizedQuery, authorize, format_sql};
use crate::voice::Renderer;
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Prompt printed before each question
pub const PROMPT: &str = "Please enter your query: ";

/// Printed once when the connection is released
pub const CLOSED_MESSAGE: &str = "Database connection closed.";

/// Reply to `/voice on` when no speech backend was configured
pub const VOICE_UNAVAILABLE: &str = "Voice is not available: no speech service key is set.";

/// Where the session is in the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Synthesizing,
    Authorizing,
    Executing,
    Interpreting,
    Rendering,
    Closed,
}

/// Why the session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// User typed the exit token or `/quit`
    Exit,
    /// Input stream reached EOF
    EndOfInput,
    /// The database connection dropped
    ConnectionLost(String),
}

/// Per-session switches, taken from [`Settings`]
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub exit_token: String,
    pub show_sql: bool,
    pub voice: bool,
    /// A speech backend exists; without one `/voice on` is refused
    pub voice_available: bool,
    pub prompt_row_limit: usize,
}

impl From<&Settings> for SessionOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            exit_token: settings.exit_token.clone(),
            show_sql: settings.show_sql,
            voice: settings.voice,
            voice_available: true,
            prompt_row_limit: settings.prompt_row_limit,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Conversation state: the live connection, the schema snapshot, and the
/// services each turn calls.
pub struct Session<D, L, R> {
    db: Option<D>,
    schema: SchemaDescriptor,
    llm: L,
    renderer: R,
    options: SessionOptions,
    conn_lost: Option<mpsc::UnboundedReceiver<String>>,
    state: SessionState,
}

impl<D, L, R> Session<D, L, R>
where
    D: Database,
    L: LanguageModel,
    R: Renderer,
{
    /// Start a session over an already loaded schema.
    pub fn new(
        db: D,
        schema: SchemaDescriptor,
        llm: L,
        renderer: R,
        options: SessionOptions,
    ) -> Self {
        Self {
            db: Some(db),
            schema,
            llm,
            renderer,
            options,
            conn_lost: None,
            state: SessionState::AwaitingInput,
        }
    }

    /// Load the schema and start a session.
    ///
    /// # Errors
    /// Returns `DbError::SchemaLoadFailed` if introspection fails; the
    /// connection is closed before returning.
    pub async fn open(db: D, llm: L, renderer: R, options: SessionOptions) -> DbResult<Self> {
        match db.introspect_schema().await {
            Ok(schema) => {
                if schema.is_empty() {
                    tracing::warn!("no tables found in the public schema");
                }
                Ok(Self::new(db, schema, llm, renderer, options))
            }
            Err(e) => {
                if let Err(close_err) = db.close().await {
                    tracing::warn!(error = %close_err, "failed to close connection");
                }
                Err(e)
            }
        }
    }

    /// Watch the background connection task; a message ends the session.
    pub fn with_connection_monitor(mut self, conn_lost: mpsc::UnboundedReceiver<String>) -> Self {
        self.conn_lost = Some(conn_lost);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Run the loop until exit, EOF or connection loss, then release the
    /// connection.
    ///
    /// # Errors
    /// Only I/O errors on `input`/`out` are returned; the connection is
    /// still released first.
    pub async fn run<I: BufRead, W: Write>(
        mut self,
        mut input: I,
        out: &mut W,
    ) -> io::Result<SessionEnd> {
        let result = self.drive(&mut input, out).await;
        self.close().await;
        let end = result?;
        writeln!(out, "{}", CLOSED_MESSAGE)?;
        tracing::info!(?end, "session closed");
        Ok(end)
    }

    async fn drive<I: BufRead, W: Write>(
        &mut self,
        input: &mut I,
        out: &mut W,
    ) -> io::Result<SessionEnd> {
        let mut line = String::new();
        loop {
            if let Some(reason) = self.connection_lost() {
                writeln!(out, "{}", DbError::ConnectionLost(reason.clone()))?;
                return Ok(SessionEnd::ConnectionLost(reason));
            }

            self.state = SessionState::AwaitingInput;
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                return Ok(SessionEnd::EndOfInput);
            }
            let question = line.trim();

            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case(self.options.exit_token.trim()) {
                return Ok(SessionEnd::Exit);
            }
            if is_command(question) {
                match parse_command(question) {
                    Ok(Command::Quit) => return Ok(SessionEnd::Exit),
                    Ok(command) => self.apply_command(command, out)?,
                    Err(e) => writeln!(out, "{}", e)?,
                }
                continue;
            }

            self.turn(question, out).await?;
        }
    }

    /// One question, start to finish. Every failure is reported on `out`.
    async fn turn<W: Write>(&mut self, question: &str, out: &mut W) -> io::Result<()> {
        let query = match self.prepare(question).await {
            Ok(query) => query,
            Err(e) => return self.report(out, e),
        };

        if self.options.show_sql {
            writeln!(out, "{}", format_sql(query.as_str()))?;
        }

        let answer = match self.answer(question, &query).await {
            Ok(answer) => answer,
            Err(e) => return self.report(out, e),
        };
        writeln!(out, "Output: {}", answer)?;

        if self.options.voice {
            self.state = SessionState::Rendering;
            if let Err(e) = self.renderer.render(answer.as_str()).await {
                self.report(out, TurnError::Render(e))?;
            }
        }

        self.state = SessionState::AwaitingInput;
        Ok(())
    }

    /// Synthesize a statement for `question` and pass it through the guard.
    ///
    /// # Errors
    /// `TurnError::Synthesis` or `TurnError::Rejected`
    pub async fn prepare(&mut self, question: &str) -> Result<AuthorizedQuery, TurnError> {
        self.state = SessionState::Synthesizing;
        let candidate = synthesize(&self.llm, question, &self.schema).await?;

        self.state = SessionState::Authorizing;
        Ok(authorize(candidate)?)
    }

    /// Execute an authorized statement and interpret its rows.
    ///
    /// # Errors
    /// `TurnError::Execution` (the interpreter is not called) or
    /// `TurnError::Interpretation`
    pub async fn answer(
        &mut self,
        question: &str,
        query: &AuthorizedQuery,
    ) -> Result<Answer, TurnError> {
        self.state = SessionState::Executing;
        let db = self
            .db
            .as_ref()
            .ok_or(TurnError::Execution(DbError::NotConnected))?;
        let results = db
            .execute_query(query)
            .await
            .map_err(TurnError::Execution)?;
        tracing::debug!(
            rows = results.row_count,
            elapsed = ?results.execution_time,
            "query executed"
        );

        self.state = SessionState::Interpreting;
        interpret(
            &self.llm,
            question,
            &results,
            self.options.prompt_row_limit,
        )
        .await
        .map_err(TurnError::Interpretation)
    }

    fn report<W: Write>(&mut self, out: &mut W, err: TurnError) -> io::Result<()> {
        tracing::warn!(state = ?self.state, error = %err, "turn failed");
        self.state = SessionState::AwaitingInput;
        writeln!(out, "{}", err)
    }

    fn apply_command<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<()> {
        match command {
            Command::Schema => write!(out, "{}", self.schema.describe())?,
            Command::ShowSql(on) => {
                self.options.show_sql = on;
                writeln!(out, "SQL echo {}.", if on { "on" } else { "off" })?;
            }
            Command::Voice(true) if !self.options.voice_available => {
                writeln!(out, "{}", VOICE_UNAVAILABLE)?;
            }
            Command::Voice(on) => {
                self.options.voice = on;
                writeln!(out, "Voice {}.", if on { "on" } else { "off" })?;
            }
            Command::Help => writeln!(out, "{}", HELP_TEXT)?,
            Command::Quit => {}
        }
        Ok(())
    }

    fn connection_lost(&mut self) -> Option<String> {
        let rx = self.conn_lost.as_mut()?;
        match rx.try_recv() {
            Ok(reason) => Some(reason),
            Err(TryRecvError::Disconnected) => Some("connection closed by server".to_string()),
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Release the connection. Later calls are no-ops.
    async fn close(&mut self) {
        self.state = SessionState::Closed;
        if let Some(db) = self.db.take() {
            if let Err(e) = db.close().await {
                tracing::warn!(error = %e, "failed to close connection");
            }
        }
    }
}
