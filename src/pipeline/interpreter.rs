//! Result interpreter
//!
//! Second model call of a turn: the original question plus a text rendering
//! of the rows, answered in plain language.

use crate::db::QueryResults;
use crate::error::LlmError;
use crate::llm::LanguageModel;
use std::fmt;

/// Said when a query matched nothing and the model could not phrase it.
pub const NO_DATA_ANSWER: &str = "I couldn't find any data matching your question.";

/// Longest cell value passed to the model, in characters
const MAX_CELL_LEN: usize = 500;

/// Natural-language answer to a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer(String);

impl Answer {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the interpretation prompt.
pub fn build_prompt(question: &str, results_text: &str) -> String {
    format!(
        "You are an expert data analyst. Answer the user's question clearly, accurately and \
concisely using only the data below.

User question:
{question}

Data:
{results_text}

Rules:
- Base your answer only on the data above. Do not guess or add outside facts.
- Do not mention SQL, queries, tables, columns or database internals.
- Respond in plain natural language that directly answers the question.
- If the data is empty or does not contain enough information, say so politely.",
        question = question.trim(),
    )
}

/// Turn query results into an answer to `question`.
///
/// An empty result is a normal outcome: the model is still asked to phrase
/// it, and if it cannot, [`NO_DATA_ANSWER`] is returned instead of an error.
///
/// # Errors
/// Returns the model error for non-empty results
pub async fn interpret<L: LanguageModel>(
    llm: &L,
    question: &str,
    results: &QueryResults,
    max_rows: usize,
) -> Result<Answer, LlmError> {
    let prompt = build_prompt(question, &results.to_prompt_text(max_rows, MAX_CELL_LEN));

    match llm.generate(&prompt).await {
        Ok(text) if !text.trim().is_empty() => Ok(Answer(text.trim().to_string())),
        Ok(_) | Err(LlmError::EmptyResponse) if results.is_empty() => {
            Ok(Answer(NO_DATA_ANSWER.to_string()))
        }
        Ok(_) => Err(LlmError::EmptyResponse),
        Err(e) if results.is_empty() => {
            tracing::warn!(error = %e, "interpretation failed for empty result, using fallback");
            Ok(Answer(NO_DATA_ANSWER.to_string()))
        }
        Err(e) => Err(e),
    }
}
