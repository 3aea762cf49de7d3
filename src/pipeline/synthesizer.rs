//! Query synthesizer
//!
//! Turns a question plus the schema description into exactly one raw SQL
//! statement. The model's reply is validated, never cleaned up: fenced
//! blocks or prose around the statement fail the turn with
//! [`SynthesisError::Malformed`]. A second statement is left for the
//! execution guard, which refuses it.

use crate::db::SchemaDescriptor;
use crate::error::{LlmError, RejectReason, SynthesisError};
use crate::llm::LanguageModel;
use crate::sql::CandidateQuery;
use crate::sql::guard::strip_comments_and_literals;

/// Reply the model is told to give when the schema cannot answer the question
pub const DECLINE_SENTINEL: &str = "FAILED";

/// First words a bare SQL statement can start with. Anything else is prose.
/// Data-modifying commands are listed on purpose: they are well-formed
/// statements and the guard, not this check, turns them away.
const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "TABLE", "EXPLAIN", "SHOW", "INSERT", "UPDATE", "DELETE",
    "DROP", "ALTER", "CREATE", "TRUNCATE", "MERGE", "GRANT", "REVOKE", "COPY", "CALL", "DO",
    "SET", "BEGIN", "COMMIT", "ROLLBACK", "VACUUM",
];

/// Words that may open a later paragraph of the same statement.
const CLAUSE_KEYWORDS: &[&str] = &[
    "FROM", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "FETCH", "WINDOW", "JOIN",
    "LEFT", "RIGHT", "INNER", "OUTER", "FULL", "CROSS", "NATURAL", "LATERAL", "ON", "USING",
    "AND", "OR", "UNION", "INTERSECT", "EXCEPT", "DISTINCT", "CASE", "WHEN", "END",
];

/// Build the statement-generation prompt.
pub fn build_prompt(question: &str, schema: &SchemaDescriptor) -> String {
    format!(
        "You are a SQL generation assistant. Convert the user's question into a single, \
efficient and accurate SQL query for a PostgreSQL database.

Rules:
- Output exactly one SQL statement and nothing else.
- Do not explain, comment on, or introduce the query. No text like \"Here is your query:\".
- Do not wrap the query in markdown or code fences such as ```sql.
- Use ONLY the tables and columns listed in the schema below. Never invent tables or columns.
- Generate read-only SELECT statements only. Never generate INSERT, UPDATE, DELETE, DROP, \
ALTER, TRUNCATE, CREATE or any other statement that modifies data or structure.
- If the question is ambiguous, make the most reasonable assumption based on the schema.
- If the question cannot be answered from this schema, reply with exactly {sentinel}

Database schema:
{schema}
Question: {question}",
        sentinel = DECLINE_SENTINEL,
        schema = schema.describe(),
        question = question.trim(),
    )
}

/// Ask the model for a statement answering `question`.
///
/// # Errors
/// `Declined` when the model gives up, `Malformed` when the reply is not a
/// single bare statement, `Model` when the request itself fails.
pub async fn synthesize<L: LanguageModel>(
    llm: &L,
    question: &str,
    schema: &SchemaDescriptor,
) -> Result<CandidateQuery, SynthesisError> {
    let prompt = build_prompt(question, schema);
    let raw = match llm.generate(&prompt).await {
        Ok(raw) => raw,
        Err(LlmError::EmptyResponse) => return Err(SynthesisError::Declined),
        Err(e) => return Err(SynthesisError::Model(e)),
    };
    let query = validate_response(&raw)?;
    tracing::debug!(sql = %query, "synthesized statement");
    Ok(query)
}

/// Check that a model reply is exactly one bare statement.
pub fn validate_response(raw: &str) -> Result<CandidateQuery, SynthesisError> {
    let text = raw.trim();

    if text.is_empty() || is_decline(text) {
        return Err(SynthesisError::Declined);
    }

    if text.contains("```") {
        return Err(malformed("response is wrapped in a code fence"));
    }

    let code = strip_comments_and_literals(text).map_err(|reason| match reason {
        RejectReason::UnterminatedComment => malformed("unterminated comment"),
        _ => malformed("unterminated quoted text"),
    })?;

    // A second statement is passed on for the guard to refuse; prose is not
    if let Some((_, after)) = code.split_once(';') {
        let after = after.trim();
        if !after.is_empty() && !looks_like_statement(after) {
            return Err(malformed("text after the statement"));
        }
    }

    if !looks_like_statement(&code) {
        return Err(malformed("text before the statement"));
    }

    if has_trailing_prose(&code) {
        return Err(malformed("text after the statement"));
    }

    Ok(CandidateQuery::new(text))
}

fn malformed(reason: &str) -> SynthesisError {
    SynthesisError::Malformed {
        reason: reason.to_string(),
    }
}

fn is_decline(text: &str) -> bool {
    text.trim_end_matches(['.', '!'])
        .eq_ignore_ascii_case(DECLINE_SENTINEL)
}

fn leading_word(code: &str) -> String {
    code.trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn looks_like_statement(code: &str) -> bool {
    STATEMENT_KEYWORDS.contains(&leading_word(code).as_str())
}

/// Prose after a statement that has no `;`: a blank-line separated
/// paragraph that does not carry on the statement, or a sentence ending.
/// `code` has comments and literals already stripped.
fn has_trailing_prose(code: &str) -> bool {
    let paragraphs = paragraphs(code);
    let broken = paragraphs
        .windows(2)
        .any(|pair| !left_open(&pair[0]) && !continues_statement(&pair[1]));
    broken || ends_a_sentence(code)
}

fn paragraphs(code: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for line in code.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// The paragraph ends mid-clause, e.g. on `,` or a keyword like `SELECT`.
fn left_open(paragraph: &str) -> bool {
    let tail = paragraph.trim_end();
    if tail.ends_with(|c: char| ",(=<>+-*/|".contains(c)) {
        return true;
    }
    let last_word = tail
        .rsplit(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    [CLAUSE_KEYWORDS, STATEMENT_KEYWORDS]
        .iter()
        .any(|keywords| keywords.contains(&last_word.as_str()))
}

fn continues_statement(paragraph: &str) -> bool {
    let starts_with_word = paragraph
        .trim_start()
        .starts_with(|c: char| c.is_ascii_alphabetic());
    if !starts_with_word {
        // `)`, `,`, operators, placeholders of stripped literals
        return true;
    }
    let word = leading_word(paragraph);
    [CLAUSE_KEYWORDS, STATEMENT_KEYWORDS]
        .iter()
        .any(|keywords| keywords.contains(&word.as_str()))
}

/// A `.` followed by whitespace or the end of the reply. Qualified names
/// (`c.name`) and decimals (`1.5`, `2. `) do not count.
fn ends_a_sentence(code: &str) -> bool {
    let chars: Vec<char> = code.trim_end().trim_end_matches(';').chars().collect();
    chars.iter().enumerate().any(|(i, &c)| {
        c == '.'
            && i > 0
            && !chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_none_or(|next| next.is_whitespace())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnRecord, ConstraintKind, KeyConstraint};

    fn customers_schema() -> SchemaDescriptor {
        SchemaDescriptor::from_records(vec![
            ColumnRecord::new("customers", "id", "integer").with_key(KeyConstraint {
                name: "customers_pkey".to_string(),
                kind: ConstraintKind::PrimaryKey,
                references: None,
            }),
            ColumnRecord::new("customers", "name", "text"),
        ])
    }

    fn malformed_reason(raw: &str) -> String {
        match validate_response(raw) {
            Err(SynthesisError::Malformed { reason }) => reason,
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_prompt_embeds_schema_question_and_rules() {
        let prompt = build_prompt("  How many customers are there? ", &customers_schema());
        assert!(prompt.contains("Table customers:"));
        assert!(prompt.contains("  - id integer [customers_pkey (PRIMARY KEY)]"));
        assert!(prompt.contains("Question: How many customers are there?"));
        assert!(prompt.contains("reply with exactly FAILED"));
        assert!(prompt.contains("Never generate INSERT, UPDATE, DELETE, DROP"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_prompt("q", &customers_schema());
        let b = build_prompt("q", &customers_schema());
        assert_eq!(a, b);
    }

    #[test]
    fn test_accepts_bare_statement() {
        let query = validate_response("SELECT COUNT(*) FROM customers;").unwrap();
        assert_eq!(query.as_str(), "SELECT COUNT(*) FROM customers;");
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        let query = validate_response("\n  SELECT name\n  FROM customers\n").unwrap();
        assert_eq!(query.as_str(), "SELECT name\n  FROM customers");
    }

    #[test]
    fn test_accepts_leading_comment_and_cte() {
        assert!(validate_response("-- total\nSELECT 1").is_ok());
        assert!(validate_response("WITH x AS (SELECT 1) SELECT * FROM x").is_ok());
    }

    #[test]
    fn test_decline_sentinel() {
        for raw in ["FAILED", "failed", " Failed. ", ""] {
            assert!(
                matches!(validate_response(raw), Err(SynthesisError::Declined)),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_code_fence_rejected_not_stripped() {
        assert_eq!(
            malformed_reason("```sql\nSELECT COUNT(*) FROM customers;\n```"),
            "response is wrapped in a code fence"
        );
    }

    #[test]
    fn test_leading_prose_rejected() {
        assert_eq!(
            malformed_reason("Here is your query: SELECT COUNT(*) FROM customers;"),
            "text before the statement"
        );
    }

    #[test]
    fn test_trailing_prose_rejected() {
        assert_eq!(
            malformed_reason("SELECT COUNT(*) FROM customers; This counts every customer."),
            "text after the statement"
        );
    }

    #[test]
    fn test_prose_after_blank_line_rejected() {
        assert_eq!(
            malformed_reason(concat!(
                "SELECT COUNT(*) FROM customers\n\n",
                "This query counts all rows in the customers table."
            )),
            "text after the statement"
        );
        assert_eq!(
            malformed_reason("SELECT COUNT(*) FROM customers\n\nHope this helps"),
            "text after the statement"
        );
    }

    #[test]
    fn test_sentence_after_statement_rejected() {
        assert_eq!(
            malformed_reason("SELECT COUNT(*) FROM customers\nIt counts every customer."),
            "text after the statement"
        );
    }

    #[test]
    fn test_statement_split_over_paragraphs_accepted() {
        assert!(validate_response("SELECT name\n\nFROM customers\n\nWHERE id = 1").is_ok());
        assert!(validate_response("SELECT id,\n\n  name FROM customers").is_ok());
        assert!(validate_response("SELECT\n\nname FROM customers").is_ok());
        assert!(validate_response("SELECT 1\n\n-- counted.\n").is_ok());
    }

    #[test]
    fn test_dots_in_sql_are_not_sentences() {
        assert!(
            validate_response("SELECT c.name FROM customers c WHERE c.balance > 1.5").is_ok()
        );
        assert!(validate_response("SELECT * FROM customers WHERE name = 'Smith Jr.'").is_ok());
        assert!(validate_response("SELECT \"public\".\"customers\".id FROM customers").is_ok());
    }

    #[test]
    fn test_second_statement_left_to_guard() {
        let query = validate_response("SELECT * FROM customers; DROP TABLE customers;").unwrap();
        assert_eq!(query.as_str(), "SELECT * FROM customers; DROP TABLE customers;");
    }

    #[test]
    fn test_semicolon_in_literal_is_fine() {
        assert!(validate_response("SELECT * FROM customers WHERE name = 'a;b'").is_ok());
    }

    #[test]
    fn test_unterminated_literal_is_malformed() {
        assert_eq!(
            malformed_reason("SELECT 'oops FROM customers"),
            "unterminated quoted text"
        );
    }

    #[test]
    fn test_data_modifying_statement_passes_shape_check() {
        // Shape is fine; the guard is what refuses it.
        assert!(validate_response("DROP TABLE customers;").is_ok());
    }
}
