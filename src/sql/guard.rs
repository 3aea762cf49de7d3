//! Execution guard
//!
//! Lexical read-only check applied to every synthesized statement before it
//! reaches the database. It is not a parser: anything it cannot classify
//! with confidence is rejected.
//!
//! Checks, in order:
//! 1. No DML or DDL verb anywhere in the raw text, including inside
//!    comments, quoted identifiers and string literals.
//! 2. Comments and literals are well formed.
//! 3. No other writing command in the statement's code. Literals and
//!    comments are exempt here, so `'Copy paper'` is fine.
//! 4. Exactly one statement (a single trailing `;` is allowed).
//! 5. The first keyword is `SELECT` or `WITH`.

use crate::error::{RejectReason, RejectedQuery};
use crate::sql::query::{AuthorizedQuery, CandidateQuery};

/// Keywords that may not appear anywhere in an authorized statement, not
/// even inside a literal or comment.
pub const FORBIDDEN_KEYWORDS: &[&str] = &["INSERT", "UPDATE", "DELETE", "DROP", "ALTER"];

/// Keywords refused in the statement's code but allowed inside literals.
///
/// `INTO` blocks `SELECT ... INTO new_table`; the rest cover DDL, privilege
/// changes and bulk copies.
pub const FORBIDDEN_COMMANDS: &[&str] =
    &["TRUNCATE", "MERGE", "CREATE", "GRANT", "REVOKE", "COPY", "INTO"];

/// Keywords a statement may start with.
const RETRIEVAL_KEYWORDS: &[&str] = &["SELECT", "WITH"];

/// Accept `query` only if it is a single read-only statement.
///
/// # Errors
/// Returns `RejectedQuery` describing the first check that failed
pub fn authorize(query: CandidateQuery) -> Result<AuthorizedQuery, RejectedQuery> {
    match check(query.as_str()) {
        Ok(()) => Ok(AuthorizedQuery::new(query)),
        Err(reason) => {
            tracing::warn!(%reason, sql = %query, "statement rejected by guard");
            Err(RejectedQuery { reason })
        }
    }
}

fn check(sql: &str) -> Result<(), RejectReason> {
    if let Some(keyword) = find_keyword(sql, FORBIDDEN_KEYWORDS) {
        return Err(RejectReason::ForbiddenKeyword { keyword });
    }

    let code = strip_comments_and_literals(sql)?;
    if let Some(keyword) = find_keyword(&code, FORBIDDEN_COMMANDS) {
        return Err(RejectReason::ForbiddenKeyword { keyword });
    }

    let body = code.trim();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();

    if body.is_empty() {
        return Err(RejectReason::Empty);
    }
    if body.contains(';') {
        return Err(RejectReason::MultipleStatements);
    }

    let leading = leading_keyword(body);
    if RETRIEVAL_KEYWORDS.contains(&leading.as_str()) {
        Ok(())
    } else {
        Err(RejectReason::NotReadOnly { keyword: leading })
    }
}

/// First word of `sql` found in `keywords`, matched case-insensitively on
/// word boundaries (`last_update` or `deleted` do not match).
fn find_keyword(sql: &str, keywords: &[&str]) -> Option<String> {
    sql.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_uppercase)
        .find(|word| keywords.contains(&word.as_str()))
}

/// Upper-cased first word of `body`, skipping opening parentheses.
fn leading_keyword(body: &str) -> String {
    let rest = body.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let word: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if word.is_empty() {
        rest.chars().next().map(String::from).unwrap_or_default()
    } else {
        word.to_ascii_uppercase()
    }
}

/// Replace comments with a space and every quoted token with an empty
/// placeholder, leaving only the statement's structure.
pub(crate) fn strip_comments_and_literals(sql: &str) -> Result<String, RejectReason> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                out.push(' ');
            }
            '/' if next == Some('*') => {
                // Block comments nest in PostgreSQL
                let mut depth = 1;
                i += 2;
                while depth > 0 {
                    match (chars.get(i), chars.get(i + 1)) {
                        (None, _) => return Err(RejectReason::UnterminatedComment),
                        (Some('/'), Some('*')) => {
                            depth += 1;
                            i += 2;
                        }
                        (Some('*'), Some('/')) => {
                            depth -= 1;
                            i += 2;
                        }
                        _ => i += 1,
                    }
                }
                out.push(' ');
            }
            '\'' => {
                let escapes = is_escape_string_prefix(&chars, i);
                i = skip_quoted(&chars, i, '\'', escapes)?;
                out.push_str("''");
            }
            '"' => {
                i = skip_quoted(&chars, i, '"', false)?;
                out.push_str("\"\"");
            }
            '$' => match dollar_tag_len(&chars, i) {
                Some(tag_len) => {
                    i = skip_dollar_quoted(&chars, i, tag_len)?;
                    out.push_str("''");
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(out)
}

/// `E'...'` strings treat backslash as an escape character.
fn is_escape_string_prefix(chars: &[char], quote: usize) -> bool {
    if quote == 0 || !matches!(chars[quote - 1], 'E' | 'e') {
        return false;
    }
    // The E must stand alone, not end an identifier like `name'...'`
    quote == 1 || !is_ident_char(chars[quote - 2])
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Index just past the closing `delim` of a token opened at `start`.
/// A doubled delimiter is an escaped delimiter.
fn skip_quoted(
    chars: &[char],
    start: usize,
    delim: char,
    backslash_escapes: bool,
) -> Result<usize, RejectReason> {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if backslash_escapes && c == '\\' {
            i += 2;
            continue;
        }
        if c == delim {
            if chars.get(i + 1) == Some(&delim) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(RejectReason::UnterminatedLiteral)
}

/// Length of a dollar-quote tag (`$$` or `$tag$`) starting at `start`.
/// `$1` style parameters are not tags.
fn dollar_tag_len(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if let Some(&c) = chars.get(i) {
        if c.is_ascii_digit() {
            return None;
        }
    }
    while let Some(&c) = chars.get(i) {
        if c == '$' {
            return Some(i - start + 1);
        }
        if !(c.is_alphanumeric() || c == '_') {
            return None;
        }
        i += 1;
    }
    None
}

fn skip_dollar_quoted(
    chars: &[char],
    start: usize,
    tag_len: usize,
) -> Result<usize, RejectReason> {
    let tag = &chars[start..start + tag_len];
    let mut i = start + tag_len;
    while i + tag_len <= chars.len() {
        if &chars[i..i + tag_len] == tag {
            return Ok(i + tag_len);
        }
        i += 1;
    }
    Err(RejectReason::UnterminatedLiteral)
}
