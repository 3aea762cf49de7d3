//! Statement types passed between pipeline stages.

use std::fmt;

/// A single statement produced by the synthesizer, not yet vetted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery(String);

impl CandidateQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A statement that passed [`authorize`](crate::sql::guard::authorize).
///
/// Only the guard can build one, so anything that executes an
/// `AuthorizedQuery` has gone through the read-only check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedQuery(CandidateQuery);

impl AuthorizedQuery {
    pub(super) fn new(query: CandidateQuery) -> Self {
        Self(query)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AuthorizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
