//! SQL utilities
//!
//! Statement types, the read-only execution guard, and formatting.

pub mod formatter;
pub mod guard;
pub mod query;

pub use formatter::format_sql;
pub use guard::authorize;
pub use query::{AuthorizedQuery, CandidateQuery};
