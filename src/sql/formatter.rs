//! SQL formatting
//!
//! Pretty-prints an authorized statement for the optional SQL echo.

use sqlformat::{FormatOptions, Indent, QueryParams, format};

/// Format a SQL query string with two-space indentation and upper-case keywords
pub fn format_sql(sql: &str) -> String {
    let options = FormatOptions {
        indent: Indent::Spaces(2),
        uppercase: Some(true),
        lines_between_queries: 1,
        ..FormatOptions::default()
    };

    format(sql, &QueryParams::None, &options)
}
