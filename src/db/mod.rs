//! Database abstraction layer
//!
//! A trait over the two things the session needs from a database (run one
//! statement, describe the schema) so the loop can be driven by an
//! in-memory mock in tests.

pub mod postgres;
pub mod schema;
pub mod types;

use crate::error::DbResult;
use crate::sql::AuthorizedQuery;

// Re-export main types
pub use schema::{ColumnRecord, ConstraintKind, KeyConstraint, SchemaDescriptor};
pub use types::{CellValue, ColumnDef, DataType, QueryResults, Row};

/// Operations the session performs against a live connection
#[allow(async_fn_in_trait)]
pub trait Database {
    /// Execute a single guard-approved statement and return its rows
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` carrying the server message
    async fn execute_query(&self, query: &AuthorizedQuery) -> DbResult<QueryResults>;

    /// Describe every column of every table in the application namespace
    ///
    /// # Errors
    /// Returns `DbError::SchemaLoadFailed` if the catalog query fails
    async fn introspect_schema(&self) -> DbResult<SchemaDescriptor>;

    /// Release the connection. Consumes the handle so it cannot be used
    /// (or released) again.
    async fn close(self) -> DbResult<()>
    where
        Self: Sized;
}
