//! PostgreSQL database provider
//!
//! Concrete implementation using tokio-postgres.

use crate::config::ConnectionConfig;
use crate::config::connections::SslMode;
use crate::db::Database;
use crate::db::schema::{ColumnRecord, ConstraintKind, KeyConstraint, SchemaDescriptor};
use crate::db::types::{CellValue, ColumnDef, DataType, QueryResults, Row};
use crate::error::{DbError, DbResult};
use crate::sql::AuthorizedQuery;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_postgres::Client;
use tokio_postgres::types::Type;

/// Columns of the `public` namespace joined with the constraints they take
/// part in. One row per (column, constraint, referenced column); columns
/// without constraints appear once with NULLs.
const INTROSPECTION_SQL: &str = "\
SELECT cols.table_name::text, \
       cols.column_name::text, \
       cols.data_type::text, \
       tc.constraint_name::text, \
       tc.constraint_type::text, \
       ccu.table_name::text, \
       ccu.column_name::text \
FROM information_schema.columns AS cols \
LEFT JOIN information_schema.key_column_usage AS kcu \
       ON cols.table_schema = kcu.table_schema \
      AND cols.table_name = kcu.table_name \
      AND cols.column_name = kcu.column_name \
LEFT JOIN information_schema.table_constraints AS tc \
       ON kcu.constraint_name = tc.constraint_name \
      AND kcu.table_schema = tc.table_schema \
LEFT JOIN information_schema.constraint_column_usage AS ccu \
       ON tc.constraint_type = 'FOREIGN KEY' \
      AND tc.constraint_name = ccu.constraint_name \
      AND tc.constraint_schema = ccu.constraint_schema \
WHERE cols.table_schema = 'public' \
ORDER BY cols.table_name, cols.column_name, tc.constraint_name, ccu.table_name, ccu.column_name";

/// PostgreSQL database provider
pub struct PostgresProvider {
    /// The tokio-postgres client
    client: Client,
    /// Profile name, for log lines
    name: String,
}

impl PostgresProvider {
    /// Connect to a PostgreSQL database.
    ///
    /// Returns the provider and a receiver that fires if the background
    /// connection is lost (e.g. server restart, idle timeout).
    pub async fn connect(
        config: &ConnectionConfig,
    ) -> DbResult<(Self, mpsc::UnboundedReceiver<String>)> {
        let conn_string = config.connection_string_with_password();
        let (conn_err_tx, conn_err_rx) = mpsc::unbounded_channel();

        let client = match config.ssl_mode {
            SslMode::Disable => {
                let (client, connection) =
                    tokio_postgres::connect(&conn_string, tokio_postgres::NoTls)
                        .await
                        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        let _ = conn_err_tx.send(e.to_string());
                    }
                });
                client
            }
            SslMode::Prefer | SslMode::Require => {
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(make_tls_config());
                let (client, connection) = tokio_postgres::connect(&conn_string, tls)
                    .await
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        let _ = conn_err_tx.send(e.to_string());
                    }
                });
                client
            }
        };

        tracing::info!(
            server = %config.connection_string(),
            "database connection established"
        );

        Ok((
            Self {
                client,
                name: config.name.clone(),
            },
            conn_err_rx,
        ))
    }

    async fn run_statement(&self, sql: &str) -> DbResult<QueryResults> {
        let start = std::time::Instant::now();

        let stmt = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| DbError::QueryFailed(db_error_message(&e)))?;

        let columns: Vec<ColumnDef> = stmt
            .columns()
            .iter()
            .map(|col| ColumnDef {
                name: col.name().to_string(),
                data_type: pg_type_to_datatype(col.type_()),
            })
            .collect();

        let pg_rows = self
            .client
            .query(&stmt, &[])
            .await
            .map_err(|e| DbError::QueryFailed(db_error_message(&e)))?;

        let row_count = pg_rows.len();
        let mut rows = Vec::with_capacity(row_count);

        for pg_row in &pg_rows {
            let mut values = Vec::with_capacity(columns.len());
            for (i, col_def) in columns.iter().enumerate() {
                values.push(extract_cell_value(pg_row, i, &col_def.data_type));
            }
            rows.push(Row { values });
        }

        Ok(QueryResults::new(columns, rows, start.elapsed(), row_count))
    }
}

impl Database for PostgresProvider {
    async fn execute_query(&self, query: &AuthorizedQuery) -> DbResult<QueryResults> {
        // The server enforces read-only on top of the lexical guard.
        self.client
            .batch_execute("BEGIN TRANSACTION READ ONLY")
            .await
            .map_err(|e| DbError::QueryFailed(db_error_message(&e)))?;

        let result = self.run_statement(query.as_str()).await;

        if let Err(e) = self.client.batch_execute("ROLLBACK").await {
            tracing::warn!(error = %e, "failed to end read-only transaction");
        }
        result
    }

    async fn introspect_schema(&self) -> DbResult<SchemaDescriptor> {
        let rows = self
            .client
            .query(INTROSPECTION_SQL, &[])
            .await
            .map_err(|e| DbError::SchemaLoadFailed(db_error_message(&e)))?;

        let mut records: BTreeMap<(String, String), ColumnRecord> = BTreeMap::new();

        for row in &rows {
            let table: String = row
                .try_get(0)
                .map_err(|e| DbError::SchemaLoadFailed(e.to_string()))?;
            let column: String = row
                .try_get(1)
                .map_err(|e| DbError::SchemaLoadFailed(e.to_string()))?;
            let data_type: String = row
                .try_get(2)
                .map_err(|e| DbError::SchemaLoadFailed(e.to_string()))?;
            let constraint_name: Option<String> = row.try_get(3).unwrap_or(None);
            let constraint_type: Option<String> = row.try_get(4).unwrap_or(None);
            let ref_table: Option<String> = row.try_get(5).unwrap_or(None);
            let ref_column: Option<String> = row.try_get(6).unwrap_or(None);

            let record = records
                .entry((table.clone(), column.clone()))
                .or_insert_with(|| ColumnRecord::new(&table, &column, &data_type));

            if let (Some(name), Some(kind)) = (constraint_name, constraint_type) {
                let kind = ConstraintKind::from_catalog(&kind);
                let references = match (&kind, ref_table, ref_column) {
                    (ConstraintKind::ForeignKey, Some(t), Some(c)) => Some((t, c)),
                    _ => None,
                };
                record.keys.push(KeyConstraint {
                    name,
                    kind,
                    references,
                });
            }
        }

        let schema = SchemaDescriptor::from_records(records.into_values().collect());
        tracing::info!(
            profile = %self.name,
            tables = schema.table_names().len(),
            columns = schema.columns().len(),
            "schema loaded"
        );
        Ok(schema)
    }

    async fn close(self) -> DbResult<()> {
        // Dropping the client ends the background connection task.
        drop(self.client);
        tracing::info!(profile = %self.name, "database connection closed");
        Ok(())
    }
}

/// Prefer the server's own message ("column \"x\" does not exist") over
/// the generic "db error" wrapper.
fn db_error_message(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => db.message().to_string(),
        None => e.to_string(),
    }
}

/// Map tokio_postgres Type to our DataType enum
fn pg_type_to_datatype(pg_type: &Type) -> DataType {
    match *pg_type {
        Type::INT2 => DataType::SmallInt,
        Type::INT4 => DataType::Integer,
        Type::INT8 => DataType::BigInt,
        Type::FLOAT4 => DataType::Real,
        Type::FLOAT8 => DataType::Double,
        Type::NUMERIC => DataType::Numeric,
        Type::TEXT | Type::NAME => DataType::Text,
        Type::VARCHAR => DataType::Varchar,
        Type::CHAR | Type::BPCHAR => DataType::Char,
        Type::BOOL => DataType::Boolean,
        Type::DATE => DataType::Date,
        Type::TIME => DataType::Time,
        Type::TIMESTAMP => DataType::Timestamp,
        Type::TIMESTAMPTZ => DataType::TimestampTz,
        Type::INTERVAL => DataType::Interval,
        Type::JSON => DataType::Json,
        Type::JSONB => DataType::Jsonb,
        Type::BYTEA => DataType::Bytea,
        Type::UUID => DataType::Uuid,
        Type::BOOL_ARRAY => DataType::Array(Box::new(DataType::Boolean)),
        Type::INT2_ARRAY => DataType::Array(Box::new(DataType::SmallInt)),
        Type::INT4_ARRAY => DataType::Array(Box::new(DataType::Integer)),
        Type::INT8_ARRAY => DataType::Array(Box::new(DataType::BigInt)),
        Type::FLOAT8_ARRAY => DataType::Array(Box::new(DataType::Double)),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            DataType::Array(Box::new(DataType::Text))
        }
        Type::NUMERIC_ARRAY => DataType::Array(Box::new(DataType::Numeric)),
        _ => DataType::Unknown(pg_type.name().to_string()),
    }
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Extract a cell value from a tokio_postgres Row based on the column's DataType.
///
/// Tries the expected Rust type first and falls back to a string read.
/// Returns CellValue::Null only for actual NULL values.
fn extract_cell_value(row: &tokio_postgres::Row, idx: usize, data_type: &DataType) -> CellValue {
    match data_type {
        DataType::SmallInt => typed(row, idx, |v: i16| CellValue::Integer(v as i64)),
        DataType::Integer => typed(row, idx, |v: i32| CellValue::Integer(v as i64)),
        DataType::BigInt => typed(row, idx, CellValue::Integer),
        DataType::Real => typed(row, idx, |v: f32| CellValue::Float(v as f64)),
        DataType::Double => typed(row, idx, CellValue::Float),
        DataType::Numeric => typed(row, idx, |v: Decimal| CellValue::Text(v.to_string())),
        DataType::Boolean => typed(row, idx, CellValue::Boolean),
        DataType::Json | DataType::Jsonb => typed(row, idx, CellValue::Json),
        DataType::Bytea => typed(row, idx, CellValue::Binary),
        DataType::Uuid => typed(row, idx, |v: uuid::Uuid| CellValue::Uuid(v.to_string())),
        DataType::Timestamp => typed(row, idx, |v: chrono::NaiveDateTime| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::TimestampTz => typed(row, idx, |v: chrono::DateTime<chrono::Utc>| {
            CellValue::DateTime(v.to_rfc3339())
        }),
        DataType::Date => typed(row, idx, |v: chrono::NaiveDate| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::Time => typed(row, idx, |v: chrono::NaiveTime| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::Array(inner) => extract_array_value(row, idx, inner),
        // Text types, intervals and anything unknown
        _ => try_as_string(row, idx),
    }
}

/// Read column `idx` as `T`, mapping NULL to `CellValue::Null` and a type
/// mismatch to the string fallback.
fn typed<'a, T, F>(row: &'a tokio_postgres::Row, idx: usize, wrap: F) -> CellValue
where
    T: tokio_postgres::types::FromSql<'a>,
    F: FnOnce(T) -> CellValue,
{
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(v)) => wrap(v),
        Ok(None) => CellValue::Null,
        Err(_) => try_as_string(row, idx),
    }
}

/// Extract an array value, falling back to a string read for element
/// types without a direct Rust mapping.
fn extract_array_value(row: &tokio_postgres::Row, idx: usize, inner: &DataType) -> CellValue {
    match inner {
        DataType::Text | DataType::Varchar | DataType::Char => typed(row, idx, |v: Vec<String>| {
            CellValue::Array(v.into_iter().map(CellValue::Text).collect())
        }),
        DataType::SmallInt => typed(row, idx, |v: Vec<i16>| {
            CellValue::Array(v.into_iter().map(|n| CellValue::Integer(n as i64)).collect())
        }),
        DataType::Integer => typed(row, idx, |v: Vec<i32>| {
            CellValue::Array(v.into_iter().map(|n| CellValue::Integer(n as i64)).collect())
        }),
        DataType::BigInt => typed(row, idx, |v: Vec<i64>| {
            CellValue::Array(v.into_iter().map(CellValue::Integer).collect())
        }),
        DataType::Double => typed(row, idx, |v: Vec<f64>| {
            CellValue::Array(v.into_iter().map(CellValue::Float).collect())
        }),
        DataType::Boolean => typed(row, idx, |v: Vec<bool>| {
            CellValue::Array(v.into_iter().map(CellValue::Boolean).collect())
        }),
        DataType::Numeric => typed(row, idx, |v: Vec<Decimal>| {
            CellValue::Array(v.into_iter().map(|d| CellValue::Text(d.to_string())).collect())
        }),
        _ => try_as_string(row, idx),
    }
}

/// Try to extract a value as a string (fallback for type mismatches).
///
/// When even the string fallback fails, includes the postgres type name
/// so the model (and user) can tell what could not be displayed.
fn try_as_string(row: &tokio_postgres::Row, idx: usize) -> CellValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => CellValue::Text(v),
        Ok(None) => CellValue::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            CellValue::Text(format!("<unable to display: {}>", type_name))
        }
    }
}
