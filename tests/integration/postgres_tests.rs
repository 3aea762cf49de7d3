//! Integration tests for PostgresProvider
//!
//! Only literal and catalog queries are used, so any reachable server works
//! without fixtures.

use talkgres::config::ConnectionConfig;
use talkgres::config::connections::SslMode;
use talkgres::db::Database;
use talkgres::db::postgres::PostgresProvider;
use talkgres::db::types::CellValue;
use talkgres::error::DbError;
use talkgres::sql::{AuthorizedQuery, CandidateQuery, authorize};

/// Get test database connection config
fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        name: "integration-test".to_string(),
        host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("TEST_DB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5433),
        database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "test_db".to_string()),
        username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "test_user".to_string()),
        password: Some(
            std::env::var("TEST_DB_PASSWORD").unwrap_or_else(|_| "test_password".to_string()),
        ),
        ssl_mode: SslMode::Disable,
    }
}

async fn connect() -> Option<PostgresProvider> {
    let config = test_config();
    match PostgresProvider::connect(&config).await {
        Ok((provider, _)) => Some(provider),
        Err(e) => {
            eprintln!(
                "Skipping test: Database not available at {}:{} - {}",
                config.host, config.port, e
            );
            None
        }
    }
}

fn authorized(sql: &str) -> AuthorizedQuery {
    authorize(CandidateQuery::new(sql)).expect("test statement is read-only")
}

#[tokio::test]
async fn test_execute_simple_query() {
    let Some(provider) = connect().await else {
        return;
    };

    let results = provider
        .execute_query(&authorized("SELECT 1 AS num, 'hello' AS msg"))
        .await
        .expect("query should succeed");

    assert_eq!(results.columns.len(), 2);
    assert_eq!(results.columns[0].name, "num");
    assert_eq!(results.columns[1].name, "msg");
    assert_eq!(results.row_count, 1);

    let row = &results.rows[0];
    match &row.values[0] {
        CellValue::Integer(n) => assert_eq!(*n, 1),
        other => panic!("Expected Integer, got {:?}", other),
    }
    match &row.values[1] {
        CellValue::Text(s) => assert_eq!(s, "hello"),
        other => panic!("Expected Text, got {:?}", other),
    }
}

#[tokio::test]
async fn test_statement_runs_in_read_only_transaction() {
    let Some(provider) = connect().await else {
        return;
    };

    let results = provider
        .execute_query(&authorized("SELECT current_setting('transaction_read_only')"))
        .await
        .expect("query should succeed");

    match &results.rows[0].values[0] {
        CellValue::Text(s) => assert_eq!(s, "on"),
        other => panic!("Expected Text, got {:?}", other),
    }
}

#[tokio::test]
async fn test_query_value_types() {
    let Some(provider) = connect().await else {
        return;
    };

    let results = provider
        .execute_query(&authorized(
            "SELECT 12.50::numeric AS amount, \
                    '{\"role\": \"admin\"}'::jsonb AS meta, \
                    ARRAY['a', 'b'] AS tags, \
                    now() AS at, \
                    NULL::text AS nothing",
        ))
        .await
        .expect("query should succeed");

    let row = &results.rows[0];
    // NUMERIC is extracted via rust_decimal as a Text string
    match &row.values[0] {
        CellValue::Text(s) => assert_eq!(s, "12.50"),
        other => panic!("Expected Text for NUMERIC, got {:?}", other),
    }
    match &row.values[1] {
        CellValue::Json(v) => assert_eq!(v["role"], "admin"),
        other => panic!("Expected Json, got {:?}", other),
    }
    match &row.values[2] {
        CellValue::Array(items) => assert_eq!(items.len(), 2),
        other => panic!("Expected Array, got {:?}", other),
    }
    match &row.values[3] {
        CellValue::DateTime(s) => assert!(!s.is_empty()),
        other => panic!("Expected DateTime, got {:?}", other),
    }
    assert!(row.values[4].is_null());
}

#[tokio::test]
async fn test_empty_result_is_not_an_error() {
    let Some(provider) = connect().await else {
        return;
    };

    let results = provider
        .execute_query(&authorized("SELECT 1 AS one WHERE false"))
        .await
        .expect("query should succeed");

    assert!(results.is_empty());
    assert_eq!(results.columns.len(), 1);
}

#[tokio::test]
async fn test_missing_column_carries_server_message() {
    let Some(provider) = connect().await else {
        return;
    };

    let result = provider
        .execute_query(&authorized("SELECT nme FROM pg_catalog.pg_class"))
        .await;

    match result {
        Err(DbError::QueryFailed(message)) => {
            assert!(message.contains("nme"), "unexpected message: {message}")
        }
        other => panic!("Expected QueryFailed, got {:?}", other.map(|r| r.row_count)),
    }
}

#[tokio::test]
async fn test_connection_usable_after_failed_statement() {
    let Some(provider) = connect().await else {
        return;
    };

    let failed = provider
        .execute_query(&authorized("SELECT * FROM table_that_does_not_exist"))
        .await;
    assert!(failed.is_err());

    let results = provider
        .execute_query(&authorized("SELECT 2 AS two"))
        .await
        .expect("connection should recover after a failed statement");
    assert_eq!(results.row_count, 1);
}

#[tokio::test]
async fn test_introspection_is_deterministic() {
    let Some(provider) = connect().await else {
        return;
    };

    let first = provider
        .introspect_schema()
        .await
        .expect("schema load should succeed");
    let second = provider
        .introspect_schema()
        .await
        .expect("schema load should succeed");

    assert_eq!(first, second);
    assert_eq!(first.describe(), second.describe());

    let names: Vec<(&str, &str)> = first
        .columns()
        .iter()
        .map(|c| (c.table_name.as_str(), c.column_name.as_str()))
        .collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[tokio::test]
async fn test_close_releases_connection() {
    let Some(provider) = connect().await else {
        return;
    };
    assert!(provider.close().await.is_ok());
}

#[tokio::test]
async fn test_connection_failure() {
    let mut config = test_config();
    config.host = "invalid-host-that-does-not-exist.local".to_string();
    config.port = 59999;

    let result = PostgresProvider::connect(&config).await;
    assert!(matches!(result, Err(DbError::ConnectionFailed(_))));
}
