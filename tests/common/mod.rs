//! Common test utilities and helpers
//!
//! In-memory stand-ins for the database, the language model and the voice
//! renderer. Each mock shares its call log through an `Rc` so a test can
//! inspect it after the session has consumed the mock.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use talkgres::db::{
    CellValue, ColumnDef, ColumnRecord, ConstraintKind, DataType, Database, KeyConstraint,
    QueryResults, Row, SchemaDescriptor,
};
use talkgres::error::{DbError, DbResult, LlmError, LlmResult, RenderResult};
use talkgres::llm::LanguageModel;
use talkgres::sql::AuthorizedQuery;
use talkgres::voice::Renderer;

/// What the mock database saw
#[derive(Debug, Default)]
pub struct DbCalls {
    pub executed: RefCell<Vec<String>>,
    pub introspected: Cell<usize>,
    pub closed: Cell<usize>,
}

/// Database answering from a queue of canned outcomes
pub struct MockDb {
    schema: Result<SchemaDescriptor, String>,
    outcomes: RefCell<VecDeque<Result<QueryResults, String>>>,
    calls: Rc<DbCalls>,
}

impl MockDb {
    pub fn new(schema: SchemaDescriptor) -> (Self, Rc<DbCalls>) {
        let calls = Rc::new(DbCalls::default());
        let db = Self {
            schema: Ok(schema),
            outcomes: RefCell::new(VecDeque::new()),
            calls: Rc::clone(&calls),
        };
        (db, calls)
    }

    /// A database whose catalog query fails
    pub fn without_schema(message: &str) -> (Self, Rc<DbCalls>) {
        let (mut db, calls) = Self::new(SchemaDescriptor::default());
        db.schema = Err(message.to_string());
        (db, calls)
    }

    /// Queue the result of the next statement
    pub fn then_rows(self, results: QueryResults) -> Self {
        self.outcomes.borrow_mut().push_back(Ok(results));
        self
    }

    /// Queue a server error for the next statement
    pub fn then_error(self, message: &str) -> Self {
        self.outcomes.borrow_mut().push_back(Err(message.to_string()));
        self
    }
}

impl Database for MockDb {
    async fn execute_query(&self, query: &AuthorizedQuery) -> DbResult<QueryResults> {
        self.calls.executed.borrow_mut().push(query.as_str().to_string());
        match self.outcomes.borrow_mut().pop_front() {
            Some(Ok(results)) => Ok(results),
            Some(Err(message)) => Err(DbError::QueryFailed(message)),
            None => Err(DbError::QueryFailed("no outcome queued".to_string())),
        }
    }

    async fn introspect_schema(&self) -> DbResult<SchemaDescriptor> {
        self.calls.introspected.set(self.calls.introspected.get() + 1);
        self.schema.clone().map_err(DbError::SchemaLoadFailed)
    }

    async fn close(self) -> DbResult<()> {
        self.calls.closed.set(self.calls.closed.get() + 1);
        Ok(())
    }
}

/// Language model replaying scripted replies in order and logging prompts
pub struct ScriptedModel {
    replies: RefCell<VecDeque<LlmResult<String>>>,
    prompts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<LlmResult<String>>) -> (Self, Rc<RefCell<Vec<String>>>) {
        let prompts = Rc::new(RefCell::new(Vec::new()));
        let model = Self {
            replies: RefCell::new(replies.into()),
            prompts: Rc::clone(&prompts),
        };
        (model, prompts)
    }

    /// Shorthand for a script of successful replies
    pub fn replying(replies: &[&str]) -> (Self, Rc<RefCell<Vec<String>>>) {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }
}

impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> LlmResult<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(LlmError::Request("script exhausted".to_string())))
    }
}

/// Renderer that remembers what it was asked to say
#[derive(Default)]
pub struct RecordingRenderer {
    pub spoken: Rc<RefCell<Vec<String>>>,
}

impl Renderer for RecordingRenderer {
    async fn render(&self, text: &str) -> RenderResult<()> {
        self.spoken.borrow_mut().push(text.to_string());
        Ok(())
    }
}

/// `customers(id, name)` plus `orders(id, customer_id)` with its foreign key
pub fn shop_schema() -> SchemaDescriptor {
    SchemaDescriptor::from_records(vec![
        ColumnRecord::new("orders", "id", "integer").with_key(KeyConstraint {
            name: "orders_pkey".to_string(),
            kind: ConstraintKind::PrimaryKey,
            references: None,
        }),
        ColumnRecord::new("orders", "customer_id", "integer").with_key(KeyConstraint {
            name: "orders_customer_id_fkey".to_string(),
            kind: ConstraintKind::ForeignKey,
            references: Some(("customers".to_string(), "id".to_string())),
        }),
        ColumnRecord::new("customers", "name", "text"),
        ColumnRecord::new("customers", "id", "integer").with_key(KeyConstraint {
            name: "customers_pkey".to_string(),
            kind: ConstraintKind::PrimaryKey,
            references: None,
        }),
    ])
}

/// Single-cell result of a `COUNT(*)`
pub fn count_result(n: i64) -> QueryResults {
    QueryResults::new(
        vec![ColumnDef {
            name: "count".to_string(),
            data_type: DataType::BigInt,
        }],
        vec![Row {
            values: vec![CellValue::Integer(n)],
        }],
        Duration::from_millis(3),
        1,
    )
}

/// A result with columns but no rows
pub fn empty_result() -> QueryResults {
    QueryResults::new(
        vec![ColumnDef {
            name: "name".to_string(),
            data_type: DataType::Text,
        }],
        vec![],
        Duration::from_millis(1),
        0,
    )
}
