//! Database schema description
//!
//! A flat, deterministically ordered list of column records, each with the
//! key constraints it takes part in. This is what the query prompt embeds,
//! so two snapshots of an unchanged schema must render identically.

use std::fmt;

/// Kind of constraint a column participates in
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Other(String),
}

impl ConstraintKind {
    /// Map an `information_schema.table_constraints.constraint_type` value
    pub fn from_catalog(constraint_type: &str) -> Self {
        match constraint_type {
            "PRIMARY KEY" => ConstraintKind::PrimaryKey,
            "FOREIGN KEY" => ConstraintKind::ForeignKey,
            "UNIQUE" => ConstraintKind::Unique,
            other => ConstraintKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::Other(s) => s,
        }
    }
}

/// One constraint touching a column
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyConstraint {
    /// Constraint name as stored in the catalog
    pub name: String,
    pub kind: ConstraintKind,
    /// Referenced `(table, column)`, for foreign keys
    pub references: Option<(String, String)>,
}

impl fmt::Display for KeyConstraint {
    // orders_customer_id_fkey (FOREIGN KEY -> customers.id)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.references {
            Some((table, column)) => write!(
                f,
                "{} ({} -> {}.{})",
                self.name,
                self.kind.as_str(),
                table,
                column
            ),
            None => write!(f, "{} ({})", self.name, self.kind.as_str()),
        }
    }
}

/// A table column with its key relationships
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRecord {
    pub table_name: String,
    pub column_name: String,
    /// Type as reported by the catalog (e.g. "integer", "character varying")
    pub data_type: String,
    /// Sorted by constraint name
    pub keys: Vec<KeyConstraint>,
}

impl ColumnRecord {
    pub fn new(table_name: &str, column_name: &str, data_type: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            data_type: data_type.to_string(),
            keys: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: KeyConstraint) -> Self {
        self.keys.push(key);
        self.keys.sort();
        self
    }

    /// Human-readable note on the constraints, `None` for a plain column
    pub fn key_annotation(&self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let notes: Vec<String> = self.keys.iter().map(ToString::to_string).collect();
        Some(notes.join(", "))
    }
}

/// Immutable snapshot of every column in the queryable namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    columns: Vec<ColumnRecord>,
}

impl SchemaDescriptor {
    /// Build a descriptor, ordering records by table then column name.
    pub fn from_records(mut columns: Vec<ColumnRecord>) -> Self {
        for col in &mut columns {
            col.keys.sort();
            col.keys.dedup();
        }
        columns.sort_by(|a, b| {
            (a.table_name.as_str(), a.column_name.as_str())
                .cmp(&(b.table_name.as_str(), b.column_name.as_str()))
        });
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnRecord] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Distinct table names in order
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.iter().map(|c| c.table_name.as_str()).collect();
        names.dedup();
        names
    }

    /// Render the descriptor for inclusion in a prompt, one table per block.
    pub fn describe(&self) -> String {
        if self.columns.is_empty() {
            return "(no tables)".to_string();
        }

        let mut out = String::new();
        let mut current: Option<&str> = None;
        for col in &self.columns {
            if current != Some(col.table_name.as_str()) {
                if current.is_some() {
                    out.push('\n');
                }
                out.push_str(&format!("Table {}:\n", col.table_name));
                current = Some(col.table_name.as_str());
            }
            out.push_str(&format!("  - {} {}", col.column_name, col.data_type));
            if let Some(note) = col.key_annotation() {
                out.push_str(&format!(" [{}]", note));
            }
            out.push('\n');
        }
        out
    }
}
