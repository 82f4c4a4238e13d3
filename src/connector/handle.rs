//! Handles describing scans and inserts
//!
//! Handles are immutable; every pushdown produces a new handle. A
//! [`TableHandle`] compares and hashes on schema, retention policy and table
//! name only, so refined handles for one table stay interchangeable as keys.

use crate::predicate::Predicate;
use crate::schema::Column;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Schema-qualified table name as the host engine sees it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaTableName {
    pub schema: String,
    pub table: String,
}

impl SchemaTableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for SchemaTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// A scan request against one measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableHandle {
    schema_name: String,
    retention_policy: String,
    table_name: String,
    constraint: Predicate,
    /// Row limit pushed down from the engine, if any
    limit: Option<u64>,
    ascending: bool,
}

impl TableHandle {
    pub fn new(
        schema_name: impl Into<String>,
        retention_policy: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            retention_policy: retention_policy.into(),
            table_name: table_name.into(),
            constraint: Predicate::all(),
            limit: None,
            ascending: true,
        }
    }

    pub fn with_constraint(&self, constraint: Predicate) -> Self {
        Self {
            constraint,
            ..self.clone()
        }
    }

    pub fn with_limit(&self, limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..self.clone()
        }
    }

    pub fn with_ascending(&self, ascending: bool) -> Self {
        Self {
            ascending,
            ..self.clone()
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn retention_policy(&self) -> &str {
        &self.retention_policy
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn constraint(&self) -> &Predicate {
        &self.constraint
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    pub fn to_schema_table_name(&self) -> SchemaTableName {
        SchemaTableName::new(&self.schema_name, &self.table_name)
    }
}

impl PartialEq for TableHandle {
    fn eq(&self, other: &Self) -> bool {
        self.schema_name == other.schema_name
            && self.retention_policy == other.retention_policy
            && self.table_name == other.table_name
    }
}

impl Eq for TableHandle {}

impl Hash for TableHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema_name.hash(state);
        self.retention_policy.hash(state);
        self.table_name.hash(state);
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.schema_name, self.retention_policy, self.table_name
        )
    }
}

/// Target of an insert, with the inserted columns in page channel order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertTableHandle {
    pub schema_name: String,
    pub retention_policy: String,
    pub table_name: String,
    pub columns: Vec<Column>,
}

impl fmt::Display for InsertTableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "influxql:{}.{}.{}",
            self.schema_name, self.retention_policy, self.table_name
        )
    }
}

/// One key of an engine sort request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortItem {
    pub name: String,
    pub ascending: bool,
}

impl SortItem {
    pub fn new(name: impl Into<String>, ascending: bool) -> Self {
        Self {
            name: name.into(),
            ascending,
        }
    }
}

/// Fault-tolerance mode the engine requests for an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryMode {
    NoRetries,
    RetriesEnabled,
}
