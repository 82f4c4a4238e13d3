//! Column and table types
//!
//! Remote field types are strings (`float`, `integer`, ...) and are mapped to
//! the five scalar types the connector understands.

use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Name of the implicit timestamp column
pub const TIME_COLUMN: &str = "time";

/// Scalar types exposed to the host engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Timestamp with time zone, nanosecond precision
    Timestamp,
    /// Unbounded UTF-8 string
    Utf8,
    Int64,
    Float64,
    Boolean,
}

impl ColumnType {
    /// Map a remote field type from `show field keys` to a column type
    pub fn from_field_type(field_type: &str) -> Option<Self> {
        match field_type {
            "float" => Some(ColumnType::Float64),
            "integer" | "unsigned" => Some(ColumnType::Int64),
            "string" => Some(ColumnType::Utf8),
            "boolean" => Some(ColumnType::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Timestamp => "timestamp(9) with time zone",
            ColumnType::Utf8 => "varchar",
            ColumnType::Int64 => "bigint",
            ColumnType::Float64 => "double",
            ColumnType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a column in the time-series data model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Time,
    Tag,
    Field,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Time => "time",
            ColumnKind::Tag => "tag",
            ColumnKind::Field => "field",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column of a measurement; also serves as the engine's column handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            column_type,
            kind,
        }
    }

    /// The implicit `time` column every measurement has
    pub fn time() -> Self {
        Self::new(TIME_COLUMN, ColumnType::Timestamp, ColumnKind::Time)
    }

    /// Tags are always strings
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Utf8, ColumnKind::Tag)
    }

    pub fn field(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, ColumnKind::Field)
    }

    pub fn is_time(&self) -> bool {
        self.kind == ColumnKind::Time
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.column_type, self.kind)
    }
}

/// A measurement and its column definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, validating the column layout.
    ///
    /// Names must be unique, at most one column may be the time column, and
    /// when present it must come first.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("table name is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if column.name.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "column {} of table {} has an empty name",
                    idx, name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate column {} in table {}",
                    column.name, name
                )));
            }
            if column.is_time() && idx != 0 {
                return Err(Error::InvalidArgument(format!(
                    "time column {} of table {} must be first",
                    column.name, name
                )));
            }
        }

        Ok(Self { name, columns })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn time_column(&self) -> Option<&Column> {
        self.columns.first().filter(|c| c.is_time())
    }
}
