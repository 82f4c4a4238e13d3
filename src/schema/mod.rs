//! Table and column definitions for measurements in the remote store
//!
//! A measurement is exposed as a table whose first column is always the
//! `time` column, followed by one string column per tag key and one typed
//! column per field key.

mod table;

pub use table::{Column, ColumnKind, ColumnType, Table, TIME_COLUMN};
