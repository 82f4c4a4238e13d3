//! # InfluxQL connector
//!
//! Lets a relational query engine scan and insert into a tag/field
//! time-series store through its InfluxQL HTTP protocol.
//!
//! ## Architecture
//!
//! - **Query compiler**: turns a table handle's predicate, sort direction and
//!   limit into InfluxQL text
//! - **Metadata session**: owns the store connection and caches schema,
//!   table, retention policy and column metadata with a fixed time-to-live
//! - **Chunked result cursor**: flattens a chunked, nested query response into
//!   a pull-based row cursor without buffering the whole result
//!
//! The [`connector`] module wires these into the surface a host engine uses:
//! table resolution and pushdown, record cursors and page sinks.

pub mod client;
pub mod config;
pub mod connector;
pub mod predicate;
pub mod query;
pub mod schema;
pub mod session;
pub mod telemetry;
pub mod timestamp;

mod error;

pub use config::ConnectorConfig;
pub use error::{Error, Result};

/// Re-exports for common usage
pub mod prelude {
    pub use crate::client::{BatchPoints, FieldValue, Point, StoreClient};
    pub use crate::config::ConnectorConfig;
    pub use crate::connector::{
        Connector, ConnectorMetadata, InsertTableHandle, PageSink, RecordSetProvider, RetryMode,
        SchemaTableName, SortItem, TableHandle,
    };
    pub use crate::predicate::{Bound, Domain, Predicate, Range, ScalarValue};
    pub use crate::query::{ChunkedResultCursor, RecordCursor};
    pub use crate::schema::{Column, ColumnKind, ColumnType, Table};
    pub use crate::session::MetadataSession;
    pub use crate::timestamp::TimestampTz;
    pub use crate::{Error, Result};
}
