//! Remote store client
//!
//! The [`StoreClient`] trait is the only seam between the connector and the
//! wire. Query responses keep the store's nesting: a response holds statement
//! results, each result holds series, and each series holds positional rows.

mod http;
mod line_protocol;

pub use http::HttpStoreClient;
pub use line_protocol::{BatchPoints, FieldValue, Point};

use crate::{Error, Result};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Reserved error text that marks the end of a chunked result stream
pub const END_OF_STREAM: &str = "DONE";

/// Sending half of a chunked query's hand-off queue
pub type ChunkSender = mpsc::UnboundedSender<QueryResponse>;

/// Receiving half of a chunked query's hand-off queue
pub type ChunkReceiver = mpsc::UnboundedReceiver<QueryResponse>;

/// One response body, or one chunk of a chunked response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one statement in a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub statement_id: u32,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Rows sharing one tag set, with values aligned to `columns`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl QueryResponse {
    /// The end-of-stream marker a chunk producer sends after the last chunk
    pub fn done() -> Self {
        Self {
            results: Vec::new(),
            error: Some(END_OF_STREAM.to_string()),
        }
    }

    /// A terminal failure marker for a chunk stream
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.error.as_deref() == Some(END_OF_STREAM)
    }

    /// Fail if the response or any statement result carries an error
    pub fn check(&self) -> Result<()> {
        if let Some(error) = &self.error {
            return Err(Error::Remote(error.clone()));
        }
        for result in &self.results {
            result.check()?;
        }
        Ok(())
    }

    /// Series of the first statement; metadata statements are single-statement
    pub fn first_series(&self) -> Result<&[Series]> {
        self.check()?;
        Ok(self
            .results
            .first()
            .map(|r| r.series.as_slice())
            .unwrap_or_default())
    }
}

impl StatementResult {
    pub fn check(&self) -> Result<()> {
        match &self.error {
            Some(error) => Err(Error::Remote(error.clone())),
            None => Ok(()),
        }
    }
}

/// Render a JSON cell the way the store's text protocol would
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Client interface to an InfluxQL-speaking store
///
/// Implementations must be safe to share between concurrent scans and writes.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Run a query and return its whole response
    async fn query(&self, database: Option<&str>, query: &str) -> Result<QueryResponse>;

    /// Start a chunked query and return without waiting for results.
    ///
    /// Every chunk is pushed onto `sink` as it arrives, followed by either
    /// [`QueryResponse::done`] or a [`QueryResponse::failed`] marker.
    /// A `chunk_size` of zero leaves chunk sizing to the server.
    fn query_chunked(
        &self,
        database: &str,
        query: &str,
        chunk_size: usize,
        sink: ChunkSender,
    ) -> Result<()>;

    /// Write a batch of points; the whole batch succeeds or the call fails
    async fn write(&self, batch: &BatchPoints) -> Result<()>;
}
