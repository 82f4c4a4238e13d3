//! Pull-based cursor over a chunked query result
//!
//! Chunks arrive on an unbounded channel fed by the store client. The cursor
//! flattens chunk, statement result, series and row into one row sequence and
//! only pulls the next chunk once everything buffered has been consumed.

use crate::client::{ChunkReceiver, QueryResponse, Series, StatementResult};
use crate::{Error, Result};

use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error};

pub struct ChunkedResultCursor {
    receiver: Option<ChunkReceiver>,
    poll_timeout: Duration,
    results: VecDeque<StatementResult>,
    series: VecDeque<Series>,
    rows: std::vec::IntoIter<Vec<Value>>,
    current: Option<Vec<Value>>,
    rows_read: u64,
}

impl ChunkedResultCursor {
    /// Open a cursor and pull the first chunk.
    ///
    /// Fails like [`advance`](Self::advance) when the first poll does.
    pub async fn open(receiver: ChunkReceiver, poll_timeout: Duration) -> Result<Self> {
        let mut cursor = Self {
            receiver: Some(receiver),
            poll_timeout,
            results: VecDeque::new(),
            series: VecDeque::new(),
            rows: Vec::new().into_iter(),
            current: None,
            rows_read: 0,
        };
        cursor.poll_chunk().await?;
        Ok(cursor)
    }

    /// A cursor with no rows that never polls
    pub fn empty() -> Self {
        Self {
            receiver: None,
            poll_timeout: Duration::ZERO,
            results: VecDeque::new(),
            series: VecDeque::new(),
            rows: Vec::new().into_iter(),
            current: None,
            rows_read: 0,
        }
    }

    /// Move to the next row.
    ///
    /// Returns `Ok(false)` once the stream is exhausted. A stalled producer,
    /// a closed channel or an error marker fails the cursor, after which it
    /// reports exhaustion.
    pub async fn advance(&mut self) -> Result<bool> {
        self.current = None;
        loop {
            if let Some(row) = self.rows.next() {
                self.current = Some(row);
                self.rows_read += 1;
                return Ok(true);
            }
            if let Some(series) = self.series.pop_front() {
                self.rows = series.values.into_iter();
                continue;
            }
            if let Some(result) = self.results.pop_front() {
                if let Err(e) = result.check() {
                    self.finish();
                    return Err(e);
                }
                self.series = result.series.into();
                continue;
            }
            if !self.poll_chunk().await? {
                return Ok(false);
            }
        }
    }

    /// Values of the current row, positionally aligned to the query's columns
    pub fn current_row(&self) -> Option<&[Value]> {
        self.current.as_deref()
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn is_finished(&self) -> bool {
        self.receiver.is_none()
            && self.results.is_empty()
            && self.series.is_empty()
            && self.rows.len() == 0
    }

    /// Consume the cursor as a stream of rows
    pub fn into_rows(self) -> impl Stream<Item = Result<Vec<Value>>> {
        futures::stream::try_unfold(self, |mut cursor| async move {
            if cursor.advance().await? {
                let row = cursor.current.take().unwrap_or_default();
                Ok(Some((row, cursor)))
            } else {
                Ok::<_, Error>(None)
            }
        })
    }

    /// Pull one chunk into the buffers; `Ok(false)` means end of stream
    async fn poll_chunk(&mut self) -> Result<bool> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(false);
        };

        let chunk = match timeout(self.poll_timeout, receiver.recv()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                self.finish();
                error!(rows = self.rows_read, "Chunk producer closed without end marker");
                return Err(Error::StreamClosed);
            }
            Err(_) => {
                self.finish();
                error!(
                    rows = self.rows_read,
                    timeout = ?self.poll_timeout,
                    "Timed out waiting for query result chunk"
                );
                return Err(Error::ChunkPollTimeout(self.poll_timeout));
            }
        };
        self.accept(chunk)
    }

    fn accept(&mut self, chunk: QueryResponse) -> Result<bool> {
        if chunk.is_end_of_stream() {
            debug!(rows = self.rows_read, "Query result stream complete");
            self.finish();
            return Ok(false);
        }
        if let Some(message) = chunk.error {
            error!(rows = self.rows_read, error = %message, "Query result stream failed");
            self.finish();
            return Err(Error::Remote(message));
        }
        if chunk.results.is_empty() {
            self.finish();
            return Ok(false);
        }
        self.results = chunk.results.into();
        Ok(true)
    }

    fn finish(&mut self) {
        self.receiver = None;
        self.results.clear();
        self.series.clear();
        self.rows = Vec::new().into_iter();
    }
}
