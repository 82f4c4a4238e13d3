use super::TableHandle;
use crate::query::{self, ChunkedResultCursor, RecordCursor};
use crate::schema::Column;
use crate::session::MetadataSession;
use crate::Result;

use std::sync::Arc;
use tracing::info;

/// Opens row cursors for table scans
pub struct RecordSetProvider {
    session: Arc<MetadataSession>,
}

impl RecordSetProvider {
    pub fn new(session: Arc<MetadataSession>) -> Self {
        Self { session }
    }

    /// Compile the scan and start streaming it.
    ///
    /// A predicate that can match nothing yields an empty cursor and the
    /// store is never queried.
    pub async fn open_cursor(&self, handle: &TableHandle, columns: &[Column]) -> Result<RecordCursor> {
        if handle.constraint().is_none() {
            info!(table = %handle, "Predicate matches nothing, skipping query");
            return Ok(RecordCursor::new(columns.to_vec(), ChunkedResultCursor::empty()));
        }

        let sql = query::select_from(handle, columns)?;
        info!(table = %handle, query = %sql, "Opening record set");
        let cursor = self.session.open_chunked(handle.schema_name(), &sql).await?;
        Ok(RecordCursor::new(columns.to_vec(), cursor))
    }
}
