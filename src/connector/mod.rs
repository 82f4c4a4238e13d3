//! Host engine surface
//!
//! [`ConnectorMetadata`] resolves tables and accepts pushdowns,
//! [`RecordSetProvider`] turns a handle into a row cursor and [`PageSink`]
//! writes rows back.

mod handle;
mod metadata;
mod page_sink;
mod record_set;

pub use handle::{InsertTableHandle, RetryMode, SchemaTableName, SortItem, TableHandle};
pub use metadata::ConnectorMetadata;
pub use page_sink::PageSink;
pub use record_set::RecordSetProvider;

use crate::config::ConnectorConfig;
use crate::session::MetadataSession;

use std::sync::Arc;

/// All connector services sharing one session
pub struct Connector {
    session: Arc<MetadataSession>,
    metadata: ConnectorMetadata,
    records: RecordSetProvider,
}

impl Connector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self::with_session(Arc::new(MetadataSession::new(config)))
    }

    pub fn with_session(session: Arc<MetadataSession>) -> Self {
        Self {
            metadata: ConnectorMetadata::new(session.clone()),
            records: RecordSetProvider::new(session.clone()),
            session,
        }
    }

    pub fn session(&self) -> &Arc<MetadataSession> {
        &self.session
    }

    pub fn metadata(&self) -> &ConnectorMetadata {
        &self.metadata
    }

    pub fn record_sets(&self) -> &RecordSetProvider {
        &self.records
    }

    pub fn page_sink(&self, handle: InsertTableHandle) -> PageSink {
        PageSink::new(self.session.clone(), handle)
    }
}
