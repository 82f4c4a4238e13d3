//! Table resolution and pushdown for the host engine

use super::{InsertTableHandle, RetryMode, SchemaTableName, SortItem, TableHandle};
use crate::predicate::Predicate;
use crate::query::time_sort_order;
use crate::schema::{Column, Table};
use crate::session::MetadataSession;
use crate::{Error, Result};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ConnectorMetadata {
    session: Arc<MetadataSession>,
}

impl ConnectorMetadata {
    pub fn new(session: Arc<MetadataSession>) -> Self {
        Self { session }
    }

    pub async fn list_schema_names(&self) -> Result<Vec<String>> {
        self.session.list_schema_names().await
    }

    pub async fn list_table_names(&self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .session
            .list_table_names(schema)
            .await?
            .into_iter()
            .collect())
    }

    /// Tables of one schema, or of every schema when `schema` is `None`
    pub async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<SchemaTableName>> {
        let schemas = match schema {
            Some(schema) => vec![schema.to_string()],
            None => self.list_schema_names().await?,
        };
        let mut tables = Vec::new();
        for schema in schemas {
            for table in self.session.list_table_names(&schema).await? {
                tables.push(SchemaTableName::new(schema.as_str(), table));
            }
        }
        Ok(tables)
    }

    /// Resolve a table, `None` when it does not exist.
    ///
    /// `table` may be written `<rp>.<table>` to pick a retention policy;
    /// otherwise the schema's default policy is used.
    pub async fn get_table_handle(&self, schema: &str, table: &str) -> Result<Option<TableHandle>> {
        let schemas = self.session.list_schema_names().await?;
        if !schemas.iter().any(|s| s == schema) {
            debug!(schema, "Unknown schema");
            return Ok(None);
        }

        let (explicit_policy, table) = match table.split_once('.') {
            None => (None, table),
            Some((policy, name)) => {
                if policy.is_empty() || name.is_empty() || name.contains('.') {
                    debug!(schema, table, "Malformed retention policy qualified table name");
                    return Ok(None);
                }
                (Some(policy), name)
            }
        };

        if !self.session.list_table_names(schema).await?.contains(table) {
            return Ok(None);
        }

        let policy = match explicit_policy {
            Some(policy) => policy.to_string(),
            None => match self.session.default_retention_policy(schema).await? {
                Some(policy) => policy,
                None => {
                    warn!(schema, table, "Cannot resolve table without a default retention policy");
                    return Ok(None);
                }
            },
        };
        Ok(Some(TableHandle::new(schema, policy, table)))
    }

    pub async fn column_handles(&self, handle: &TableHandle) -> Result<Vec<Column>> {
        let columns = self
            .session
            .columns_for(handle.schema_name(), handle.table_name())
            .await?;
        Ok(columns.as_ref().clone())
    }

    pub async fn table_metadata(&self, handle: &TableHandle) -> Result<Table> {
        self.session
            .get_table(handle.schema_name(), handle.table_name())
            .await
    }

    /// Columns of every table matching the prefix.
    ///
    /// Tables dropped between listing and lookup are skipped.
    pub async fn list_table_columns(
        &self,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<BTreeMap<SchemaTableName, Vec<Column>>> {
        let tables = match (schema, table) {
            (Some(schema), Some(table)) => vec![SchemaTableName::new(schema, table)],
            (schema, _) => self.list_tables(schema).await?,
        };

        let mut columns = BTreeMap::new();
        for name in tables {
            let Some(handle) = self.get_table_handle(&name.schema, &name.table).await? else {
                continue;
            };
            columns.insert(name, self.column_handles(&handle).await?);
        }
        Ok(columns)
    }

    /// Narrow the handle's predicate; `None` if nothing changed
    pub fn apply_filter(
        &self,
        handle: &TableHandle,
        constraint: &Predicate,
    ) -> Result<Option<TableHandle>> {
        let narrowed = handle.constraint().intersect(constraint)?;
        if &narrowed == handle.constraint() {
            return Ok(None);
        }
        Ok(Some(handle.with_constraint(narrowed)))
    }

    /// Push down a limit; `None` if an equal or tighter one is already set
    pub fn apply_limit(&self, handle: &TableHandle, limit: u64) -> Option<TableHandle> {
        if handle.limit().is_some_and(|current| current <= limit) {
            return None;
        }
        Some(handle.with_limit(limit))
    }

    /// Push down a top-n, which the store can only execute ordered by time
    pub fn apply_top_n(
        &self,
        handle: &TableHandle,
        count: u64,
        sort_items: &[SortItem],
    ) -> Option<TableHandle> {
        let ascending = time_sort_order(sort_items)?;
        if handle.limit() == Some(count) && handle.ascending() == ascending {
            return None;
        }
        Some(handle.with_limit(count).with_ascending(ascending))
    }

    pub fn begin_insert(
        &self,
        handle: &TableHandle,
        columns: Vec<Column>,
        retry_mode: RetryMode,
    ) -> Result<InsertTableHandle> {
        if retry_mode != RetryMode::NoRetries {
            return Err(Error::NotSupported("inserts with retries".to_string()));
        }
        Ok(InsertTableHandle {
            schema_name: handle.schema_name().to_string(),
            retention_policy: handle.retention_policy().to_string(),
            table_name: handle.table_name().to_string(),
            columns,
        })
    }
}
