//! Metadata cache session
//!
//! The session is the single point of contact with the store. It owns the
//! memoized client, caches schema metadata with a fixed time-to-live, and
//! exposes the raw query and write paths used by scans and inserts.
//!
//! Caches are unbounded and expire entries a fixed time after they were
//! loaded. Concurrent misses on one key share a single load.

use crate::client::{
    value_to_string, BatchPoints, ChunkReceiver, HttpStoreClient, QueryResponse, Series,
    StoreClient,
};
use crate::config::ConnectorConfig;
use crate::connector::SchemaTableName;
use crate::query::compiler::quote_identifier;
use crate::query::ChunkedResultCursor;
use crate::schema::{Column, ColumnType, Table};
use crate::{Error, Result};

use moka::future::Cache;
use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, info, warn};

/// Key of the single schema-name cache entry
const ALL_SCHEMAS: &str = "$all";

pub struct MetadataSession {
    config: ConnectorConfig,
    client: OnceCell<Arc<dyn StoreClient>>,
    schema_names: Cache<&'static str, Arc<BTreeSet<String>>>,
    table_names: Cache<String, Arc<BTreeSet<String>>>,
    retention_policies: Cache<String, Option<String>>,
    columns: Cache<SchemaTableName, Arc<Vec<Column>>>,
    loads: AtomicU64,
}

impl MetadataSession {
    /// Session that connects on first use
    pub fn new(config: ConnectorConfig) -> Self {
        Self::build(config, OnceCell::new())
    }

    /// Session over an existing client
    pub fn with_client(config: ConnectorConfig, client: Arc<dyn StoreClient>) -> Self {
        Self::build(config, OnceCell::new_with(Some(client)))
    }

    fn build(config: ConnectorConfig, client: OnceCell<Arc<dyn StoreClient>>) -> Self {
        let ttl = config.cache_expire;
        Self {
            client,
            schema_names: metadata_cache("schema-names", ttl),
            table_names: metadata_cache("table-names", ttl),
            retention_policies: metadata_cache("retention-policies", ttl),
            columns: metadata_cache("columns", ttl),
            loads: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Establish the connection if that has not happened yet
    pub async fn ensure_connected(&self) -> Result<()> {
        self.client().await.map(|_| ())
    }

    async fn client(&self) -> Result<&Arc<dyn StoreClient>> {
        self.client
            .get_or_try_init(|| async {
                let client: Arc<dyn StoreClient> = Arc::new(HttpStoreClient::connect(&self.config)?);
                Ok::<_, Error>(client)
            })
            .await
    }

    /// Number of cache loads that reached the store
    pub fn metadata_loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub async fn list_schema_names(&self) -> Result<Vec<String>> {
        let names = self
            .schema_names
            .try_get_with(ALL_SCHEMAS, async {
                let response = self.load(None, "show databases").await?;
                Ok::<_, Error>(Arc::new(first_column(response.first_series()?)))
            })
            .await
            .map_err(|e| cache_error("schema names", "", &e))?;
        Ok(names.iter().cloned().collect())
    }

    pub async fn list_table_names(&self, schema: &str) -> Result<BTreeSet<String>> {
        let names = self
            .table_names
            .try_get_with(schema.to_string(), async {
                let response = self.load(Some(schema), "show measurements").await?;
                Ok::<_, Error>(Arc::new(first_column(response.first_series()?)))
            })
            .await
            .map_err(|e| cache_error("table names", schema, &e))?;
        Ok(names.as_ref().clone())
    }

    /// Retention policy marked default for a schema, `None` when there is none
    pub async fn default_retention_policy(&self, schema: &str) -> Result<Option<String>> {
        self.retention_policies
            .try_get_with(schema.to_string(), async {
                let response = self.load(Some(schema), "show retention policies").await?;
                let policy = default_policy(response.first_series()?);
                if policy.is_none() {
                    warn!(schema, "No default retention policy");
                }
                Ok::<_, Error>(policy)
            })
            .await
            .map_err(|e| cache_error("default retention policy", schema, &e))
    }

    /// Columns of a table: time first, then tags, then fields
    pub async fn columns_for(&self, schema: &str, table: &str) -> Result<Arc<Vec<Column>>> {
        let key = SchemaTableName::new(schema, table);
        self.columns
            .try_get_with(key, self.load_columns(schema, table))
            .await
            .map_err(|e| cache_error("columns", &format!("{}.{}", schema, table), &e))
    }

    pub async fn get_table(&self, schema: &str, table: &str) -> Result<Table> {
        let columns = self.columns_for(schema, table).await?;
        Table::new(table, columns.as_ref().clone())
    }

    async fn load_columns(&self, schema: &str, table: &str) -> Result<Arc<Vec<Column>>> {
        let mut columns = vec![Column::time()];
        let mut seen: HashSet<String> = columns.iter().map(|c| c.name.clone()).collect();

        let query = format!("show tag keys from {}", quote_identifier(table));
        let tags = self.load(Some(schema), &query).await?;
        for series in tags.first_series()? {
            for key in series.values.iter().filter_map(|row| row.first()) {
                let key = value_to_string(key);
                if !key.is_empty() && seen.insert(key.clone()) {
                    columns.push(Column::tag(key));
                }
            }
        }

        let query = format!("show field keys from {}", quote_identifier(table));
        let fields = self.load(Some(schema), &query).await?;
        for series in fields.first_series()? {
            for row in &series.values {
                let (Some(key), Some(field_type)) = (row.first(), row.get(1)) else {
                    continue;
                };
                let key = value_to_string(key);
                let field_type = value_to_string(field_type);
                match ColumnType::from_field_type(&field_type) {
                    Some(column_type) => {
                        if seen.insert(key.clone()) {
                            columns.push(Column::field(key, column_type));
                        } else {
                            warn!(schema, table, field = %key, "Field shadows a tag, skipping");
                        }
                    }
                    None => {
                        warn!(schema, table, field = %key, field_type = %field_type, "Unknown field type, skipping");
                    }
                }
            }
        }

        debug!(schema, table, columns = columns.len(), "Loaded columns");
        Ok(Arc::new(columns))
    }

    async fn load(&self, schema: Option<&str>, query: &str) -> Result<QueryResponse> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        debug!(schema = schema.unwrap_or(""), query, "Loading metadata");
        self.execute_blocking(schema, query).await
    }

    /// Run a query and wait for the whole response
    pub async fn execute_blocking(&self, schema: Option<&str>, query: &str) -> Result<QueryResponse> {
        self.client().await?.query(schema, query).await
    }

    /// Start a chunked query and hand back its chunk queue without waiting
    pub async fn execute_chunked(&self, schema: &str, query: &str) -> Result<ChunkReceiver> {
        let client = self.client().await?;
        let (sender, receiver) = mpsc::unbounded_channel();
        client.query_chunked(schema, query, self.config.chunk_size, sender)?;
        Ok(receiver)
    }

    /// Start a chunked query and open a cursor over it
    pub async fn open_chunked(&self, schema: &str, query: &str) -> Result<ChunkedResultCursor> {
        let receiver = self.execute_chunked(schema, query).await?;
        ChunkedResultCursor::open(receiver, self.config.chunk_poll_timeout).await
    }

    pub async fn write(&self, batch: &BatchPoints) -> Result<()> {
        self.client().await?.write(batch).await
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        info!("Invalidating metadata caches");
        self.schema_names.invalidate_all();
        self.table_names.invalidate_all();
        self.retention_policies.invalidate_all();
        self.columns.invalidate_all();
    }
}

fn metadata_cache<K, V>(name: &str, ttl: Duration) -> Cache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder().name(name).time_to_live(ttl).build()
}

fn cache_error(what: &str, key: &str, err: &Arc<Error>) -> Error {
    if key.is_empty() {
        Error::Cache(format!("failed to load {}: {}", what, err))
    } else {
        Error::Cache(format!("failed to load {} for {}: {}", what, key, err))
    }
}

/// First value of every row across all series
fn first_column(series: &[Series]) -> BTreeSet<String> {
    series
        .iter()
        .flat_map(|s| s.values.iter())
        .filter_map(|row| row.first())
        .map(value_to_string)
        .filter(|name| !name.is_empty())
        .collect()
}

fn default_policy(series: &[Series]) -> Option<String> {
    series.iter().find_map(|s| {
        let position = |name: &str| s.columns.iter().position(|c| c.eq_ignore_ascii_case(name));
        let (name, default) = (position("name")?, position("default")?);
        s.values
            .iter()
            .find(|row| {
                row.get(default)
                    .is_some_and(|v| value_to_string(v).eq_ignore_ascii_case("true"))
            })
            .and_then(|row| row.get(name))
            .map(value_to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(columns: &[&str], values: Vec<Vec<serde_json::Value>>) -> Series {
        Series {
            name: "m".into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values,
            ..Default::default()
        }
    }

    #[test]
    fn first_column_flattens_series() {
        let names = first_column(&[
            series(&["name"], vec![vec![json!("b")], vec![json!("a")]]),
            series(&["name"], vec![vec![json!("a")], vec![json!("c")]]),
        ]);
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn default_policy_matches_columns_case_insensitively() {
        let s = series(
            &["Name", "duration", "Default"],
            vec![
                vec![json!("weekly"), json!("168h0m0s"), json!(false)],
                vec![json!("autogen"), json!("0s"), json!("TRUE")],
            ],
        );
        assert_eq!(default_policy(&[s]), Some("autogen".to_string()));
    }

    #[test]
    fn default_policy_absent_without_marker_or_columns() {
        let unmarked = series(&["name", "default"], vec![vec![json!("autogen"), json!(false)]]);
        assert_eq!(default_policy(&[unmarked]), None);
        let no_default_column = series(&["name"], vec![vec![json!("autogen")]]);
        assert_eq!(default_policy(&[no_default_column]), None);
    }
}
