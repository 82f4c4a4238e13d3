//! Shared test doubles
//!
//! [`MockStoreClient`] scripts store responses in memory and counts calls.
//! [`FakeStore`] serves the same protocol over HTTP for the real client.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use influxql_connector::client::{BatchPoints, ChunkSender, QueryResponse, Series, StatementResult, StoreClient};
use influxql_connector::{ConnectorConfig, Error, Result};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DB: &str = "telegraf";

pub fn config() -> ConnectorConfig {
    let mut config = ConnectorConfig::new(
        Url::parse("http://localhost:8086").unwrap(),
        "admin",
        "secret",
    );
    config.chunk_poll_timeout = Duration::from_secs(2);
    config
}

pub fn config_for(addr: SocketAddr) -> ConnectorConfig {
    let mut config = config();
    config.endpoint = Url::parse(&format!("http://{}", addr)).unwrap();
    config
}

/// Single-statement response with one series
pub fn series_response(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResponse {
    QueryResponse {
        results: vec![StatementResult {
            statement_id: 0,
            series: vec![Series {
                name: "results".to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                values: rows,
                ..Default::default()
            }],
            error: None,
        }],
        error: None,
    }
}

/// One chunk holding rows of `cpu`
pub fn cpu_chunk(rows: Vec<Vec<Value>>) -> QueryResponse {
    let mut response = series_response(&["time", "host", "usage"], rows);
    response.results[0].series[0].name = "cpu".to_string();
    response
}

#[derive(Default)]
pub struct MockStoreClient {
    responses: Mutex<HashMap<String, QueryResponse>>,
    chunks: Mutex<HashMap<String, Vec<QueryResponse>>>,
    calls: Mutex<HashMap<String, usize>>,
    chunked_queries: Mutex<Vec<(String, String, usize)>>,
    writes: Mutex<Vec<BatchPoints>>,
    delay: Mutex<Option<Duration>>,
}

impl MockStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for database `telegraf` with measurements `cpu` and `mem`
    pub fn with_metadata() -> Self {
        let mock = Self::new();
        mock.respond(
            "show databases",
            series_response(&["name"], vec![vec![json!("_internal")], vec![json!(DB)]]),
        );
        mock.respond(
            "show measurements",
            series_response(&["name"], vec![vec![json!("cpu")], vec![json!("mem")]]),
        );
        mock.respond(
            "show retention policies",
            series_response(
                &["name", "duration", "shardGroupDuration", "replicaN", "default"],
                vec![
                    vec![json!("autogen"), json!("0s"), json!("168h0m0s"), json!(1), json!(true)],
                    vec![json!("weekly"), json!("168h0m0s"), json!("24h0m0s"), json!(1), json!(false)],
                ],
            ),
        );
        mock.respond(
            r#"show tag keys from "cpu""#,
            series_response(&["tagKey"], vec![vec![json!("host")], vec![json!("region")], vec![json!("host")]]),
        );
        mock.respond(
            r#"show field keys from "cpu""#,
            series_response(
                &["fieldKey", "fieldType"],
                vec![
                    vec![json!("usage"), json!("float")],
                    vec![json!("cores"), json!("integer")],
                    vec![json!("up"), json!("boolean")],
                    vec![json!("blob"), json!("binary")],
                ],
            ),
        );
        mock
    }

    pub fn respond(&self, query: &str, response: QueryResponse) {
        self.responses.lock().insert(query.to_string(), response);
    }

    /// Chunks sent verbatim, in order, for a chunked query
    pub fn respond_chunks(&self, query: &str, chunks: Vec<QueryResponse>) {
        self.chunks.lock().insert(query.to_string(), chunks);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self, query: &str) -> usize {
        self.calls.lock().get(query).copied().unwrap_or(0)
    }

    /// `(database, query, chunk_size)` of every chunked query
    pub fn chunked_queries(&self) -> Vec<(String, String, usize)> {
        self.chunked_queries.lock().clone()
    }

    pub fn writes(&self) -> Vec<BatchPoints> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl StoreClient for MockStoreClient {
    async fn query(&self, _database: Option<&str>, query: &str) -> Result<QueryResponse> {
        *self.calls.lock().entry(query.to_string()).or_default() += 1;
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .get(query)
            .cloned()
            .ok_or_else(|| Error::Remote(format!("unexpected query: {query}")))
    }

    fn query_chunked(
        &self,
        database: &str,
        query: &str,
        chunk_size: usize,
        sink: ChunkSender,
    ) -> Result<()> {
        self.chunked_queries
            .lock()
            .push((database.to_string(), query.to_string(), chunk_size));
        let chunks = self
            .chunks
            .lock()
            .get(query)
            .cloned()
            .ok_or_else(|| Error::Remote(format!("unexpected chunked query: {query}")))?;
        for chunk in chunks {
            let _ = sink.send(chunk);
        }
        Ok(())
    }

    async fn write(&self, batch: &BatchPoints) -> Result<()> {
        self.writes.lock().push(batch.clone());
        Ok(())
    }
}

/// A request seen by the fake HTTP store
#[derive(Debug, Clone)]
pub struct Recorded {
    pub params: HashMap<String, String>,
    pub connection: Option<String>,
    pub body: String,
}

/// HTTP store double serving `/query` and `/write`
#[derive(Default)]
pub struct FakeStore {
    responses: Mutex<HashMap<String, Value>>,
    chunks: Mutex<HashMap<String, Vec<Value>>>,
    stalled: Mutex<HashMap<String, Value>>,
    queries: Mutex<Vec<Recorded>>,
    writes: Mutex<Vec<Recorded>>,
}

impl FakeStore {
    pub fn respond(&self, query: &str, body: Value) {
        self.responses.lock().insert(query.to_string(), body);
    }

    pub fn respond_chunks(&self, query: &str, chunks: Vec<Value>) {
        self.chunks.lock().insert(query.to_string(), chunks);
    }

    /// Send one chunk for a chunked query, then hold the body open silently
    pub fn stall_after(&self, query: &str, first: Value) {
        self.stalled.lock().insert(query.to_string(), first);
    }

    pub fn queries(&self) -> Vec<Recorded> {
        self.queries.lock().clone()
    }

    pub fn writes(&self) -> Vec<Recorded> {
        self.writes.lock().clone()
    }

    /// Serve on an ephemeral local port
    pub async fn spawn(self: &Arc<Self>) -> SocketAddr {
        let app = Router::new()
            .route("/query", get(handle_query))
            .route("/write", post(handle_write))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

fn connection_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("connection")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

async fn handle_query(
    State(store): State<Arc<FakeStore>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = params.get("q").cloned().unwrap_or_default();
    let chunked = params.get("chunked").is_some_and(|v| v == "true");
    store.queries.lock().push(Recorded {
        params: params.clone(),
        connection: connection_header(&headers),
        body: String::new(),
    });

    if chunked {
        let stalled = store.stalled.lock().get(&query).cloned();
        if let Some(first) = stalled {
            let head = Bytes::from(format!("{}\n", first));
            let body = futures::stream::once(async move { Ok::<_, std::io::Error>(head) })
                .chain(futures::stream::pending());
            return (StatusCode::OK, Body::from_stream(body)).into_response();
        }
        if let Some(chunks) = store.chunks.lock().get(&query) {
            let body: String = chunks.iter().map(|c| format!("{}\n", c)).collect();
            return (StatusCode::OK, body).into_response();
        }
    }
    match store.responses.lock().get(&query) {
        Some(body) => Json(body.clone()).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("error parsing query: {}", query) })),
        )
            .into_response(),
    }
}

async fn handle_write(
    State(store): State<Arc<FakeStore>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> StatusCode {
    store.writes.lock().push(Recorded {
        params,
        connection: connection_header(&headers),
        body,
    });
    StatusCode::NO_CONTENT
}
