//! HTTP implementation of [`StoreClient`]

use super::{BatchPoints, ChunkSender, QueryResponse, StoreClient};
use crate::config::ConnectorConfig;
use crate::{Error, Result};

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::header::{CONNECTION, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Store client speaking the `/query` and `/write` HTTP endpoints
pub struct HttpStoreClient {
    http: reqwest::Client,
    endpoint: Url,
    username: String,
    password: String,
    write_timeout: Duration,
    keepalive: bool,
}

impl HttpStoreClient {
    /// Build a client from connector configuration
    pub fn connect(config: &ConnectorConfig) -> Result<Self> {
        // read_timeout is an idle deadline per body read, not a whole-request one
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout);
        if !config.keepalive {
            builder = builder.pool_max_idle_per_host(0);
        }
        if config.endpoint.scheme() == "https" && config.tls_skip_verify {
            warn!(url = %config.endpoint, "TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        info!(
            url = %config.endpoint,
            user = %config.username,
            keepalive = config.keepalive,
            "Connecting to store"
        );

        Ok(Self {
            http: builder.build()?,
            endpoint: config.endpoint.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            write_timeout: config.write_timeout,
            keepalive: config.keepalive,
        })
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("endpoint {} cannot be a base URL", self.endpoint)))?
            .pop_if_empty()
            .push(endpoint);
        Ok(url)
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let mut request = self
            .http
            .request(method, self.url(endpoint)?)
            .query(&[("u", self.username.as_str()), ("p", self.password.as_str())]);
        if !self.keepalive {
            request = request.header(CONNECTION, HeaderValue::from_static("close"));
        }
        Ok(request)
    }

    fn query_request(&self, database: Option<&str>, query: &str) -> Result<RequestBuilder> {
        let mut request = self.request(Method::GET, "query")?.query(&[("q", query)]);
        if let Some(db) = database {
            request = request.query(&[("db", db)]);
        }
        Ok(request)
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn query(&self, database: Option<&str>, query: &str) -> Result<QueryResponse> {
        debug!(db = database.unwrap_or(""), query, "Executing query");
        let response = self.query_request(database, query)?.send().await?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn query_chunked(
        &self,
        database: &str,
        query: &str,
        chunk_size: usize,
        sink: ChunkSender,
    ) -> Result<()> {
        let mut request = self
            .query_request(Some(database), query)?
            .query(&[("chunked", "true")]);
        if chunk_size > 0 {
            request = request.query(&[("chunk_size", chunk_size.to_string())]);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("chunked query needs a tokio runtime: {e}")))?;
        debug!(db = database, query, chunk_size, "Starting chunked query");

        runtime.spawn(async move {
            let terminal = tokio::select! {
                result = stream_chunks(request, &sink) => match result {
                    Ok(()) => QueryResponse::done(),
                    Err(e) => {
                        warn!(error = %e, "Chunked query failed");
                        QueryResponse::failed(e.to_string())
                    }
                },
                _ = sink.closed() => {
                    debug!("Chunk consumer went away, abandoning query");
                    return;
                }
            };
            // receiver gone means the scan was abandoned
            let _ = sink.send(terminal);
        });
        Ok(())
    }

    async fn write(&self, batch: &BatchPoints) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let body = batch.to_line_protocol()?;
        let response = self
            .request(Method::POST, "write")?
            .query(&[
                ("db", batch.database.as_str()),
                ("rp", batch.retention_policy.as_str()),
                ("precision", "ns"),
            ])
            .timeout(self.write_timeout)
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        debug!(
            db = %batch.database,
            rp = %batch.retention_policy,
            points = batch.len(),
            "Wrote batch"
        );
        Ok(())
    }
}

/// Read a chunked body, forwarding each newline-delimited JSON chunk
async fn stream_chunks(request: RequestBuilder, sink: &ChunkSender) -> Result<()> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(remote_error(response).await);
    }

    let mut body = response.bytes_stream();
    let mut buffer = BytesMut::new();
    while let Some(piece) = body.next().await {
        buffer.extend_from_slice(&piece?);
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line = buffer.split_to(pos + 1);
            if !forward_chunk(&line[..pos], sink)? {
                return Ok(());
            }
        }
    }
    if !buffer.is_empty() {
        forward_chunk(&buffer, sink)?;
    }
    Ok(())
}

/// Returns `false` once the consumer has dropped its receiver
fn forward_chunk(line: &[u8], sink: &ChunkSender) -> Result<bool> {
    let text = std::str::from_utf8(line)
        .map_err(|e| Error::Serialization(format!("chunk is not UTF-8: {e}")))?
        .trim();
    if text.is_empty() {
        return Ok(true);
    }
    let chunk: QueryResponse = serde_json::from_str(text)?;
    Ok(sink.send(chunk).is_ok())
}

async fn remote_error(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<QueryResponse>(&body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or(body);
    Error::Remote(format!("HTTP {}: {}", status, message.trim()))
}
