//! Error types for the InfluxQL connector

use std::fmt;
use std::time::Duration;

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the InfluxQL connector
#[derive(Debug)]
pub enum Error {
    /// HTTP transport errors
    Http(reqwest::Error),
    /// Serialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// A caller broke an API contract (bad field index, wrong getter type)
    InvalidArgument(String),
    /// A literal could not be encoded for the column type it targets
    UnsupportedType(String),
    /// The requested pushdown or write mode is not supported
    NotSupported(String),
    /// Error reported by the remote store inside a response
    Remote(String),
    /// No chunk arrived within the poll timeout
    ChunkPollTimeout(Duration),
    /// The chunk producer went away without an end-of-stream marker
    StreamClosed,
    /// A metadata cache load failed
    Cache(String),
    /// Table could not be resolved
    TableNotFound { schema: String, table: String },
    /// A point could not be built for writing
    InvalidPoint(String),
    /// Internal error
    Internal(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::UnsupportedType(msg) => write!(f, "Unhandled type: {}", msg),
            Error::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            Error::Remote(msg) => write!(f, "Remote error: {}", msg),
            Error::ChunkPollTimeout(timeout) => {
                write!(f, "No query result chunk received within {:?}", timeout)
            }
            Error::StreamClosed => {
                write!(f, "Query result stream closed before the end-of-stream marker")
            }
            Error::Cache(msg) => write!(f, "Cache error: {}", msg),
            Error::TableNotFound { schema, table } => {
                write!(f, "Table not found: {}.{}", schema, table)
            }
            Error::InvalidPoint(msg) => write!(f, "Invalid point: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Config(format!("invalid endpoint URL: {}", e))
    }
}
