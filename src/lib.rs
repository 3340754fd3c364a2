//! Sumi-Tide: A polite event-stream follower
//!
//! This crate implements a long-lived client for paginated linked-data feeds.
//! It walks fragment pages connected by relation links, emits newly published
//! members in discovery order, keeps polling the live edge of the feed, and
//! can checkpoint its whole traversal state so a later process resumes without
//! loss or duplication.

pub mod config;
pub mod metadata;
pub mod output;
pub mod rdf;
pub mod state;
pub mod storage;
pub mod stream;

use thiserror::Error;

/// Main error type for Sumi-Tide operations
#[derive(Debug, Error)]
pub enum TideError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Missing Content-Type header for {url}")]
    MissingContentType { url: String },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Parse error in {base} at line {line}: {message}")]
    Parse {
        base: String,
        line: usize,
        message: String,
    },

    #[error("Invalid RDF term: {0}")]
    InvalidTerm(String),

    #[error("Metadata extraction error for {url}: {message}")]
    Metadata { url: String, message: String },

    #[error("Framing error for {id}: {message}")]
    Framing { id: String, message: String },

    #[error("Cannot export state while stream is {state} (pause the stream or let it end first)")]
    ExportWhileRunning { state: state::StreamState },

    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid JSON-LD context: {0}")]
    InvalidContext(String),
}

/// Result type alias for Sumi-Tide operations
pub type Result<T> = std::result::Result<T, TideError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{FragmentState, StreamState};
pub use stream::{Checkpoint, Collaborators, Delivery, EventStream, Record, StreamEvent};
