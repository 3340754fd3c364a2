use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Sumi-Tide
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub stream: StreamConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

/// Output representation of emitted members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputRepresentation {
    /// `{id, quads}` records holding the member's statements
    Quads,

    /// `{id, object}` records holding framed JSON
    Object,
}

/// Event stream behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Seed URL: the event stream, a collection, or its first fragment
    pub url: String,

    /// Floor for re-polling a fetched fragment (milliseconds)
    #[serde(rename = "polling-interval", default = "default_polling_interval")]
    pub polling_interval: u64,

    /// Output representation; serialized text in `mime-type` when absent
    #[serde(default)]
    pub representation: Option<OutputRepresentation>,

    /// Media type of serialized output
    #[serde(rename = "mime-type", default = "default_mime_type")]
    pub mime_type: String,

    /// Media type assumed for pages served without a Content-Type
    #[serde(rename = "input-mime-type", default)]
    pub input_mime_type: Option<String>,

    /// JSON-LD context used when framing members (inline JSON)
    #[serde(rename = "json-ld-context", default)]
    pub json_ld_context: Option<String>,

    /// Only emit members generated at or after this RFC 3339 instant
    #[serde(rename = "from-time", default)]
    pub from_time: Option<String>,

    /// Emit each member identifier at most once
    #[serde(rename = "emit-member-once", default)]
    pub emit_member_once: bool,

    /// Never re-poll fetched fragments
    #[serde(rename = "disable-polling", default)]
    pub disable_polling: bool,

    /// Disable live-edge detection (and with it re-polling)
    #[serde(rename = "disable-synchronization", default)]
    pub disable_synchronization: bool,

    /// Emit unframed JSON-LD
    #[serde(rename = "disable-framing", default)]
    pub disable_framing: bool,

    /// Fetch each member from its own URI instead of the page
    #[serde(rename = "dereference-members", default)]
    pub dereference_members: bool,

    /// Request budget shared by fragment and member fetches
    #[serde(rename = "requests-per-minute", default)]
    pub requests_per_minute: Option<f64>,

    /// Capacity of the seen-set for fragments and members
    #[serde(rename = "processed-uris-count", default = "default_processed_uris_count")]
    pub processed_uris_count: usize,

    /// Default log filter when no verbosity flag is given
    #[serde(rename = "logging-level", default)]
    pub logging_level: Option<String>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Accept header for fragment and member requests
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra request headers; these override `accept` when they name it
    #[serde(rename = "request-headers", default)]
    pub request_headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept: default_accept(),
            timeout_secs: default_timeout_secs(),
            request_headers: BTreeMap::new(),
        }
    }
}

/// Checkpoint persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    /// Path to the SQLite checkpoint database
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

pub(crate) fn default_polling_interval() -> u64 {
    5000
}

pub(crate) fn default_mime_type() -> String {
    "application/ld+json".to_string()
}

pub(crate) fn default_processed_uris_count() -> usize {
    10_000
}

fn default_user_agent() -> String {
    concat!("sumi-tide/", env!("CARGO_PKG_VERSION")).to_string()
}

pub(crate) fn default_accept() -> String {
    "application/n-quads, application/n-triples;q=0.9".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_database_path() -> String {
    "./sumi-tide.db".to_string()
}
