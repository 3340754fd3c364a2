//! Capabilities the stream engine delegates to
//!
//! Each collaborator is one narrow async trait. The engine only ever holds
//! them as `Arc<dyn …>` inside a [`Collaborators`] bundle, so any
//! implementation with a matching signature (the HTTP/N-Quads/TREE defaults
//! or in-memory test doubles) can be swapped in.

use crate::config::HttpConfig;
use crate::metadata::{FeedMetadata, TreeMetadataExtractor};
use crate::rdf::{JsonLdFramer, NQuadsParser, Quad, QuadSerializer};
use crate::stream::fetcher::HttpPageFetcher;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Request or response header map; names are stored lowercase
pub type Headers = BTreeMap<String, String>;

/// A fetched page together with the information needed for cache evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Body text
    pub body: String,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Headers that were sent with the request
    pub request_headers: Headers,

    /// Headers received with the response
    pub response_headers: Headers,
}

impl Page {
    /// Creates a 200 page with the given body and content type
    pub fn ok(url: &str, content_type: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            status_code: 200,
            body: body.to_string(),
            content_type: Some(content_type.to_string()),
            request_headers: Headers::new(),
            response_headers: Headers::new(),
        }
    }

    /// Adds a response header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.response_headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Looks up a response header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Looks up a request header (case-insensitive)
    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the media type without parameters (`text/plain; charset=…` → `text/plain`)
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or(ct)
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Fetches a page over the network
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` sending `headers`
    ///
    /// # Returns
    ///
    /// * `Ok(Page)` - The page, including non-success statuses the fetcher
    ///   chooses to surface
    /// * `Err(TideError)` - Transport failure or rejected status
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<Page>;
}

/// Turns a document body into statements
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, body: &str, base_url: &str, media_type: &str) -> Result<Vec<Quad>>;
}

/// Reads relation links and collection membership from a parsed page
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, quads: &[Quad], url: &str) -> Result<FeedMetadata>;
}

/// Produces a JSON document rooted at one member
#[async_trait]
pub trait Framer: Send + Sync {
    async fn frame(&self, id: &str, quads: &[Quad], context: Option<&Value>) -> Result<Value>;
}

/// Serializes statements to text in a media type
#[async_trait]
pub trait Serializer: Send + Sync {
    async fn serialize(&self, quads: &[Quad], media_type: &str) -> Result<String>;
}

/// The set of collaborators injected into an [`EventStream`](crate::stream::EventStream)
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn PageFetcher>,
    pub parser: Arc<dyn DocumentParser>,
    pub metadata: Arc<dyn MetadataExtractor>,
    pub framer: Arc<dyn Framer>,
    pub serializer: Arc<dyn Serializer>,
}

impl Collaborators {
    /// Default collaborators around an HTTP fetcher
    ///
    /// # Arguments
    ///
    /// * `config` - HTTP client settings (user agent, timeout)
    ///
    /// # Returns
    ///
    /// * `Ok(Collaborators)` - The bundle
    /// * `Err(TideError)` - The HTTP client could not be built
    pub fn http(config: &HttpConfig) -> Result<Self> {
        let fetcher = HttpPageFetcher::new(config)?;
        Ok(Self::with_fetcher(Arc::new(fetcher)))
    }

    /// Default parsing, metadata, framing and serialization around any fetcher
    pub fn with_fetcher(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            parser: Arc::new(NQuadsParser),
            metadata: Arc::new(TreeMetadataExtractor),
            framer: Arc::new(JsonLdFramer),
            serializer: Arc::new(QuadSerializer),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
