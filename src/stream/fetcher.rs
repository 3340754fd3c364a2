//! HTTP page fetcher
//!
//! This module handles the network side of the stream:
//! - Building the HTTP client with the configured user agent and timeout
//! - GET requests with the configured Accept and custom headers
//! - Redirect following (the final URL is reported back)
//! - Error classification for logging

use crate::config::HttpConfig;
use crate::stream::collaborators::{Headers, Page, PageFetcher};
use crate::{Result, TideError};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_tide::config::HttpConfig;
/// use sumi_tide::stream::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    default_headers: Headers,
}

impl HttpPageFetcher {
    /// Creates a fetcher from the HTTP configuration
    ///
    /// The configured `accept` value becomes a default request header.
    /// Headers passed to [`PageFetcher::fetch`] override it.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = build_http_client(config)?;

        let mut default_headers = Headers::new();
        default_headers.insert("accept".to_string(), config.accept.clone());

        Ok(Self {
            client,
            default_headers,
        })
    }

    /// Headers sent with every request unless overridden per call
    pub fn default_headers(&self) -> &Headers {
        &self.default_headers
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    /// Fetches a URL, following redirects
    ///
    /// # Error Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx | `Ok(Page)` |
    /// | Any other status | `TideError::HttpStatus` |
    /// | Timeout / connection refused / TLS | `TideError::Http` |
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<Page> {
        let mut request_headers = self.default_headers.clone();
        for (name, value) in headers {
            request_headers.insert(name.to_ascii_lowercase(), value.clone());
        }

        let mut request = self.client.get(url);
        for (name, value) in &request_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            tracing::debug!("GET {} {}", url, kind);
            TideError::Http {
                url: url.to_string(),
                source: e,
            }
        })?;

        let status = response.status();
        let final_url = response.url().to_string();
        tracing::debug!("GET {} -> {} ({})", url, status.as_u16(), final_url);

        if !status.is_success() {
            return Err(TideError::HttpStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let mut response_headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                response_headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }
        let content_type = response_headers.get("content-type").cloned();

        let body = response.text().await.map_err(|e| TideError::Http {
            url: final_url.clone(),
            source: e,
        })?;

        Ok(Page {
            url: final_url,
            status_code: status.as_u16(),
            body,
            content_type,
            request_headers,
            response_headers,
        })
    }
}
