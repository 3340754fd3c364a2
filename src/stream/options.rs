use crate::config::{
    parse_from_time, parse_json_ld_context, Config, OutputRepresentation,
};
use crate::rdf::nquads::JSON_LD;
use crate::stream::collaborators::Headers;
use crate::ConfigResult;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// Runtime options of an [`EventStream`](crate::stream::EventStream)
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Floor for re-polling a fetched fragment
    pub polling_interval: Duration,

    /// Output representation; serialized text when `None`
    pub representation: Option<OutputRepresentation>,

    /// Headers sent with every fragment and member request
    pub request_headers: Headers,

    /// Media type of serialized output
    pub mime_type: String,

    /// Media type assumed for pages without a Content-Type
    pub input_mime_type: Option<String>,

    /// Context used when framing members
    pub json_ld_context: Option<Value>,

    /// Only emit members generated at or after this instant
    pub from_time: Option<DateTime<Utc>>,

    pub emit_member_once: bool,
    pub disable_polling: bool,
    pub disable_synchronization: bool,
    pub disable_framing: bool,
    pub dereference_members: bool,

    /// Request budget shared by fragment and member fetches
    pub requests_per_minute: Option<f64>,

    /// Capacity of the seen-set
    pub processed_uris_count: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_millis(5000),
            representation: None,
            request_headers: Headers::new(),
            mime_type: JSON_LD.to_string(),
            input_mime_type: None,
            json_ld_context: None,
            from_time: None,
            emit_member_once: false,
            disable_polling: false,
            disable_synchronization: false,
            disable_framing: false,
            dereference_members: false,
            requests_per_minute: None,
            processed_uris_count: 10_000,
        }
    }
}

impl StreamOptions {
    /// Builds options from a validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(StreamOptions)` - The options
    /// * `Err(ConfigError)` - `from-time` or `json-ld-context` failed to parse
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let stream = &config.stream;

        let from_time = stream.from_time.as_deref().map(parse_from_time).transpose()?;
        let json_ld_context = stream
            .json_ld_context
            .as_deref()
            .map(parse_json_ld_context)
            .transpose()?;

        let request_headers = config
            .http
            .request_headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        Ok(Self {
            polling_interval: Duration::from_millis(stream.polling_interval),
            representation: stream.representation,
            request_headers,
            mime_type: stream.mime_type.clone(),
            input_mime_type: stream.input_mime_type.clone(),
            json_ld_context,
            from_time,
            emit_member_once: stream.emit_member_once,
            disable_polling: stream.disable_polling,
            disable_synchronization: stream.disable_synchronization,
            disable_framing: stream.disable_framing,
            dereference_members: stream.dereference_members,
            requests_per_minute: stream.requests_per_minute,
            processed_uris_count: stream.processed_uris_count,
        })
    }

    /// Returns true if fetched fragments are scheduled to be polled again
    pub fn polls(&self) -> bool {
        !self.disable_polling && !self.disable_synchronization && !self.polling_interval.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_from_config() {
        let config = parse_config(
            r#"
[stream]
url = "https://example.org/feed"
polling-interval = 1500
representation = "quads"
from-time = "2022-01-01T00:00:00Z"
json-ld-context = '{"ex": "https://example.org/ns#"}'
emit-member-once = true

[http.request-headers]
Authorization = "Bearer abc"
"#,
        )
        .unwrap();

        let options = StreamOptions::from_config(&config).unwrap();
        assert_eq!(options.polling_interval, Duration::from_millis(1500));
        assert_eq!(options.representation, Some(OutputRepresentation::Quads));
        assert!(options.from_time.is_some());
        assert_eq!(
            options.json_ld_context.unwrap()["ex"],
            "https://example.org/ns#"
        );
        assert!(options.emit_member_once);
        assert_eq!(options.request_headers["authorization"], "Bearer abc");
    }

    #[test]
    fn test_polls() {
        let mut options = StreamOptions::default();
        assert!(options.polls());

        options.disable_synchronization = true;
        assert!(!options.polls());

        options = StreamOptions {
            disable_polling: true,
            ..StreamOptions::default()
        };
        assert!(!options.polls());

        options = StreamOptions {
            polling_interval: Duration::ZERO,
            ..StreamOptions::default()
        };
        assert!(!options.polls());
    }
}
