use crate::config::types::{CheckpointConfig, Config, HttpConfig, StreamConfig};
use crate::rdf::nquads::is_supported_output;
use crate::ConfigError;
use chrono::{DateTime, Utc};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_stream_config(&config.stream)?;
    validate_http_config(&config.http)?;
    validate_checkpoint_config(&config.checkpoint)?;
    Ok(())
}

/// Validates event stream configuration
fn validate_stream_config(config: &StreamConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid stream url '{}': {}", config.url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Stream url '{}' must use http or https",
            config.url
        )));
    }

    if config.polling_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "polling_interval must be >= 1ms, got {}ms",
            config.polling_interval
        )));
    }

    if config.processed_uris_count < 1 {
        return Err(ConfigError::Validation(format!(
            "processed_uris_count must be >= 1, got {}",
            config.processed_uris_count
        )));
    }

    if let Some(rpm) = config.requests_per_minute {
        if !(rpm.is_finite() && rpm > 0.0) {
            return Err(ConfigError::Validation(format!(
                "requests_per_minute must be a positive number, got {}",
                rpm
            )));
        }
    }

    if !is_supported_output(&config.mime_type) {
        return Err(ConfigError::Validation(format!(
            "Unsupported output mime_type '{}'",
            config.mime_type
        )));
    }

    if let Some(raw) = &config.from_time {
        parse_from_time(raw)?;
    }

    if let Some(raw) = &config.json_ld_context {
        parse_json_ld_context(raw)?;
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    for name in config.request_headers.keys() {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigError::Validation(format!(
                "Invalid request header name '{}'",
                name
            )));
        }
    }

    Ok(())
}

/// Validates checkpoint configuration
fn validate_checkpoint_config(config: &CheckpointConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Parses the `from-time` option
pub fn parse_from_time(raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ConfigError::Validation(format!("Invalid from_time '{}': {}", raw, e)))
}

/// Parses the `json-ld-context` option
pub fn parse_json_ld_context(raw: &str) -> Result<serde_json::Value, ConfigError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidContext(e.to_string()))?;
    if !(value.is_object() || value.is_array() || value.is_string()) {
        return Err(ConfigError::InvalidContext(
            "context must be an object, array or IRI string".to_string(),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn stream_toml(extra: &str) -> String {
        format!("[stream]\nurl = \"https://example.org/feed\"\n{}\n", extra)
    }

    #[test]
    fn test_valid_minimal_config() {
        assert!(parse_config(&stream_toml("")).is_ok());
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(matches!(
            parse_config("[stream]\nurl = \"not a url\"\n"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_config("[stream]\nurl = \"ftp://example.org/feed\"\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert!(parse_config(&stream_toml("requests-per-minute = 0")).is_err());
        assert!(parse_config(&stream_toml("requests-per-minute = -3.5")).is_err());
        assert!(parse_config(&stream_toml("requests-per-minute = 2")).is_ok());
    }

    #[test]
    fn test_rejects_unsupported_mime_type() {
        assert!(parse_config(&stream_toml("mime-type = \"text/turtle\"")).is_err());
        assert!(parse_config(&stream_toml("mime-type = \"application/n-quads\"")).is_ok());
    }

    #[test]
    fn test_from_time_must_be_rfc3339() {
        assert!(parse_config(&stream_toml("from-time = \"yesterday\"")).is_err());
        let parsed = parse_from_time("2022-03-01T10:00:00+01:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2022-03-01T09:00:00+00:00");
    }

    #[test]
    fn test_json_ld_context_must_be_json() {
        assert!(matches!(
            parse_config(&stream_toml("json-ld-context = '{not json'")),
            Err(ConfigError::InvalidContext(_))
        ));
        assert!(parse_json_ld_context("42").is_err());
        assert!(parse_json_ld_context("\"https://example.org/context.jsonld\"").is_ok());
    }

    #[test]
    fn test_rejects_bad_header_name() {
        let toml = format!(
            "{}\n[http.request-headers]\n\"Bad Header\" = \"x\"\n",
            stream_toml("")
        );
        assert!(parse_config(&toml).is_err());
    }
}
