//! HTTP freshness evaluation for re-polling fragments
//!
//! Evaluated from a private-cache perspective: `s-maxage` and other
//! shared-cache directives are ignored, `private` responses are storable.

use crate::stream::collaborators::Page;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Status codes whose responses may be stored
const STORABLE_STATUSES: [u16; 12] = [200, 203, 204, 206, 300, 301, 308, 404, 405, 410, 414, 501];

/// Fraction of the `Last-Modified` age used as heuristic freshness
const HEURISTIC_FRACTION: f64 = 0.1;

/// Parses a `Cache-Control` header into lowercase directive names and values
fn directives(header: Option<&str>) -> HashMap<String, Option<String>> {
    header
        .unwrap_or("")
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let mut kv = part.splitn(2, '=');
            let name = kv.next()?.trim().to_ascii_lowercase();
            let value = kv.next().map(|v| v.trim().trim_matches('"').to_string());
            Some((name, value))
        })
        .collect()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn seconds(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|v| v.parse::<i64>().ok())
}

/// Returns true if the response may be stored by a private cache
pub fn is_storable(page: &Page) -> bool {
    if !STORABLE_STATUSES.contains(&page.status_code) {
        return false;
    }
    let request = directives(page.request_header("cache-control"));
    let response = directives(page.header("cache-control"));
    !request.contains_key("no-store") && !response.contains_key("no-store")
}

/// Computes how long the response stays fresh
///
/// # Arguments
///
/// * `page` - The fetched page with request and response headers
/// * `now` - Evaluation time; a `Date` before it counts towards the age
///
/// # Returns
///
/// * `Some(Duration)` - Remaining freshness (zero when already stale)
/// * `None` - The response is not storable
pub fn time_to_live(page: &Page, now: DateTime<Utc>) -> Option<Duration> {
    if !is_storable(page) {
        return None;
    }

    let response = directives(page.header("cache-control"));
    if response.contains_key("no-cache") {
        return Some(Duration::ZERO);
    }
    // Vary: * never matches a later request
    if page.header("vary").map(str::trim) == Some("*") {
        return Some(Duration::ZERO);
    }

    let date = page
        .header("date")
        .and_then(parse_http_date)
        .unwrap_or(now);

    let lifetime = if let Some(max_age) = response.get("max-age").and_then(seconds) {
        max_age
    } else if let Some(expires) = page.header("expires") {
        // An unparseable Expires means already expired
        parse_http_date(expires)
            .map(|t| (t - date).num_seconds())
            .unwrap_or(0)
    } else if let Some(modified) = page.header("last-modified").and_then(parse_http_date) {
        ((date - modified).num_seconds() as f64 * HEURISTIC_FRACTION) as i64
    } else {
        0
    };

    let age_header = page
        .header("age")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0);
    let apparent_age = (now - date).num_seconds().max(0);
    let age = age_header.max(apparent_age);

    let remaining = (lifetime - age).max(0);
    Some(Duration::from_secs(remaining as u64))
}

/// Delay before a fetched fragment is polled again
///
/// At least `polling_interval`; longer when the response stays fresh longer.
pub fn polling_ttl(page: &Page, polling_interval: Duration, now: DateTime<Utc>) -> Duration {
    let fresh = time_to_live(page, now).unwrap_or(Duration::ZERO);
    polling_interval.max(fresh)
}
