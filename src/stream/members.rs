//! Member selection and realization
//!
//! A fragment lists candidate member identifiers. Each candidate passes the
//! recency filter and the emit-once filter before its body is built, either
//! from the statements already on the page or by fetching the member itself.

use crate::rdf::{vocab, Quad};
use crate::stream::collaborators::{DocumentParser, Headers, PageFetcher};
use crate::stream::dedup::DedupCache;
use crate::stream::rate_limiter::RateLimiter;
use crate::{Result, TideError};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Statements of a page grouped by subject key
pub type SubjectIndex<'a> = HashMap<String, Vec<&'a Quad>>;

/// Groups statements by subject, keeping document order within a subject
pub fn index_by_subject(quads: &[Quad]) -> SubjectIndex<'_> {
    let mut index: SubjectIndex<'_> = HashMap::new();
    for quad in quads {
        index.entry(quad.subject.key()).or_default().push(quad);
    }
    index
}

/// Collects every statement reachable from `member_id`
///
/// Objects that are named or blank nodes are followed. Every identifier in
/// `member_ids` counts as visited from the start, so one member never absorbs
/// another declared member's statements. Subjects absent from the page are
/// skipped.
///
/// # Arguments
///
/// * `member_id` - The member to start from
/// * `index` - The page's statements by subject
/// * `member_ids` - All members declared on the page
pub fn extract_member(member_id: &str, index: &SubjectIndex<'_>, member_ids: &[String]) -> Vec<Quad> {
    let mut done: HashSet<String> = member_ids.iter().cloned().collect();
    let mut stack = vec![member_id.to_string()];
    let mut result = Vec::new();

    while let Some(subject) = stack.pop() {
        let Some(statements) = index.get(&subject) else {
            continue;
        };
        for quad in statements {
            result.push((*quad).clone());
            if quad.object.is_reference() {
                let key = quad.object.key();
                if done.insert(key.clone()) {
                    stack.push(key);
                }
            }
        }
    }

    result
}

/// Parses a timestamp literal
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    // Timestamps without an offset are read as UTC
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Reads the `prov:generatedAtTime` of a member from its own statements
pub fn extract_event_time(statements: &[&Quad]) -> Option<DateTime<Utc>> {
    statements
        .iter()
        .find(|q| q.subject.is_named_node() && q.predicate.value() == vocab::PROV_GENERATED_AT_TIME)
        .and_then(|q| parse_timestamp(q.object.value()))
}

/// A member that passed the filters
#[derive(Debug, Clone, PartialEq)]
pub enum MemberCandidate {
    /// Body built from the page's own statements
    Local { id: String, quads: Vec<Quad> },

    /// Body still to be fetched from the member's own URI
    Remote { id: String },
}

impl MemberCandidate {
    pub fn id(&self) -> &str {
        match self {
            Self::Local { id, .. } | Self::Remote { id } => id,
        }
    }
}

/// Applies member filters and chooses the realization strategy
#[derive(Debug, Clone, Default)]
pub struct MemberExtractor {
    /// Minimum `prov:generatedAtTime` a member must carry
    pub from_time: Option<DateTime<Utc>>,

    /// Skip members already present in the seen-set
    pub emit_member_once: bool,

    /// Fetch each member from its own URI instead of the page
    pub dereference: bool,
}

impl MemberExtractor {
    /// Selects the members of a page to emit, in declaration order
    ///
    /// Every member that passes the recency filter and the emit-once check is
    /// marked seen before its body is built.
    ///
    /// # Arguments
    ///
    /// * `quads` - All statements of the page
    /// * `member_ids` - Members declared by the page's collections
    /// * `seen` - The seen-set shared with fragment tracking
    ///
    /// # Returns
    ///
    /// The candidates to realize
    pub fn select(
        &self,
        quads: &[Quad],
        member_ids: &[String],
        seen: &mut DedupCache,
    ) -> Vec<MemberCandidate> {
        let index = index_by_subject(quads);
        let mut candidates = Vec::new();

        for id in member_ids {
            if let Some(from_time) = self.from_time {
                let own = index.get(id).map(Vec::as_slice).unwrap_or(&[]);
                match extract_event_time(own) {
                    Some(t) if t >= from_time => {}
                    _ => {
                        tracing::trace!("Skipping member {} before {}", id, from_time);
                        continue;
                    }
                }
            }

            if self.emit_member_once && seen.has(id) {
                tracing::trace!("Skipping already emitted member {}", id);
                continue;
            }

            seen.set(id);

            if self.dereference {
                candidates.push(MemberCandidate::Remote { id: id.clone() });
            } else {
                candidates.push(MemberCandidate::Local {
                    id: id.clone(),
                    quads: extract_member(id, &index, member_ids),
                });
            }
        }

        candidates
    }
}

/// Fetches and parses a member from its own URI
///
/// Waits for the shared rate limiter before the request.
///
/// # Returns
///
/// * `Ok(Vec<Quad>)` - All statements of the member document
/// * `Err(TideError)` - The fetch or parse failed
pub async fn dereference_member(
    id: &str,
    fetcher: &dyn PageFetcher,
    parser: &dyn DocumentParser,
    limiter: &RateLimiter,
    headers: &Headers,
) -> Result<Vec<Quad>> {
    limiter.plan_request(id).await;
    let page = fetcher.fetch(id, headers).await?;
    let media_type = page
        .media_type()
        .ok_or_else(|| TideError::MissingContentType { url: page.url.clone() })?;
    parser.parse(&page.body, &page.url, &media_type).await
}
