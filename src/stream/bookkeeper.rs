//! Fragment registry and fetch scheduling
//!
//! This module handles:
//! - Registering fragments discovered as the seed or as relation targets
//! - Choosing the next fragment: earliest eligible time, first-come first-served on ties
//! - Blacklisting fragments permanently
//! - Detecting when traversal has caught up with the live edge (syncing mode)
//! - Serializing the whole registry for checkpoints

use crate::state::FragmentState;
use crate::{Result, TideError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// The fragment chosen for the next fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextFragment {
    /// The fragment URL
    pub url: String,

    /// When the fragment becomes eligible; the caller waits until then
    pub refetch_time: DateTime<Utc>,
}

impl NextFragment {
    /// Time left until the fragment is eligible, zero if it already is
    pub fn wait_from(&self, now: DateTime<Utc>) -> Duration {
        (self.refetch_time - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Persisted form of one registry entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedFragment {
    url: String,
    next_eligible_fetch_time: Option<DateTime<Utc>>,
    blacklisted: bool,
}

/// Registry of known fragments and their scheduling state
///
/// Fragments are never removed. Fetching one clears its pending time; it is
/// scheduled again by a polling re-registration or by rediscovery.
#[derive(Debug, Clone, Default)]
pub struct FragmentBookkeeper {
    fragments: HashMap<String, FragmentState>,
    next_sequence: u64,
}

impl FragmentBookkeeper {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding only `seed`, eligible immediately
    pub fn seeded(seed: &str) -> Self {
        let mut bookkeeper = Self::new();
        bookkeeper.add_fragment(seed, Duration::ZERO);
        bookkeeper
    }

    fn allocate_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Registers or reschedules a fragment to become eligible `ttl` from now
    ///
    /// # Arguments
    ///
    /// * `url` - The fragment URL
    /// * `ttl` - Delay before the fragment may be fetched; zero means as soon as possible
    ///
    /// # Returns
    ///
    /// True if the fragment's eligible time changed
    pub fn add_fragment(&mut self, url: &str, ttl: Duration) -> bool {
        self.add_fragment_at(url, ttl, Utc::now())
    }

    /// [`add_fragment`](Self::add_fragment) against an explicit clock
    ///
    /// A known fragment is never postponed: the new time only applies if it is
    /// sooner than the pending one, or if nothing is pending.
    pub fn add_fragment_at(&mut self, url: &str, ttl: Duration, now: DateTime<Utc>) -> bool {
        let eligible = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let sequence = self.allocate_sequence();

        match self.fragments.get_mut(url) {
            Some(state) => state.schedule(eligible, sequence),
            None => {
                tracing::trace!("Registered fragment {} eligible at {}", url, eligible);
                self.fragments
                    .insert(url.to_string(), FragmentState::scheduled(eligible, sequence));
                true
            }
        }
    }

    /// Marks a fragment permanently ineligible, registering it if unknown
    pub fn blacklist_fragment(&mut self, url: &str) {
        match self.fragments.get_mut(url) {
            Some(state) => state.blacklist(),
            None => {
                let sequence = self.allocate_sequence();
                self.fragments
                    .insert(url.to_string(), FragmentState::blacklisted(sequence));
            }
        }
        tracing::debug!("Blacklisted fragment {}", url);
    }

    /// Returns true if any non-blacklisted fragment has a pending fetch
    pub fn next_fragment_exists(&self) -> bool {
        self.fragments.values().any(FragmentState::is_pending)
    }

    /// Returns the pending fragment with the earliest eligible time
    ///
    /// Ties go to the fragment scheduled first. The fragment stays pending
    /// until [`start_fetch`](Self::start_fetch) is called for it.
    pub fn get_next_fragment_to_fetch(&self) -> Option<NextFragment> {
        self.fragments
            .iter()
            .filter_map(|(url, state)| match state.next_eligible {
                Some(time) if !state.blacklisted => Some((time, state.sequence, url)),
                _ => None,
            })
            .min_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)))
            .map(|(time, _, url)| NextFragment {
                url: url.clone(),
                refetch_time: time,
            })
    }

    /// Clears the pending fetch of `url` as it is about to be fetched
    ///
    /// # Returns
    ///
    /// True if the fragment had a pending fetch
    pub fn start_fetch(&mut self, url: &str) -> bool {
        match self.fragments.get_mut(url) {
            Some(state) if state.is_pending() => {
                state.take();
                true
            }
            _ => false,
        }
    }

    /// Returns true when no fragment is ready to fetch right now
    pub fn in_syncing_mode(&self) -> bool {
        self.in_syncing_mode_at(Utc::now())
    }

    /// [`in_syncing_mode`](Self::in_syncing_mode) against an explicit clock
    pub fn in_syncing_mode_at(&self, now: DateTime<Utc>) -> bool {
        !self.fragments.values().any(|state| state.is_ready(now))
    }

    /// Returns the state of a known fragment
    pub fn fragment(&self, url: &str) -> Option<&FragmentState> {
        self.fragments.get(url)
    }

    pub fn is_blacklisted(&self, url: &str) -> bool {
        self.fragments.get(url).is_some_and(|s| s.blacklisted)
    }

    /// Number of known fragments, blacklisted ones included
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of fragments waiting to be fetched
    pub fn pending_count(&self) -> usize {
        self.fragments.values().filter(|s| s.is_pending()).count()
    }

    /// Serializes the registry as a JSON array in scheduling order
    pub fn serialize(&self) -> Result<String> {
        let mut entries: Vec<_> = self.fragments.iter().collect();
        entries.sort_by_key(|(_, state)| state.sequence);

        let serialized: Vec<SerializedFragment> = entries
            .into_iter()
            .map(|(url, state)| SerializedFragment {
                url: url.clone(),
                next_eligible_fetch_time: state.next_eligible,
                blacklisted: state.blacklisted,
            })
            .collect();

        Ok(serde_json::to_string(&serialized)?)
    }

    /// Restores a registry produced by [`serialize`](Self::serialize)
    ///
    /// Scheduling order is preserved by the array order.
    pub fn deserialize(json: &str) -> Result<Self> {
        let entries: Vec<SerializedFragment> = serde_json::from_str(json)
            .map_err(|e| TideError::InvalidCheckpoint(format!("fragment registry: {}", e)))?;

        let mut bookkeeper = Self::new();
        for entry in entries {
            let sequence = bookkeeper.allocate_sequence();
            let state = FragmentState {
                next_eligible: if entry.blacklisted {
                    None
                } else {
                    entry.next_eligible_fetch_time
                },
                blacklisted: entry.blacklisted,
                sequence,
            };
            bookkeeper.fragments.insert(entry.url, state);
        }
        Ok(bookkeeper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2022-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_seeded_is_immediately_eligible() {
        let bookkeeper = FragmentBookkeeper::seeded("https://example.org/feed");
        assert!(bookkeeper.next_fragment_exists());
        assert!(!bookkeeper.in_syncing_mode());
        assert_eq!(
            bookkeeper.get_next_fragment_to_fetch().unwrap().url,
            "https://example.org/feed"
        );
    }

    #[test]
    fn test_earliest_eligible_first() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        bookkeeper.add_fragment_at("late", secs(60), now);
        bookkeeper.add_fragment_at("early", secs(10), now);

        let next = bookkeeper.get_next_fragment_to_fetch().unwrap();
        assert_eq!(next.url, "early");
        assert_eq!(next.wait_from(now), secs(10));
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        for url in ["c", "a", "b"] {
            bookkeeper.add_fragment_at(url, Duration::ZERO, now);
        }

        let mut order = Vec::new();
        while let Some(next) = bookkeeper.get_next_fragment_to_fetch() {
            assert!(bookkeeper.start_fetch(&next.url));
            order.push(next.url);
        }
        assert_eq!(order, vec!["c", "a", "b"]);
        assert!(!bookkeeper.next_fragment_exists());
    }

    #[test]
    fn test_add_is_idempotent() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        bookkeeper.add_fragment_at("a", secs(5), now);
        bookkeeper.add_fragment_at("a", secs(5), now);

        assert_eq!(bookkeeper.len(), 1);
        assert_eq!(bookkeeper.pending_count(), 1);
    }

    #[test]
    fn test_never_postpones() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        bookkeeper.add_fragment_at("a", secs(5), now);

        assert!(!bookkeeper.add_fragment_at("a", secs(50), now));
        assert_eq!(
            bookkeeper.fragment("a").unwrap().next_eligible,
            Some(now + chrono::Duration::seconds(5))
        );

        assert!(bookkeeper.add_fragment_at("a", Duration::ZERO, now));
        assert_eq!(bookkeeper.fragment("a").unwrap().next_eligible, Some(now));
    }

    #[test]
    fn test_rescheduled_fragment_goes_to_back_of_queue() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        bookkeeper.add_fragment_at("a", Duration::ZERO, now);
        bookkeeper.add_fragment_at("b", Duration::ZERO, now);

        assert!(bookkeeper.start_fetch("a"));
        bookkeeper.add_fragment_at("a", Duration::ZERO, now);

        assert_eq!(bookkeeper.get_next_fragment_to_fetch().unwrap().url, "b");
    }

    #[test]
    fn test_blacklisted_never_selected() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        bookkeeper.add_fragment_at("a", Duration::ZERO, now);
        bookkeeper.add_fragment_at("b", secs(10), now);
        bookkeeper.blacklist_fragment("a");

        // Re-adding a blacklisted fragment has no effect
        assert!(!bookkeeper.add_fragment_at("a", Duration::ZERO, now));
        assert_eq!(bookkeeper.get_next_fragment_to_fetch().unwrap().url, "b");

        bookkeeper.blacklist_fragment("unknown");
        assert!(bookkeeper.is_blacklisted("unknown"));
        assert!(!bookkeeper.add_fragment_at("unknown", Duration::ZERO, now));

        bookkeeper.blacklist_fragment("b");
        assert!(!bookkeeper.next_fragment_exists());
        assert!(bookkeeper.get_next_fragment_to_fetch().is_none());
    }

    #[test]
    fn test_blacklist_holds_over_many_schedules() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        let urls: Vec<String> = (0..8).map(|i| format!("f{}", i)).collect();
        for (i, url) in urls.iter().enumerate() {
            bookkeeper.add_fragment_at(url, secs(i as u64), now);
        }
        bookkeeper.blacklist_fragment("f0");
        bookkeeper.blacklist_fragment("f5");

        for round in 0..40u64 {
            let url = &urls[(round * 3 % 8) as usize];
            bookkeeper.add_fragment_at(url, secs(round % 7), now);

            if let Some(next) = bookkeeper.get_next_fragment_to_fetch() {
                assert!(!bookkeeper.is_blacklisted(&next.url));
                if round % 2 == 0 {
                    bookkeeper.start_fetch(&next.url);
                }
            }
        }
    }

    #[test]
    fn test_syncing_mode() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        assert!(bookkeeper.in_syncing_mode_at(now));

        bookkeeper.add_fragment_at("a", secs(30), now);
        assert!(bookkeeper.in_syncing_mode_at(now));
        assert!(!bookkeeper.in_syncing_mode_at(now + chrono::Duration::seconds(30)));

        bookkeeper.add_fragment_at("b", Duration::ZERO, now);
        assert!(!bookkeeper.in_syncing_mode_at(now));

        bookkeeper.blacklist_fragment("b");
        assert!(bookkeeper.in_syncing_mode_at(now));
    }

    #[test]
    fn test_serialize_round_trip_preserves_decisions() {
        let now = t0();
        let mut original = FragmentBookkeeper::new();
        original.add_fragment_at("x", Duration::ZERO, now);
        original.add_fragment_at("y", Duration::ZERO, now);
        original.add_fragment_at("z", secs(20), now);
        original.add_fragment_at("done", Duration::ZERO, now);
        original.start_fetch("done");
        original.blacklist_fragment("bad");

        let json = original.serialize().unwrap();
        let mut restored = FragmentBookkeeper::deserialize(&json).unwrap();

        assert_eq!(restored.len(), original.len());
        assert!(restored.is_blacklisted("bad"));
        assert!(!restored.fragment("done").unwrap().is_pending());

        let mut original_order = Vec::new();
        let mut restored_order = Vec::new();
        while let Some(next) = original.get_next_fragment_to_fetch() {
            original.start_fetch(&next.url);
            original_order.push(next);
        }
        while let Some(next) = restored.get_next_fragment_to_fetch() {
            restored.start_fetch(&next.url);
            restored_order.push(next);
        }
        assert_eq!(original_order, restored_order);
    }

    #[test]
    fn test_serialized_layout() {
        let now = t0();
        let mut bookkeeper = FragmentBookkeeper::new();
        bookkeeper.add_fragment_at("https://example.org/a", Duration::ZERO, now);

        let value: serde_json::Value =
            serde_json::from_str(&bookkeeper.serialize().unwrap()).unwrap();
        assert_eq!(value[0]["url"], "https://example.org/a");
        assert_eq!(value[0]["blacklisted"], false);
        assert!(value[0]["nextEligibleFetchTime"].is_string());
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(matches!(
            FragmentBookkeeper::deserialize("{}"),
            Err(TideError::InvalidCheckpoint(_))
        ));
    }
}
