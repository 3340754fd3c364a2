use chrono::{DateTime, Utc};

/// Tracks the scheduling state of one fragment
///
/// A fragment is never removed from the registry. Once fetched it stays known
/// with no pending fetch until something schedules it again (a polling
/// re-registration or rediscovery through a relation), and a blacklisted
/// fragment can never be scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentState {
    /// Earliest time the fragment may be fetched; `None` when nothing is pending
    pub next_eligible: Option<DateTime<Utc>>,

    /// Permanently excluded from selection
    pub blacklisted: bool,

    /// Scheduling sequence number, used to break ties first-come first-served
    pub sequence: u64,
}

impl FragmentState {
    /// Creates a fragment that becomes eligible at `eligible`
    pub fn scheduled(eligible: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            next_eligible: Some(eligible),
            blacklisted: false,
            sequence,
        }
    }

    /// Creates a blacklisted fragment
    pub fn blacklisted(sequence: u64) -> Self {
        Self {
            next_eligible: None,
            blacklisted: true,
            sequence,
        }
    }

    /// Returns true if the fragment has a pending fetch and is not blacklisted
    pub fn is_pending(&self) -> bool {
        !self.blacklisted && self.next_eligible.is_some()
    }

    /// Returns true if the fragment may be fetched at `now`
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        !self.blacklisted && matches!(self.next_eligible, Some(t) if t <= now)
    }

    /// Schedules the fragment, never postponing an earlier pending fetch
    ///
    /// Returns true if the eligible time changed.
    pub fn schedule(&mut self, eligible: DateTime<Utc>, sequence: u64) -> bool {
        if self.blacklisted {
            return false;
        }
        match self.next_eligible {
            Some(current) if current <= eligible => false,
            Some(_) => {
                self.next_eligible = Some(eligible);
                true
            }
            None => {
                self.next_eligible = Some(eligible);
                self.sequence = sequence;
                true
            }
        }
    }

    /// Clears the pending fetch (the fragment is being fetched)
    pub fn take(&mut self) {
        self.next_eligible = None;
    }

    /// Marks the fragment permanently ineligible
    pub fn blacklist(&mut self) {
        self.blacklisted = true;
        self.next_eligible = None;
    }
}
