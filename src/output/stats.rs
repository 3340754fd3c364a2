//! Run statistics for an event stream
//!
//! Counters are updated by the engine as fragments and members are processed
//! and printed to stderr when the binary exits.

use std::time::{Duration, Instant};

/// Counters describing one run of the stream
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Fragments fetched and processed successfully
    pub fragments_processed: u64,

    /// Fragments whose fetch or processing failed
    pub fragments_failed: u64,

    /// Members pushed to the output buffer
    pub members_emitted: u64,

    /// Members dropped because dereferencing or formatting failed
    pub members_failed: u64,

    /// Records restored from a checkpoint
    pub records_restored: u64,

    /// When the run started
    pub started_at: Instant,
}

impl Default for StreamStats {
    fn default() -> Self {
        Self {
            fragments_processed: 0,
            fragments_failed: 0,
            members_emitted: 0,
            members_failed: 0,
            records_restored: 0,
            started_at: Instant::now(),
        }
    }
}

impl StreamStats {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Total fragment fetches attempted
    pub fn fragments_total(&self) -> u64 {
        self.fragments_processed + self.fragments_failed
    }

    /// Members emitted per second of run time
    pub fn member_rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.members_emitted as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prints statistics to stderr in a formatted manner
///
/// Stdout carries the records, so the summary goes to stderr.
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StreamStats) {
    eprintln!("=== Stream Statistics ===\n");

    eprintln!("Fragments:");
    eprintln!("  Processed: {}", stats.fragments_processed);
    eprintln!("  Failed: {}", stats.fragments_failed);
    eprintln!();

    eprintln!("Members:");
    eprintln!("  Emitted: {}", stats.members_emitted);
    eprintln!("  Failed: {}", stats.members_failed);
    if stats.records_restored > 0 {
        eprintln!("  Restored from checkpoint: {}", stats.records_restored);
    }
    eprintln!();

    let total = stats.fragments_total();
    let success_rate = if total > 0 {
        (stats.fragments_processed as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    eprintln!(
        "Success Rate: {:.1}% ({} / {} fragments processed) in {:.1?}, {:.2} members/sec",
        success_rate,
        stats.fragments_processed,
        total,
        stats.elapsed(),
        stats.member_rate()
    );
}
