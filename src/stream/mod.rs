//! Event stream following
//!
//! The [`EventStream`] engine drives everything in this module: it asks the
//! [`FragmentBookkeeper`] which fragment is due, fetches it through a
//! [`PageFetcher`] behind the shared [`RateLimiter`], hands the statements to
//! the [`MemberExtractor`] and buffers the resulting [`Record`]s.

mod bookkeeper;
pub mod cache_policy;
mod checkpoint;
mod collaborators;
mod dedup;
mod engine;
mod fetcher;
pub mod members;
mod options;
mod rate_limiter;
mod record;

pub use bookkeeper::{FragmentBookkeeper, NextFragment};
pub use checkpoint::Checkpoint;
pub use collaborators::{
    Collaborators, DocumentParser, Framer, Headers, MetadataExtractor, Page, PageFetcher,
    Serializer,
};
pub use dedup::DedupCache;
pub use engine::EventStream;
pub use fetcher::{build_http_client, HttpPageFetcher};
pub use members::MemberExtractor;
pub use options::StreamOptions;
pub use rate_limiter::RateLimiter;
pub use record::Record;

use crate::metadata::FeedMetadata;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Result of pulling from an [`EventStream`]
#[derive(Debug)]
pub enum Delivery {
    /// The next member
    Record(Record),

    /// The stream is paused; buffered records are held until it resumes
    Paused,

    /// Nothing is left to fetch, or the stream was destroyed
    Ended,
}

/// Notifications published while the stream runs
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A fragment fetch cycle finished, successfully or not
    FragmentProcessed { url: String },

    /// No fragment is immediately due any more; emitted once per stream
    Synchronizing,

    /// Metadata read from a fragment
    Metadata { url: String, metadata: FeedMetadata },

    /// A member could not be dereferenced
    MemberFailed { id: String, message: String },
}

#[derive(Debug, Default)]
struct ControlFlags {
    paused: AtomicBool,
    destroyed: AtomicBool,
    buffering: AtomicBool,
    wake: Notify,
}

/// Cloneable handle to pause or destroy a stream from another task
///
/// Both operations wake a stream that is waiting for a fragment to become
/// eligible.
#[derive(Debug, Clone, Default)]
pub struct StreamControl {
    flags: Arc<ControlFlags>,
}

impl StreamControl {
    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::SeqCst);
        self.flags.wake.notify_waiters();
    }

    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    pub fn destroy(&self) {
        self.flags.destroyed.store(true, Ordering::SeqCst);
        self.flags.wake.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.flags.destroyed.load(Ordering::SeqCst)
    }

    pub fn is_buffering(&self) -> bool {
        self.flags.buffering.load(Ordering::SeqCst)
    }

    pub(crate) fn set_buffering(&self, buffering: bool) {
        self.flags.buffering.store(buffering, Ordering::SeqCst);
    }

    fn is_interrupted(&self) -> bool {
        self.is_paused() || self.is_destroyed()
    }

    /// Sleeps for `duration` unless paused or destroyed first
    ///
    /// # Returns
    ///
    /// `true` if the full duration elapsed, `false` if interrupted
    pub(crate) async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.flags.wake.notified();
        tokio::pin!(notified);
        // Register before checking the flags so a concurrent pause is not lost
        notified.as_mut().enable();

        if self.is_interrupted() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_interrupted(),
            _ = notified => false,
        }
    }
}
