//! State module for tracking traversal progress
//!
//! This module provides the state types shared by the stream engine and its
//! bookkeeping.
//!
//! # Components
//!
//! - `StreamState`: Tracks the engine state machine (idle, fetching, synchronizing, paused, ended)
//! - `FragmentState`: Tracks per-fragment scheduling (next eligible fetch time, blacklist flag)

mod fragment_state;
mod stream_state;

// Re-export main types
pub use fragment_state::FragmentState;
pub use stream_state::StreamState;
