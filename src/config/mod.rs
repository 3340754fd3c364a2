//! Configuration module for Sumi-Tide
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_tide::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("stream.toml")).unwrap();
//! println!("Polling every {}ms", config.stream.polling_interval);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CheckpointConfig, Config, HttpConfig, OutputRepresentation, StreamConfig};

// Re-export parser and option helpers
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{parse_from_time, parse_json_ld_context};
