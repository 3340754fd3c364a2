//! Sumi-Tide main entry point
//!
//! This is the command-line interface for the Sumi-Tide event-stream follower.

use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_tide::config::{load_config_with_hash, Config};
use sumi_tide::output::{print_statistics, RecordWriter};
use sumi_tide::storage::{open_store, CheckpointStore};
use sumi_tide::stream::{Collaborators, Delivery, EventStream, StreamEvent, StreamOptions};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Sumi-Tide: A polite event-stream follower
///
/// Sumi-Tide walks the fragments of a linked-data event stream, writes every
/// new member to stdout, and keeps polling the live edge. Interrupting it
/// with Ctrl-C saves a checkpoint so the next run resumes where this one
/// stopped.
#[derive(Parser, Debug)]
#[command(name = "sumi-tide")]
#[command(version = "1.0.0")]
#[command(about = "A polite event-stream follower", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start from the seed, discarding saved checkpoints
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be followed without fetching
    #[arg(long)]
    dry_run: bool,

    /// Fragment URLs never to fetch (repeatable)
    #[arg(long, value_name = "URL")]
    ignore: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = load_config_with_hash(&cli.config);
    let configured_level = loaded
        .as_ref()
        .ok()
        .and_then(|(config, _)| config.stream.logging_level.clone());

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet, configured_level.as_deref());

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match loaded {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_stream(config, &config_hash, cli.fresh, &cli.ignore).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries only records.
fn setup_logging(verbose: u8, quiet: bool, configured: Option<&str>) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => match configured {
                Some(level) => EnvFilter::new(format!("sumi_tide={},warn", level)),
                None => EnvFilter::new("sumi_tide=info,warn"),
            },
            1 => EnvFilter::new("sumi_tide=debug,info"),
            2 => EnvFilter::new("sumi_tide=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be followed
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let stream = &config.stream;

    println!("=== Sumi-Tide Dry Run ===\n");

    println!("Stream:");
    println!("  Seed: {}", stream.url);
    println!("  Polling interval: {}ms", stream.polling_interval);
    match stream.representation {
        Some(representation) => println!("  Representation: {:?}", representation),
        None => println!("  Serialized as: {}", stream.mime_type),
    }
    if let Some(from_time) = &stream.from_time {
        println!("  From time: {}", from_time);
    }
    if let Some(rpm) = stream.requests_per_minute {
        println!("  Requests per minute: {}", rpm);
    }
    println!("  Emit member once: {}", stream.emit_member_once);
    println!("  Polling disabled: {}", stream.disable_polling);
    println!(
        "  Synchronization disabled: {}",
        stream.disable_synchronization
    );
    println!("  Dereference members: {}", stream.dereference_members);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Accept: {}", config.http.accept);
    println!("  Custom headers: {}", config.http.request_headers.len());

    println!("\nCheckpoint:");
    println!("  Database: {}", config.checkpoint.database_path);

    let db_path = Path::new(&config.checkpoint.database_path);
    if db_path.exists() {
        let store = open_store(db_path)?;
        println!("  Saved checkpoints (all seeds): {}", store.count_checkpoints()?);
        match store.load_latest_checkpoint(&stream.url)? {
            Some(record) => println!("  Would resume from checkpoint saved at {}", record.saved_at),
            None => println!("  No checkpoint for this seed"),
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

fn log_event(event: &StreamEvent) {
    match event {
        StreamEvent::FragmentProcessed { url } => {
            tracing::debug!("Fragment processed: {}", url);
        }
        StreamEvent::Synchronizing => {
            tracing::info!("Stream reached the live edge, now synchronizing");
        }
        StreamEvent::Metadata { url, metadata } => {
            tracing::trace!(
                "{}: {} relations, {} collections",
                url,
                metadata.relations.len(),
                metadata.collections.len()
            );
        }
        StreamEvent::MemberFailed { id, message } => {
            tracing::warn!("Member {} skipped: {}", id, message);
        }
    }
}

/// Handles the main streaming operation
async fn handle_stream(
    config: Config,
    config_hash: &str,
    fresh: bool,
    ignore: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let seed = config.stream.url.clone();
    let mut store = open_store(Path::new(&config.checkpoint.database_path))?;

    let checkpoint = if fresh {
        let removed = store.clear_checkpoints(&seed)?;
        tracing::info!("Starting fresh ({} saved checkpoints discarded)", removed);
        None
    } else {
        match store.load_latest_checkpoint(&seed)? {
            Some(record) => {
                if record.config_changed(config_hash) {
                    tracing::warn!(
                        "Checkpoint {} was saved under a different configuration",
                        record.id
                    );
                }
                tracing::info!("Resuming from checkpoint saved at {}", record.saved_at);
                Some(record.checkpoint)
            }
            None => None,
        }
    };

    let options = StreamOptions::from_config(&config)?;
    let collaborators = Collaborators::http(&config.http)?;
    let mut stream = EventStream::new(&seed, collaborators, options, checkpoint.as_ref())?;
    stream.ignore_pages(ignore);

    let mut events = stream.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} stream notifications", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let control = stream.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, pausing stream");
            control.pause();
        }
    });

    tracing::info!("Following {}", seed);
    let mut writer = RecordWriter::new(std::io::stdout());
    loop {
        match stream.next().await {
            Delivery::Record(record) => writer.write_record(&record)?,
            Delivery::Paused => {
                tracing::info!("Stream paused with {} records buffered", stream.buffered());
                break;
            }
            Delivery::Ended => {
                tracing::info!("Stream ended");
                break;
            }
        }
    }

    let checkpoint = stream.export_state()?;
    let id = store.save_checkpoint(&seed, config_hash, &checkpoint)?;
    tracing::info!("Saved checkpoint {}", id);

    print_statistics(stream.stats());

    Ok(())
}
