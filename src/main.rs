//! Outbox - Upload staging daemon
//!
//! Entry point for the outbox daemon.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use outbox::forwarder::{DryRunUploader, Forwarder};
use outbox::limiter::RateLimiter;
use outbox::observability::init_tracing;
use outbox::registry::DirectoryRegistry;
use outbox::watcher::{scan, DirectoryWatcher, DispatchStats, EventDispatcher, PathFilter};
use outbox::{Config, Error, Result};

/// Outbox - Upload staging daemon
#[derive(Parser, Debug)]
#[command(name = "outbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory to watch
    #[arg(short, long, env = "OUTBOX_ROOT")]
    root: std::path::PathBuf,

    /// File base names that are never tracked
    #[arg(long, env = "OUTBOX_IGNORED_FILES", value_delimiter = ',')]
    ignored_files: Vec<String>,

    /// File extensions that are never tracked
    #[arg(long, env = "OUTBOX_IGNORED_EXTENSIONS", value_delimiter = ',')]
    ignored_extensions: Vec<String>,

    /// Directory names whose subtrees are never tracked
    #[arg(long, env = "OUTBOX_IGNORED_DIRECTORIES", value_delimiter = ',')]
    ignored_directories: Vec<String>,

    /// If set, a file name must start with one of these prefixes
    #[arg(long, env = "OUTBOX_INCLUDED_FILE_PREFIXES", value_delimiter = ',')]
    included_file_prefixes: Vec<String>,

    /// If set, a file's parent path must contain one of these segments
    #[arg(long, env = "OUTBOX_INCLUDED_DIRECTORIES", value_delimiter = ',')]
    included_directories: Vec<String>,

    /// Minimum seconds between upload attempts for one file
    #[arg(long, env = "OUTBOX_MIN_UPLOAD_ATTEMPT_INTERVAL", default_value = "1.0")]
    min_upload_attempt_interval: f64,

    /// Seconds after discovery before a never-uploaded file counts as failed
    #[arg(long, env = "OUTBOX_MIN_ELAPSED_FOR_UPLOAD_FAIL", default_value = "3.0")]
    min_elapsed_for_upload_fail: f64,

    /// Seconds a file must reside before it may be deleted
    #[arg(long, env = "OUTBOX_MIN_ELAPSED_FOR_DELETE", default_value = "0.0")]
    min_elapsed_for_delete: f64,

    /// Seconds the size must hold steady before input is complete
    #[arg(long, env = "OUTBOX_MIN_ELAPSED_FOR_INPUT_COMPLETE", default_value = "1.0")]
    min_elapsed_for_input_complete: f64,

    /// Maximum uploads granted per rate-limit window
    #[arg(long, env = "OUTBOX_RATE_LIMIT_CAPACITY", default_value = "2")]
    rate_limit_capacity: usize,

    /// Rate-limit window length in seconds
    #[arg(long, env = "OUTBOX_RATE_LIMIT_PERIOD", default_value = "5.0")]
    rate_limit_period: f64,

    /// Floor on the limiter's wait between admission re-checks, in seconds
    #[arg(long, env = "OUTBOX_RATE_LIMIT_RETRY_INTERVAL", default_value = "0.01")]
    rate_limit_retry_interval: f64,

    /// Seconds between forwarder polls of the registry
    #[arg(long, env = "OUTBOX_POLL_INTERVAL", default_value = "1.0")]
    poll_interval: f64,

    /// Seconds between full reconciliation scans
    #[arg(long, env = "OUTBOX_RESCAN_INTERVAL", default_value = "30.0")]
    rescan_interval: f64,

    /// Fail duplicate-name moves instead of renaming with a timestamp prefix
    #[arg(long, env = "OUTBOX_FAIL_ON_DUPLICATE")]
    fail_on_duplicate: bool,

    /// Remove uploaded files from disk once they become delete-eligible
    #[arg(long, env = "OUTBOX_DELETE_AFTER_UPLOAD")]
    delete_after_upload: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "OUTBOX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "OUTBOX_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            root: self.root,
            ignored_files: self.ignored_files,
            ignored_extensions: self.ignored_extensions,
            ignored_directories: self.ignored_directories,
            included_file_prefixes: self.included_file_prefixes,
            included_directories: self.included_directories,
            min_elapsed_for_upload_attempt: self.min_upload_attempt_interval,
            min_elapsed_for_upload_fail: self.min_elapsed_for_upload_fail,
            min_elapsed_for_delete: self.min_elapsed_for_delete,
            min_elapsed_for_input_complete: self.min_elapsed_for_input_complete,
            rate_limit_capacity: self.rate_limit_capacity,
            rate_limit_period: self.rate_limit_period,
            rate_limit_retry_interval: self.rate_limit_retry_interval,
            poll_interval: self.poll_interval,
            rescan_interval: self.rescan_interval,
            rename_on_duplicate: !self.fail_on_duplicate,
            delete_after_upload: self.delete_after_upload,
            log_level: self.log_level,
            log_json: self.log_json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.into_config();

    init_tracing(&config.log_level, config.log_json);

    tracing::info!("Outbox v{} starting...", env!("CARGO_PKG_VERSION"));

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    let registry = Arc::new(DirectoryRegistry::new(
        &config.root,
        PathFilter::new(config.filter_rules()),
        config.thresholds(),
        config.duplicate_policy(),
    ));

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_capacity,
        Duration::from_secs_f64(config.rate_limit_period),
        Duration::from_secs_f64(config.rate_limit_retry_interval),
    ));

    // Pick up files that predate the watch before live events flow.
    let initial = {
        let registry = Arc::clone(&registry);
        tokio::task::spawn_blocking(move || scan(&registry))
            .await
            .map_err(|e| Error::internal(format!("initial scan task failed: {e}")))?
    };
    tracing::info!(count = initial.len(), "initial scan tracked files");

    let mut watcher = DirectoryWatcher::new()?;
    watcher.watch(&config.root)?;

    let dispatcher = EventDispatcher::new(Arc::clone(&registry), DispatchStats::new());
    let dispatch_task = tokio::spawn(async move {
        while let Some(event) = watcher.recv().await {
            dispatcher.dispatch(&event);
        }
        tracing::warn!("event channel closed, dispatch loop exiting");
    });

    let rescan_task = {
        let registry = Arc::clone(&registry);
        let rescan_interval = Duration::from_secs_f64(config.rescan_interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(rescan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let registry = Arc::clone(&registry);
                if let Err(e) = tokio::task::spawn_blocking(move || scan(&registry)).await {
                    tracing::error!(error = %e, "rescan task failed");
                }
            }
        })
    };

    let forwarder = Forwarder::new(
        Arc::clone(&registry),
        limiter,
        DryRunUploader,
        Duration::from_secs_f64(config.poll_interval),
        config.delete_after_upload,
    );

    tokio::select! {
        () = forwarder.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutdown signal received");
        }
    }

    dispatch_task.abort();
    rescan_task.abort();

    let stats = forwarder.stats().snapshot();
    tracing::info!(
        uploads_succeeded = stats.uploads_succeeded,
        uploads_failed = stats.uploads_failed,
        files_deleted = stats.files_deleted,
        tracked = registry.len(),
        "outbox stopped"
    );

    Ok(())
}
