//! Upload forwarding loop.
//!
//! Polls the registry for input-complete files, claims them one at a time,
//! and pushes each through the shared rate limiter before handing it to an
//! [`Uploader`]. Upload failures are not fatal: the entry stays registered
//! and is retried once its attempt interval has elapsed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::limiter::RateLimiter;
use crate::registry::{DirectoryRegistry, FileSnapshot};

/// Destination for input-complete files.
///
/// Returns `true` on a successful upload. Implementations should log their
/// own failure detail; the forwarder only needs the outcome.
pub trait Uploader: Send + Sync {
    fn upload(
        &self,
        file: &FileSnapshot,
    ) -> impl std::future::Future<Output = bool> + Send;
}

/// Uploader that logs what it would send and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunUploader;

impl Uploader for DryRunUploader {
    async fn upload(&self, file: &FileSnapshot) -> bool {
        match serde_json::to_string(file) {
            Ok(json) => tracing::info!(file = %json, "dry-run upload"),
            Err(e) => tracing::warn!(name = %file.name, error = %e, "dry-run upload"),
        }
        true
    }
}

/// Forwarding statistics.
#[derive(Debug, Default)]
pub struct ForwardStats {
    pub uploads_attempted: AtomicU64,
    pub uploads_succeeded: AtomicU64,
    pub uploads_failed: AtomicU64,
    pub files_deleted: AtomicU64,
}

impl ForwardStats {
    /// Create a new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ForwardStatsSnapshot {
        ForwardStatsSnapshot {
            uploads_attempted: self.uploads_attempted.load(Ordering::Relaxed),
            uploads_succeeded: self.uploads_succeeded.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            files_deleted: self.files_deleted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of forwarding stats.
#[derive(Debug, Clone, Copy)]
pub struct ForwardStatsSnapshot {
    pub uploads_attempted: u64,
    pub uploads_succeeded: u64,
    pub uploads_failed: u64,
    pub files_deleted: u64,
}

/// Drives files from input-complete to uploaded (and optionally deleted).
pub struct Forwarder<U> {
    registry: Arc<DirectoryRegistry>,
    limiter: Arc<RateLimiter>,
    uploader: U,
    poll_interval: Duration,
    delete_after_upload: bool,
    stats: Arc<ForwardStats>,
}

impl<U: Uploader> Forwarder<U> {
    /// Create a forwarder over `registry` using `uploader` as the sink.
    pub fn new(
        registry: Arc<DirectoryRegistry>,
        limiter: Arc<RateLimiter>,
        uploader: U,
        poll_interval: Duration,
        delete_after_upload: bool,
    ) -> Self {
        Self {
            registry,
            limiter,
            uploader,
            poll_interval,
            delete_after_upload,
            stats: ForwardStats::new(),
        }
    }

    /// Current stats handle.
    #[must_use]
    pub fn stats(&self) -> Arc<ForwardStats> {
        Arc::clone(&self.stats)
    }

    /// One polling pass: upload every claimable file, then reap uploaded
    /// files when configured to delete them.
    ///
    /// Returns the number of successful uploads in this pass.
    pub async fn run_once(&self) -> usize {
        let mut uploaded = 0;

        for candidate in self.registry.uploadable() {
            // Eligibility can change between listing and claiming; the
            // claim is the single authoritative gate.
            if !self.registry.claim_upload(&candidate.name) {
                continue;
            }

            self.limiter.acquire_async().await;
            self.stats.uploads_attempted.fetch_add(1, Ordering::Relaxed);

            if self.uploader.upload(&candidate).await {
                self.registry.mark_uploaded(&candidate.name);
                self.stats.uploads_succeeded.fetch_add(1, Ordering::Relaxed);
                uploaded += 1;
                tracing::info!(
                    registry = %self.registry.alias(),
                    name = %candidate.name,
                    "uploaded file"
                );
            } else {
                self.stats.uploads_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    registry = %self.registry.alias(),
                    name = %candidate.name,
                    "upload failed, will retry after attempt interval"
                );
            }
        }

        if self.delete_after_upload {
            for done in self.registry.deletable() {
                // Residence time alone is not enough; only uploaded files
                // are reaped.
                if done.state != "uploaded" {
                    continue;
                }
                if self.registry.mark_deleted(&done.name) {
                    self.stats.files_deleted.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        registry = %self.registry.alias(),
                        name = %done.name,
                        "deleted uploaded file"
                    );
                }
            }
        }

        for stuck in self.registry.upload_failures() {
            tracing::warn!(
                registry = %self.registry.alias(),
                name = %stuck.name,
                state = stuck.state,
                "file has a failed upload attempt pending retry"
            );
        }

        uploaded
    }

    /// Run the forwarding loop until the task is cancelled.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            registry = %self.registry.alias(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "forwarder started"
        );

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }
}
