//! Lifecycle counters for the rephrase service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Thread-safe service counters
#[derive(Debug)]
pub struct ServiceStats {
    requests_created: AtomicU64,
    streams_started: AtomicU64,
    streams_completed: AtomicU64,
    streams_failed: AtomicU64,
    disconnects: AtomicU64,
    cancellations: AtomicU64,
    blocked_inputs: AtomicU64,
    blocked_chunks: AtomicU64,
    started_at: Instant,
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            requests_created: AtomicU64::new(0),
            streams_started: AtomicU64::new(0),
            streams_completed: AtomicU64::new(0),
            streams_failed: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
            blocked_inputs: AtomicU64::new(0),
            blocked_chunks: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record a created request
    pub fn record_created(&self) {
        self.requests_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stream that found its job
    pub fn record_stream_started(&self) {
        self.streams_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stream that emitted `end`
    pub fn record_completed(&self) {
        self.streams_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stream ended by an upstream failure
    pub fn record_failed(&self) {
        self.streams_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a peer disconnect
    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an explicit cancel of a known request
    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a style blocked by the injection filter
    pub fn record_blocked_input(&self) {
        self.blocked_inputs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a chunk blocked by the output validator
    pub fn record_blocked_chunk(&self) {
        self.blocked_chunks.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot, with the current number of live jobs and upstream streams
    pub fn summary(&self, active_jobs: usize, active_streams: usize) -> StatsSummary {
        StatsSummary {
            requests_created: self.requests_created.load(Ordering::Relaxed),
            streams_started: self.streams_started.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            streams_failed: self.streams_failed.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            blocked_inputs: self.blocked_inputs.load(Ordering::Relaxed),
            blocked_chunks: self.blocked_chunks.load(Ordering::Relaxed),
            active_jobs,
            active_streams,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Serializable counter snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    /// Requests created
    pub requests_created: u64,
    /// Streams that found their job
    pub streams_started: u64,
    /// Streams that emitted `end`
    pub streams_completed: u64,
    /// Streams ended by an upstream failure
    pub streams_failed: u64,
    /// Streams ended by a peer disconnect
    pub disconnects: u64,
    /// Explicit cancels of known requests
    pub cancellations: u64,
    /// Styles blocked by the injection filter
    pub blocked_inputs: u64,
    /// Chunks blocked by the output validator
    pub blocked_chunks: u64,
    /// Jobs currently stored
    pub active_jobs: usize,
    /// Upstream streams currently registered
    pub active_streams: usize,
    /// Seconds since the counters were created
    pub uptime_secs: u64,
}
