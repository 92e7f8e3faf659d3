use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

/// Global runtime metrics.
///
/// Purpose:
/// - Track feed connectivity and throughput
/// - Track mounted nameplates and rotation activity
/// - Track frames handed to the graphics host
///
/// Design:
/// - Lock-free (Atomics)
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // Feed
    pub feed_connections_active: AtomicUsize,
    pub feed_updates: AtomicUsize,
    pub feed_reconnects: AtomicUsize,
    pub parse_errors: AtomicUsize,

    // Nameplates
    pub nameplates_mounted: AtomicUsize,
    pub rotations: AtomicUsize,

    // Output
    pub frames_published: AtomicUsize,
    pub send_errors: AtomicUsize,
    pub dropped_frames: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line summary for the periodic reporter.
    pub fn summary(&self) -> String {
        format!(
            "feed_ws={} updates={} reconnects={} parse_err={} nameplates={} rotations={} frames={} send_err={} dropped={}",
            self.feed_connections_active.load(Ordering::Relaxed),
            self.feed_updates.load(Ordering::Relaxed),
            self.feed_reconnects.load(Ordering::Relaxed),
            self.parse_errors.load(Ordering::Relaxed),
            self.nameplates_mounted.load(Ordering::Relaxed),
            self.rotations.load(Ordering::Relaxed),
            self.frames_published.load(Ordering::Relaxed),
            self.send_errors.load(Ordering::Relaxed),
            self.dropped_frames.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
