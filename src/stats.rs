//! Per-manager capture counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CaptureStats {
    ticks: AtomicU64,
    saved: AtomicU64,
    no_frame: AtomicU64,
    malformed: AtomicU64,
    store_failures: AtomicU64,
    dropped_frames: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub saved: u64,
    pub no_frame: u64,
    pub malformed: u64,
    pub store_failures: u64,
    pub dropped_frames: u64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_saved(&self) {
        self.saved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_no_frame(&self) {
        self.no_frame.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold a finished session's queue drops into the running total.
    pub(crate) fn add_dropped_frames(&self, count: u64) {
        self.dropped_frames.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            no_frame: self.no_frame.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
        }
    }
}
