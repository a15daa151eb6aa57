//! The body of one capture tick: latest frame → decode → save.
//!
//! Every failure here is local to the tick. It is logged and counted, and
//! the schedule carries on.

use crate::capture::{DecodeError, FrameDecoder, FrameSource};
use crate::stats::CaptureStats;
use crate::store::{ImageStore, StoreError, StoredArtifact};
use std::sync::Arc;

#[derive(Debug)]
pub enum TickOutcome {
    Saved(StoredArtifact),
    /// The compositor has not produced a frame since the last tick.
    NoFrame,
    Skipped(TickError),
}

#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CapturePipeline {
    source: Arc<FrameSource>,
    decoder: FrameDecoder,
    store: ImageStore,
    stats: Arc<CaptureStats>,
}

impl CapturePipeline {
    pub fn new(
        source: Arc<FrameSource>,
        decoder: FrameDecoder,
        store: ImageStore,
        stats: Arc<CaptureStats>,
    ) -> Self {
        Self {
            source,
            decoder,
            store,
            stats,
        }
    }

    pub fn run_tick(&self) -> TickOutcome {
        self.stats.record_tick();

        let Some(frame) = self.source.latest_frame() else {
            log::debug!("[CAPTURE] No frame queued yet, skipping tick");
            self.stats.record_no_frame();
            return TickOutcome::NoFrame;
        };

        let start = std::time::Instant::now();
        let decoded = self.decoder.decode(&frame);
        // Hand the buffer back before the (slow) encode.
        drop(frame);

        let image = match decoded {
            Ok(image) => image,
            Err(e) => {
                log::error!("[CAPTURE] {}", e);
                self.stats.record_malformed();
                return TickOutcome::Skipped(e.into());
            }
        };
        let decode_ms = start.elapsed().as_millis();

        match self.store.save(&image) {
            Ok(artifact) => {
                log::info!(
                    "[CAPTURE] Tick captured {}x{} (decode {}ms)",
                    image.width(),
                    image.height(),
                    decode_ms
                );
                self.stats.record_saved();
                TickOutcome::Saved(artifact)
            }
            Err(e) => {
                log::error!("[STORE] Failed to save screenshot: {}", e);
                self.stats.record_store_failure();
                TickOutcome::Skipped(e.into())
            }
        }
    }
}
