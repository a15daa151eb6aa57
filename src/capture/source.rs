//! Frame source: turns a granted capability into a live mirrored display.
//!
//! This is the infrastructure seam: the [`DisplayBackend`] talks to the OS
//! compositor, everything on this side of the trait is platform-neutral.

use super::capability::Capability;
use super::frame::{FrameQueue, FrameSink, RawFrame};
use crate::config::DisplayMetrics;
use std::sync::{Mutex, MutexGuard};

/// Parameters for the virtual display that mirrors the real screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    pub name: String,
    pub metrics: DisplayMetrics,
}

/// Host service able to create a mirrored display for a capability.
///
/// Implementations push frames into the supplied sink from their own
/// thread; they must stop producing once `FrameSink::push` returns `false`.
pub trait DisplayBackend: Send + Sync {
    fn create_mirror(
        &self,
        capability: &Capability,
        request: &MirrorRequest,
        sink: FrameSink,
    ) -> Result<Box<dyn MirroredDisplay>, String>;
}

/// Live handle to a mirrored display.
pub trait MirroredDisplay: Send {
    fn release(&mut self) -> Result<(), String>;
}

/// A mirrored feed bound to one capability for the length of one session.
pub struct FrameSource {
    capability: Capability,
    queue: FrameQueue,
    display: Mutex<Option<Box<dyn MirroredDisplay>>>,
    metrics: DisplayMetrics,
}

impl FrameSource {
    /// Open a mirrored feed.
    ///
    /// `on_revoked` is registered with the capability issuer and runs (at most
    /// once) if the grant is withdrawn while the feed is open.
    pub fn open<F>(
        capability: Capability,
        backend: &dyn DisplayBackend,
        request: &MirrorRequest,
        queue_depth: usize,
        on_revoked: F,
    ) -> Result<Self, SourceError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !capability.is_valid() {
            return Err(SourceError::CapabilityInvalid(format!(
                "capability '{}' is revoked or empty",
                capability.token()
            )));
        }

        if request.metrics.width == 0 || request.metrics.height == 0 {
            return Err(SourceError::DisplayUnavailable(format!(
                "invalid display size {}x{}",
                request.metrics.width, request.metrics.height
            )));
        }

        if capability.on_revoked(Box::new(on_revoked)).is_err() {
            return Err(SourceError::CapabilityInvalid(format!(
                "capability '{}' was revoked while opening",
                capability.token()
            )));
        }

        let queue = FrameQueue::new(queue_depth);
        let display = match backend.create_mirror(&capability, request, queue.sink()) {
            Ok(display) => display,
            Err(e) => {
                capability.stop();
                queue.close();
                return Err(SourceError::DisplayUnavailable(e));
            }
        };

        log::info!(
            "[CAPTURE] Mirrored display '{}' opened ({}x{} @ {}dpi)",
            request.name,
            request.metrics.width,
            request.metrics.height,
            request.metrics.density
        );

        Ok(Self {
            capability,
            queue,
            display: Mutex::new(Some(display)),
            metrics: request.metrics,
        })
    }

    /// Most recent queued frame, or `None` if the compositor has not produced
    /// one since the last call. Never blocks.
    pub fn latest_frame(&self) -> Option<RawFrame> {
        self.queue.acquire_latest()
    }

    pub fn metrics(&self) -> DisplayMetrics {
        self.metrics
    }

    pub fn is_open(&self) -> bool {
        self.lock_display().is_some()
    }

    /// Frames dropped by the bounded queue since the feed was opened.
    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped()
    }

    /// Release the display and every buffer, then end the capability.
    /// Idempotent.
    pub fn close(&self) {
        if let Err(e) = self.release_display() {
            log::error!("[CAPTURE] Failed to release mirrored display: {}", e);
        }
        self.release_capability();
    }

    /// Release the mirrored display and drain the buffer queue. The queue is
    /// closed even when the backend fails to release.
    pub(crate) fn release_display(&self) -> Result<(), String> {
        let display = self.lock_display().take();
        self.queue.close();

        match display {
            Some(mut display) => {
                display.release()?;
                log::info!("[CAPTURE] Mirrored display released");
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub(crate) fn release_capability(&self) {
        if self.capability.is_valid() {
            log::info!("[CAPTURE] Capability '{}' released", self.capability.token());
        }
        self.capability.stop();
    }

    fn lock_display(&self) -> MutexGuard<'_, Option<Box<dyn MirroredDisplay>>> {
        self.display.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Capture capability invalid: {0}")]
    CapabilityInvalid(String),

    #[error("Mirrored display unavailable: {0}")]
    DisplayUnavailable(String),
}
