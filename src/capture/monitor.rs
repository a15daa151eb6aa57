//! Desktop mirrored display using the `xcap` crate.
//!
//! This is the infrastructure layer; it talks to the OS. A producer thread
//! grabs the primary monitor at a fixed cadence and feeds the bounded frame
//! queue, standing in for a compositor-backed virtual display.

use super::capability::Capability;
use super::frame::{FrameSink, RawFrame};
use super::source::{DisplayBackend, MirrorRequest, MirroredDisplay};
use image::RgbaImage;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use xcap::Monitor;

/// Captures the primary monitor's screen as an RGBA image.
pub fn capture_primary_monitor() -> Result<RgbaImage, MonitorError> {
    let mut monitors =
        Monitor::all().map_err(|e| MonitorError::MonitorEnumeration(e.to_string()))?;
    if monitors.is_empty() {
        return Err(MonitorError::NoPrimaryMonitor);
    }

    // No monitor reporting as primary means the first one stands in.
    let index = monitors
        .iter()
        .position(|m| m.is_primary().unwrap_or(false))
        .unwrap_or(0);
    let primary = monitors.swap_remove(index);

    primary
        .capture_image()
        .map_err(|e| MonitorError::CaptureFailed(e.to_string()))
}

/// Display backend that mirrors the primary monitor.
#[derive(Debug, Clone)]
pub struct MonitorBackend {
    cadence: Duration,
}

impl MonitorBackend {
    pub fn new(cadence: Duration) -> Self {
        Self { cadence }
    }
}

impl Default for MonitorBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl DisplayBackend for MonitorBackend {
    fn create_mirror(
        &self,
        _capability: &Capability,
        request: &MirrorRequest,
        sink: FrameSink,
    ) -> Result<Box<dyn MirroredDisplay>, String> {
        // Fail at open time rather than on the first tick.
        let first = capture_primary_monitor().map_err(|e| e.to_string())?;
        sink.push(to_raw_frame(first));

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let cadence = self.cadence;
        let worker = std::thread::Builder::new()
            .name(request.name.clone())
            .spawn(move || loop {
                match stop_rx.recv_timeout(cadence) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                match capture_primary_monitor() {
                    Ok(image) => {
                        if !sink.push(to_raw_frame(image)) {
                            break;
                        }
                    }
                    Err(e) => log::warn!("[CAPTURE] Monitor grab failed: {}", e),
                }
            })
            .map_err(|e| format!("Failed to spawn mirror thread: {}", e))?;

        Ok(Box::new(MonitorMirror {
            stop: Some(stop_tx),
            worker: Some(worker),
        }))
    }
}

struct MonitorMirror {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl MirroredDisplay for MonitorMirror {
    fn release(&mut self) -> Result<(), String> {
        // Dropping the sender wakes the worker immediately.
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| "Mirror thread panicked".to_string())?;
        }
        Ok(())
    }
}

impl Drop for MonitorMirror {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn to_raw_frame(image: RgbaImage) -> RawFrame {
    let (width, height) = image.dimensions();
    RawFrame::rgba(width, height, width as usize * 4, image.into_raw())
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("No primary monitor found")]
    NoPrimaryMonitor,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),
}
