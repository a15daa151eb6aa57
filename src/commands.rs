//! Command surface for the host shell.
//!
//! The shell forwards the user-granted capability and start/stop requests;
//! results come back as plain strings or JSON so they cross any bridge
//! (method channel, IPC, FFI) without extra types.

use crate::capture::Capability;
use crate::manager::CaptureManager;

/// Command: start periodic capture with a freshly granted capability.
pub fn start_capture(manager: &CaptureManager, capability: Capability) -> Result<String, String> {
    log::info!("[COMMAND] start_capture");
    manager.start(capability).map_err(|e| e.to_string())?;
    Ok("Capture started.".to_string())
}

/// Command: stop capture. Always acknowledges, even if nothing was running.
pub fn stop_capture(manager: &CaptureManager) -> Result<String, String> {
    log::info!("[COMMAND] stop_capture");
    manager.stop();
    Ok("Capture stopped.".to_string())
}

/// Command: current state, counters and configuration.
pub fn capture_status(manager: &CaptureManager) -> serde_json::Value {
    let stats = manager.stats();
    let config = manager.config();

    serde_json::json!({
        "state": manager.state(),
        "ticks": stats.ticks,
        "saved": stats.saved,
        "noFrame": stats.no_frame,
        "malformed": stats.malformed,
        "storeFailures": stats.store_failures,
        "droppedFrames": stats.dropped_frames,
        "outputDir": config.output_dir.to_string_lossy(),
        "intervalSecs": config.interval.as_secs(),
        "startedAt": manager.session().map(|s| s.started_at.to_rfc3339()),
    })
}
