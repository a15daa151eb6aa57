//! Foreground presence: tells the host that long-running capture work is in
//! progress so the process is not reclaimed.
//!
//! How that declaration is presented (a persistent notification, a tray
//! icon, nothing at all) belongs to the host shell.

pub trait ForegroundPresence: Send + Sync {
    fn acquire(&self) -> Result<(), String>;
    fn release(&self) -> Result<(), String>;
}

/// Presence for hosts that never reclaim a running process (desktop, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPresence;

impl ForegroundPresence for LoggingPresence {
    fn acquire(&self) -> Result<(), String> {
        log::info!("[LIFECYCLE] Foreground presence declared: capturing screen periodically");
        Ok(())
    }

    fn release(&self) -> Result<(), String> {
        log::info!("[LIFECYCLE] Foreground presence retracted");
        Ok(())
    }
}
