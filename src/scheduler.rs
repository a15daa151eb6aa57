//! Recurring capture timer.
//!
//! One tokio task per schedule: dispatch the tick, then arm the next delay.
//! The tick body runs on the blocking pool and the delay is only armed after
//! it has returned, so two ticks can never overlap. A tick that panics is
//! logged and the schedule carries on. Stopping cancels the pending delay; a
//! tick body that is already running is allowed to finish, and nothing is
//! dispatched after it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Ticking,
    Stopped,
}

/// Registration of the recurring tick. Dropping it does not cancel; call
/// [`ScheduleHandle::cancel`].
#[derive(Debug)]
pub struct ScheduleHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True once the timer task has exited (cancelled or aborted).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct CaptureScheduler {
    runtime: Handle,
    state: SchedulerState,
    handle: Option<ScheduleHandle>,
}

impl CaptureScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            state: SchedulerState::Idle,
            handle: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn handle(&self) -> Option<&ScheduleHandle> {
        self.handle.as_ref()
    }

    /// Start ticking: `tick` runs immediately, then every `interval`.
    pub fn start<F>(&mut self, interval: Duration, tick: F) -> Result<(), SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.state != SchedulerState::Idle {
            return Err(SchedulerError::NotIdle(self.state));
        }
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let tick = Arc::new(Mutex::new(tick));

        let task = self.runtime.spawn(async move {
            loop {
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let body = Arc::clone(&tick);
                let dispatched = tokio::task::spawn_blocking(move || {
                    let mut tick = body.lock().unwrap_or_else(|e| e.into_inner());
                    (*tick)();
                })
                .await;
                if let Err(e) = dispatched {
                    log::error!("[SCHEDULER] Tick failed, keeping schedule: {}", e);
                }
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
            log::debug!("[SCHEDULER] Timer task exited");
        });

        log::info!("[SCHEDULER] Ticking every {}s", interval.as_secs());
        self.handle = Some(ScheduleHandle { cancelled, task });
        self.state = SchedulerState::Ticking;
        Ok(())
    }

    /// Cancel the pending tick. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
            log::info!("[SCHEDULER] Stopped");
        }
        self.state = SchedulerState::Stopped;
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler can only start from Idle (currently {0:?})")]
    NotIdle(SchedulerState),

    #[error("Tick interval must be greater than zero")]
    ZeroInterval,
}
