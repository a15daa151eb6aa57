//! Capture lifecycle manager: owns one capture session at a time.
//!
//! State machine:
//!
//! ```text
//!   Stopped --start--> Starting --opened--> Running
//!      ^                  |                    |
//!      +----- failure ----+                    |
//!      +------------- stop / teardown ---------+
//!      +-- StoppingExternally <-- revoked -----+
//! ```
//!
//! `StoppingExternally` only lasts while the revocation holds the mutex.
//!
//! Every transition happens under one mutex, so `start`, `stop` and the
//! revocation callback may arrive from different threads. Tick bodies never
//! take that mutex; they only hold the session's frame source.

use crate::capture::{
    Capability, DisplayBackend, FrameDecoder, FrameSource, MirrorRequest, SourceError,
};
use crate::config::{CaptureConfig, DisplayMetrics};
use crate::pipeline::CapturePipeline;
use crate::presence::{ForegroundPresence, LoggingPresence};
use crate::scheduler::{CaptureScheduler, SchedulerError};
use crate::stats::{CaptureStats, StatsSnapshot};
use crate::store::{Clock, ImageStore, SystemClock};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;

/// Name given to the virtual display that mirrors the screen.
pub const MIRROR_NAME: &str = "ScreenwatchVirtualDisplay";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ManagerState {
    Stopped,
    Starting,
    Running,
    /// Transient: held only while an external revocation tears the session
    /// down under the manager's lock, so [`CaptureManager::state`] reports
    /// `Running` before it and `Stopped` after it.
    StoppingExternally,
}

/// Public view of the running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub generation: u64,
    pub started_at: DateTime<Local>,
    pub metrics: DisplayMetrics,
}

struct Session {
    info: SessionInfo,
    source: Arc<FrameSource>,
    scheduler: CaptureScheduler,
}

enum Phase {
    Stopped,
    Starting { generation: u64 },
    Running(Session),
    StoppingExternally,
}

impl Phase {
    fn state(&self) -> ManagerState {
        match self {
            Phase::Stopped => ManagerState::Stopped,
            Phase::Starting { .. } => ManagerState::Starting,
            Phase::Running(_) => ManagerState::Running,
            Phase::StoppingExternally => ManagerState::StoppingExternally,
        }
    }
}

struct Inner {
    phase: Mutex<Phase>,
    generation: AtomicU64,
    backend: Arc<dyn DisplayBackend>,
    presence: Arc<dyn ForegroundPresence>,
    config: CaptureConfig,
    store: ImageStore,
    decoder: FrameDecoder,
    stats: Arc<CaptureStats>,
    runtime: Handle,
}

/// Top-level controller. Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct CaptureManager {
    inner: Arc<Inner>,
}

pub struct CaptureManagerBuilder {
    backend: Arc<dyn DisplayBackend>,
    presence: Arc<dyn ForegroundPresence>,
    clock: Arc<dyn Clock>,
    config: CaptureConfig,
    runtime: Option<Handle>,
}

impl CaptureManagerBuilder {
    pub fn config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    pub fn presence(mut self, presence: Arc<dyn ForegroundPresence>) -> Self {
        self.presence = presence;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runtime that hosts the tick timer. Defaults to the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<CaptureManager, LifecycleError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?,
        };
        let store = ImageStore::with_clock(self.config.output_dir.clone(), self.clock);

        Ok(CaptureManager {
            inner: Arc::new(Inner {
                phase: Mutex::new(Phase::Stopped),
                generation: AtomicU64::new(0),
                backend: self.backend,
                presence: self.presence,
                config: self.config,
                store,
                decoder: FrameDecoder::new(),
                stats: Arc::new(CaptureStats::new()),
                runtime,
            }),
        })
    }
}

impl CaptureManager {
    pub fn builder(backend: Arc<dyn DisplayBackend>) -> CaptureManagerBuilder {
        CaptureManagerBuilder {
            backend,
            presence: Arc::new(LoggingPresence),
            clock: Arc::new(SystemClock),
            config: CaptureConfig::default(),
            runtime: None,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.inner.lock_phase().state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ManagerState::Running
    }

    pub fn session(&self) -> Option<SessionInfo> {
        match &*self.inner.lock_phase() {
            Phase::Running(session) => Some(session.info.clone()),
            _ => None,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &ImageStore {
        &self.inner.store
    }

    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.inner.stats.snapshot();
        if let Phase::Running(session) = &*self.inner.lock_phase() {
            snapshot.dropped_frames += session.source.dropped_frames();
        }
        snapshot
    }

    /// Begin a capture session with a freshly granted capability.
    ///
    /// Only valid while stopped. On any failure everything acquired so far is
    /// released and the manager is back in `Stopped`.
    pub fn start(&self, capability: Capability) -> Result<(), LifecycleError> {
        let inner = &self.inner;

        let generation = {
            let mut phase = inner.lock_phase();
            if !matches!(*phase, Phase::Stopped) {
                return Err(LifecycleError::NotStopped(phase.state()));
            }
            let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *phase = Phase::Starting { generation };
            generation
        };

        log::info!(
            "[LIFECYCLE] Starting capture session #{} (token '{}')",
            generation,
            capability.token()
        );

        if let Err(e) = inner.presence.acquire() {
            inner.abandon_start(generation);
            return Err(LifecycleError::Presence(e));
        }

        let request = MirrorRequest {
            name: MIRROR_NAME.to_string(),
            metrics: inner.config.display,
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let opened = FrameSource::open(
            capability,
            inner.backend.as_ref(),
            &request,
            inner.config.queue_depth,
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_revocation(generation);
                }
            },
        );

        let source = match opened {
            Ok(source) => Arc::new(source),
            Err(e) => {
                log::error!("[LIFECYCLE] Session #{} failed to open: {}", generation, e);
                inner.release_presence();
                inner.abandon_start(generation);
                return Err(e.into());
            }
        };

        let mut phase = inner.lock_phase();
        if !matches!(*phase, Phase::Starting { generation: g } if g == generation) {
            drop(phase);
            log::info!("[LIFECYCLE] Session #{} stopped while starting", generation);
            source.close();
            inner.release_presence();
            return Err(LifecycleError::Cancelled);
        }

        let pipeline = CapturePipeline::new(
            Arc::clone(&source),
            inner.decoder,
            inner.store.clone(),
            Arc::clone(&inner.stats),
        );
        let mut scheduler = CaptureScheduler::new(inner.runtime.clone());
        if let Err(e) = scheduler.start(inner.config.interval, move || {
            pipeline.run_tick();
        }) {
            *phase = Phase::Stopped;
            drop(phase);
            source.close();
            inner.release_presence();
            return Err(e.into());
        }

        *phase = Phase::Running(Session {
            info: SessionInfo {
                generation,
                started_at: Local::now(),
                metrics: source.metrics(),
            },
            source,
            scheduler,
        });

        log::info!(
            "[LIFECYCLE] Session #{} running, capturing every {}s into {}",
            generation,
            inner.config.interval.as_secs(),
            inner.store.dir().display()
        );
        Ok(())
    }

    /// End the current session. A no-op when already stopped.
    pub fn stop(&self) {
        self.inner.stop_current("stop requested");
    }

    /// Host-delivered revocation of the current session's capability.
    pub fn on_revoked(&self) {
        let generation = match &*self.inner.lock_phase() {
            Phase::Running(session) => session.info.generation,
            Phase::Starting { generation } => *generation,
            _ => return,
        };
        self.inner.handle_revocation(generation);
    }

    /// End-of-life hook from the host: release everything, best effort.
    pub fn on_teardown(&self) {
        self.inner.stop_current("host teardown");
    }
}

impl Inner {
    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drop back to `Stopped` if the start attempt is still the current one.
    fn abandon_start(&self, generation: u64) {
        let mut phase = self.lock_phase();
        if matches!(*phase, Phase::Starting { generation: g } if g == generation) {
            *phase = Phase::Stopped;
        }
    }

    fn stop_current(&self, reason: &str) {
        let mut phase = self.lock_phase();
        match std::mem::replace(&mut *phase, Phase::Stopped) {
            Phase::Stopped => {
                log::debug!("[LIFECYCLE] Already stopped ({})", reason);
            }
            Phase::Starting { generation } => {
                // start() notices the change and rolls itself back.
                log::info!("[LIFECYCLE] Session #{} cancelled while starting ({})", generation, reason);
            }
            Phase::Running(session) => {
                log::info!("[LIFECYCLE] Stopping session #{} ({})", session.info.generation, reason);
                self.teardown(session);
            }
            Phase::StoppingExternally => {}
        }
    }

    fn handle_revocation(&self, generation: u64) {
        let mut phase = self.lock_phase();
        match std::mem::replace(&mut *phase, Phase::StoppingExternally) {
            Phase::Running(session) if session.info.generation == generation => {
                log::info!("[LIFECYCLE] Capability for session #{} revoked by the system", generation);
                self.teardown(session);
            }
            Phase::Starting { generation: g } if g == generation => {
                // start() notices the change and rolls itself back.
                log::info!("[LIFECYCLE] Capability revoked while session #{} was starting", generation);
            }
            other => {
                log::debug!("[LIFECYCLE] Ignoring stale revocation for session #{}", generation);
                *phase = other;
                return;
            }
        }
        *phase = Phase::Stopped;
    }

    /// Release scheduler, display, then capability, then presence. Each step
    /// runs regardless of how the previous one went.
    fn teardown(&self, mut session: Session) {
        session.scheduler.stop();

        if let Err(e) = session.source.release_display() {
            log::error!("[LIFECYCLE] Failed to release mirrored display: {}", e);
        }
        session.source.release_capability();
        self.stats.add_dropped_frames(session.source.dropped_frames());

        self.release_presence();
        log::info!("[LIFECYCLE] Session #{} torn down", session.info.generation);
    }

    fn release_presence(&self) {
        if let Err(e) = self.presence.release() {
            log::error!("[LIFECYCLE] Failed to release foreground presence: {}", e);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let phase = std::mem::replace(
            self.phase.get_mut().unwrap_or_else(|e| e.into_inner()),
            Phase::Stopped,
        );
        if let Phase::Running(session) = phase {
            log::info!("[LIFECYCLE] Manager dropped with a live session, tearing down");
            self.teardown(session);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Capture can only start when stopped (currently {0:?})")]
    NotStopped(ManagerState),

    #[error("Failed to declare foreground presence: {0}")]
    Presence(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Capture was stopped while starting")]
    Cancelled,

    #[error("No tokio runtime available to host the capture timer")]
    NoRuntime,
}
