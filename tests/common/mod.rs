//! Shared fixtures: a synthetic compositor, a clock that follows tokio's
//! (pausable) time, and a presence that counts declarations.

#![allow(dead_code)]

use chrono::{DateTime, Local, TimeZone};
use screenwatch_lib::capture::{
    Capability, DisplayBackend, FrameSink, MirrorRequest, MirroredDisplay, Plane, RawFrame,
};
use screenwatch_lib::config::{CaptureConfig, DisplayMetrics};
use screenwatch_lib::manager::CaptureManager;
use screenwatch_lib::presence::ForegroundPresence;
use screenwatch_lib::store::Clock;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INTERVAL: Duration = Duration::from_secs(300);
pub const WIDTH: u32 = 60;
pub const HEIGHT: u32 = 8;
/// Row stride with 16 bytes of padding per row.
pub const ROW_STRIDE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Healthy,
    /// Frames with an empty plane list.
    Malformed,
    /// A row stride so large that the frame geometry cannot be addressed.
    HugeStride,
}

/// Runs inside `create_mirror`, while the session is still starting.
pub type OpenHook = Box<dyn FnOnce() + Send>;

/// Compositor stand-in. Pushes one frame as soon as the mirror exists, then
/// one every `cadence` of tokio time until the queue is closed.
pub struct FakeBackend {
    pub kind: FrameKind,
    /// Kind of the frame pushed at open, if different from `kind`.
    pub first_kind: Option<FrameKind>,
    pub on_create: Mutex<Option<OpenHook>>,
    pub cadence: Duration,
    pub fail_create: bool,
    pub fail_release: bool,
    pub created: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    pub sinks: Mutex<Vec<FrameSink>>,
}

impl FakeBackend {
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            first_kind: None,
            on_create: Mutex::new(None),
            cadence: Duration::from_secs(10),
            fail_create: false,
            fail_release: false,
            created: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy() -> Self {
        Self::new(FrameKind::Healthy)
    }

    /// Mirrors created but not yet released.
    pub fn live_mirrors(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }

    pub fn all_sinks_closed(&self) -> bool {
        self.sinks.lock().unwrap().iter().all(|s| s.is_closed())
    }

    pub fn set_on_create(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_create.lock().unwrap() = Some(Box::new(hook));
    }
}

pub fn make_frame(kind: FrameKind) -> RawFrame {
    match kind {
        FrameKind::Healthy => RawFrame {
            width: WIDTH,
            height: HEIGHT,
            planes: vec![Plane {
                data: vec![0x80; ROW_STRIDE * HEIGHT as usize],
                row_stride: ROW_STRIDE,
                pixel_stride: 4,
            }],
        },
        FrameKind::Malformed => RawFrame {
            width: WIDTH,
            height: HEIGHT,
            planes: Vec::new(),
        },
        FrameKind::HugeStride => RawFrame::rgba(1, 3, 1 << 63, vec![1, 2, 3, 255]),
    }
}

struct FakeMirror {
    released: Arc<AtomicUsize>,
    fail_release: bool,
}

impl MirroredDisplay for FakeMirror {
    fn release(&mut self) -> Result<(), String> {
        self.released.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            return Err("display server went away".to_string());
        }
        Ok(())
    }
}

impl DisplayBackend for FakeBackend {
    fn create_mirror(
        &self,
        _capability: &Capability,
        _request: &MirrorRequest,
        sink: FrameSink,
    ) -> Result<Box<dyn MirroredDisplay>, String> {
        if self.fail_create {
            return Err("no virtual display slots".to_string());
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().push(sink.clone());

        sink.push(make_frame(self.first_kind.unwrap_or(self.kind)));
        let kind = self.kind;
        let cadence = self.cadence;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(cadence).await;
                if !sink.push(make_frame(kind)) {
                    break;
                }
            }
        });

        let hook = self.on_create.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }

        Ok(Box::new(FakeMirror {
            released: Arc::clone(&self.released),
            fail_release: self.fail_release,
        }))
    }
}

/// Wall clock that advances with tokio time, so paused-time tests produce
/// distinct artifact names.
pub struct TokioClock {
    base: DateTime<Local>,
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            base: Local.with_ymd_and_hms(2026, 1, 15, 8, 0, 0).unwrap(),
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = tokio::time::Instant::now() - self.origin;
        self.base + chrono::Duration::from_std(elapsed).unwrap()
    }
}

/// Clock frozen at a single instant.
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

#[derive(Default)]
pub struct CountingPresence {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub fail_acquire: bool,
}

impl CountingPresence {
    pub fn held(&self) -> bool {
        self.acquired.load(Ordering::SeqCst) > self.released.load(Ordering::SeqCst)
    }
}

impl ForegroundPresence for CountingPresence {
    fn acquire(&self) -> Result<(), String> {
        if self.fail_acquire {
            return Err("foreground service not allowed".to_string());
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> Result<(), String> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn config(dir: &Path) -> CaptureConfig {
    CaptureConfig {
        interval: INTERVAL,
        output_dir: dir.to_path_buf(),
        display: DisplayMetrics {
            width: WIDTH,
            height: HEIGHT,
            density: 160,
        },
        queue_depth: 2,
    }
}

pub struct Harness {
    pub manager: CaptureManager,
    pub backend: Arc<FakeBackend>,
    pub presence: Arc<CountingPresence>,
    pub dir: tempfile::TempDir,
}

/// Manager over a fake backend, storing into a fresh temp dir. Must be called
/// inside a tokio runtime.
pub fn harness(backend: FakeBackend) -> Harness {
    harness_with(backend, CountingPresence::default())
}

pub fn harness_with(backend: FakeBackend, presence: CountingPresence) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(backend);
    let presence = Arc::new(presence);
    let manager = CaptureManager::builder(backend.clone())
        .config(config(dir.path()))
        .presence(presence.clone())
        .clock(Arc::new(TokioClock::new()))
        .build()
        .unwrap();

    Harness {
        manager,
        backend,
        presence,
        dir,
    }
}

pub fn capability() -> Capability {
    Capability::new("grant-test", vec![0xCA, 0xFE])
}
