//! Raw frame buffers and the bounded queue between the display compositor
//! (producer) and the capture tick (consumer).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Frames kept in flight before the producer starts dropping the oldest.
pub const DEFAULT_QUEUE_DEPTH: usize = 2;

/// One image plane as handed over by the compositor.
#[derive(Debug, Clone)]
pub struct Plane {
    pub data: Vec<u8>,
    /// Bytes between the starts of two consecutive rows (includes padding).
    pub row_stride: usize,
    /// Bytes between two horizontally adjacent pixels.
    pub pixel_stride: usize,
}

/// One captured buffer. Dropping it returns the slot to the queue.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub planes: Vec<Plane>,
}

impl RawFrame {
    /// Single-plane RGBA_8888 frame.
    pub fn rgba(width: u32, height: u32, row_stride: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            planes: vec![Plane {
                data,
                row_stride,
                pixel_stride: 4,
            }],
        }
    }
}

struct QueueState {
    frames: VecDeque<RawFrame>,
    closed: bool,
}

struct Inner {
    depth: usize,
    state: Mutex<QueueState>,
    dropped: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Consumer side of the bounded frame queue.
pub struct FrameQueue {
    inner: Arc<Inner>,
}

impl FrameQueue {
    pub fn new(depth: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                depth: depth.max(1),
                state: Mutex::new(QueueState {
                    frames: VecDeque::with_capacity(depth.max(1)),
                    closed: false,
                }),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Producer handle for the display backend.
    pub fn sink(&self) -> FrameSink {
        FrameSink {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Newest queued frame, discarding anything older. Never waits.
    pub fn acquire_latest(&self) -> Option<RawFrame> {
        let mut state = self.inner.lock();
        let latest = state.frames.pop_back();
        state.frames.clear();
        latest
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames the producer had to discard because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Release every buffer and refuse further pushes.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        state.closed = true;
        state.frames.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

/// Producer side of the bounded frame queue.
#[derive(Clone)]
pub struct FrameSink {
    inner: Arc<Inner>,
}

impl FrameSink {
    /// Queue a frame without blocking. When the queue is full the oldest
    /// buffer is dropped. Returns `false` once the queue has been closed, which
    /// tells the producer to stop.
    pub fn push(&self, frame: RawFrame) -> bool {
        let mut state = self.inner.lock();
        if state.closed {
            return false;
        }
        while state.frames.len() >= self.inner.depth {
            state.frames.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        state.frames.push_back(frame);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
