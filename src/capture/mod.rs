//! Screen capture domain: public API.
//!
//! This module owns the mirrored feed and everything that happens to a frame
//! before it is stored. External code should only use the items exported
//! here.

mod capability;
mod decode;
mod frame;
#[cfg(feature = "monitor")]
mod monitor;
mod source;

pub use capability::{Capability, Revoker};
pub use decode::{padded_width, DecodeError, FrameDecoder, NormalizedImage};
pub use frame::{FrameQueue, FrameSink, Plane, RawFrame, DEFAULT_QUEUE_DEPTH};
#[cfg(feature = "monitor")]
pub use monitor::{capture_primary_monitor, MonitorBackend, MonitorError};
pub use source::{DisplayBackend, FrameSource, MirrorRequest, MirroredDisplay, SourceError};
