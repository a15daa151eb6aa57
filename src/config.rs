//! Capture configuration.
//!
//! Defaults match the production policy (one capture every five minutes,
//! stored under the platform data directory):
//!   macOS:   ~/Library/Application Support/screenwatch/screenshots/
//!   Linux:   ~/.local/share/screenwatch/screenshots/
//!   Windows: %APPDATA%/screenwatch/screenshots/
//!
//! Every field can be overridden through the environment (or a `.env` file
//! loaded by the binary entry point).

use crate::capture::DEFAULT_QUEUE_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Seconds between captures unless overridden.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Name of the artifact subdirectory.
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// Geometry of the mirrored display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub width: u32,
    pub height: u32,
    pub density: u32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            density: 420,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    pub output_dir: PathBuf,
    pub display: DisplayMetrics,
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            output_dir: default_output_dir(),
            display: DisplayMetrics::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl CaptureConfig {
    /// Defaults overridden by `SCREENWATCH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64>(&lookup, "SCREENWATCH_INTERVAL_SECS") {
            if secs == 0 {
                log::warn!("[CONFIG] SCREENWATCH_INTERVAL_SECS must be > 0, keeping default");
            } else {
                config.interval = Duration::from_secs(secs);
            }
        }

        if let Some(dir) = lookup("SCREENWATCH_OUTPUT_DIR").filter(|d| !d.trim().is_empty()) {
            config.output_dir = PathBuf::from(dir);
        }

        if let Some(width) = parse_var(&lookup, "SCREENWATCH_WIDTH") {
            config.display.width = width;
        }
        if let Some(height) = parse_var(&lookup, "SCREENWATCH_HEIGHT") {
            config.display.height = height;
        }
        if let Some(density) = parse_var(&lookup, "SCREENWATCH_DENSITY") {
            config.display.density = density;
        }

        config
    }
}

/// Base directory for stored screenshots.
pub fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("screenwatch")
        .join(SCREENSHOTS_DIR)
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("[CONFIG] Ignoring invalid {}='{}'", key, raw);
            None
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
