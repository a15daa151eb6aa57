//! Image store: persists normalized captures as PNG files.
//!
//! Files are named `screenshot_<YYYYMMDD_HHmmss>.png` after the wall-clock
//! time of the save. Two saves within the same second share a name and the
//! later one replaces the earlier. Nothing here ever deletes an artifact.

use crate::capture::NormalizedImage;
use chrono::{DateTime, Local};
use image::{ImageEncoder, ImageError};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ARTIFACT_PREFIX: &str = "screenshot_";
pub const ARTIFACT_EXTENSION: &str = "png";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Wall-clock source for artifact names.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A capture written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub captured_at: DateTime<Local>,
    pub bytes: u64,
}

impl StoredArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct ImageStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode `image` as PNG under a name taken from the current time.
    pub fn save(&self, image: &NormalizedImage) -> Result<StoredArtifact, StoreError> {
        self.save_at(image, self.clock.now())
    }

    /// Encode `image` as PNG under the name for `captured_at`.
    ///
    /// The directory is created on first use.
    pub fn save_at(
        &self,
        image: &NormalizedImage,
        captured_at: DateTime<Local>,
    ) -> Result<StoredArtifact, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StoreError::StorageUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let path = self.dir.join(artifact_name(&captured_at));
        let file = File::create(&path).map_err(|e| {
            StoreError::StorageUnavailable(format!("{}: {}", path.display(), e))
        })?;

        let start = std::time::Instant::now();
        let mut writer = BufWriter::new(file);
        image::codecs::png::PngEncoder::new(&mut writer)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| match e {
                ImageError::IoError(io) => StoreError::StorageUnavailable(io.to_string()),
                other => StoreError::EncodeFailure(other.to_string()),
            })?;
        let file = writer
            .into_inner()
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        file.sync_all()
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        let bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
        log::info!(
            "[STORE] Screenshot saved at {} ({} bytes, {}ms)",
            path.display(),
            bytes,
            start.elapsed().as_millis()
        );

        Ok(StoredArtifact {
            path,
            captured_at,
            bytes,
        })
    }

    /// Artifacts currently in the store directory, sorted by name (and
    /// therefore by capture time).
    pub fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_artifact(path))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// File name for a capture taken at `captured_at`, whole-second precision.
pub fn artifact_name(captured_at: &DateTime<Local>) -> String {
    format!(
        "{}{}.{}",
        ARTIFACT_PREFIX,
        captured_at.format(TIMESTAMP_FORMAT),
        ARTIFACT_EXTENSION
    )
}

fn is_artifact(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(ARTIFACT_PREFIX)
        && path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("PNG encoding failed: {0}")]
    EncodeFailure(String),
}
