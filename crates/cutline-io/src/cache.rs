//! On-disk mask cache.
//!
//! Masks are stored as 8-bit grayscale PNGs named after a sanitized form
//! of the cache key. Writes go to a unique temporary file in the same
//! directory and are then renamed over the entry, so concurrent writers
//! never leave a torn file behind; the last rename wins.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use cutline_pipeline::{Mask, MaskCache};
use tracing::{debug, warn};

use crate::IoError;
use crate::raster::encode_gray_png;

/// File name suffix of cache entries.
const ENTRY_SUFFIX: &str = ".mask.png";

/// Distinguishes temporary files written by one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A [`MaskCache`] backed by a directory.
#[derive(Debug, Clone)]
pub struct FsMaskCache {
    dir: PathBuf,
}

impl FsMaskCache {
    /// A cache rooted at `dir`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Io`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, IoError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the entries.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry for `key`.
    #[must_use]
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{ENTRY_SUFFIX}", sanitize(key)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}.{n}.tmp", sanitize(key), std::process::id()))
    }
}

impl MaskCache for FsMaskCache {
    type Error = IoError;

    fn save(&self, key: &str, mask: &Mask) -> Result<(), Self::Error> {
        let png = encode_gray_png(mask.as_image())?;
        let temp = self.temp_path(key);
        std::fs::write(&temp, png)?;
        if let Err(e) = std::fs::rename(&temp, self.entry_path(key)) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        debug!(key, path = %self.entry_path(key).display(), "mask cached");
        Ok(())
    }

    fn load(&self, key: &str) -> Option<Mask> {
        let path = self.entry_path(key);
        let bytes = std::fs::read(&path).ok()?;
        match image::load_from_memory(&bytes) {
            Ok(raster) => Some(Mask::from_binary(raster.to_luma8())),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache entry");
                None
            }
        }
    }
}

/// Keep ASCII letters, digits, `-`, `_` and `.`; replace everything else,
/// including path separators, with `_`.
fn sanitize(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_owned()
    } else {
        cleaned
    }
}
