//! Mask caching contract.
//!
//! Extracting a mask is the most expensive stage, and the same upload is
//! often quoted several times with different sizes or options. A
//! [`MaskCache`] stores masks by an opaque key (usually the upload's file
//! name). This crate only defines the contract and an in-memory
//! implementation; the filesystem implementation lives in `cutline-io`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Mutex, PoisonError};

use image::DynamicImage;
use tracing::{debug, warn};

use crate::segment::{Extraction, MaskExtractor};
use crate::types::{Mask, PipelineError};

/// Strategy name reported for a mask served from a cache.
pub const CACHED_STRATEGY: &str = "cached";

/// Storage for previously extracted masks.
pub trait MaskCache: Send + Sync {
    /// Error returned by [`save`](Self::save).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store `mask` under `key`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an implementation-specific error if the mask could not be
    /// stored.
    fn save(&self, key: &str, mask: &Mask) -> Result<(), Self::Error>;

    /// The mask stored under `key`, if any. Unreadable entries are misses.
    fn load(&self, key: &str) -> Option<Mask>;
}

/// A process-local cache.
#[derive(Debug, Default)]
pub struct MemoryMaskCache {
    entries: Mutex<HashMap<String, Mask>>,
}

impl MemoryMaskCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MaskCache for MemoryMaskCache {
    type Error = Infallible;

    fn save(&self, key: &str, mask: &Mask) -> Result<(), Self::Error> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), mask.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Option<Mask> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// Extract a mask for `source`, consulting `cache` first.
///
/// A hit reports [`CACHED_STRATEGY`]; a miss reports the strategy that
/// produced the fresh mask. A cached mask whose dimensions differ from
/// `source` is ignored. A freshly extracted mask is stored; a failed store
/// is logged and does not fail the extraction.
///
/// # Errors
///
/// Returns [`PipelineError::NoForeground`] when nothing is cached and
/// every strategy declines.
pub fn extract_cached<C: MaskCache + ?Sized>(
    extractor: &MaskExtractor,
    cache: &C,
    key: &str,
    source: &DynamicImage,
) -> Result<Extraction, PipelineError> {
    if let Some(mask) = cache.load(key) {
        if mask.width() == source.width() && mask.height() == source.height() {
            debug!(key, "mask cache hit");
            return Ok(Extraction {
                mask,
                strategy: CACHED_STRATEGY,
                color: None,
            });
        }
        debug!(key, "cached mask has stale dimensions");
    }
    let extraction = extractor.extract_detailed(source)?;
    if let Err(e) = cache.save(key, &extraction.mask) {
        warn!(key, error = %e, "failed to cache mask");
    }
    Ok(extraction)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn badge() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(30, 30, |x, y| {
            let alpha = if (5..25).contains(&x) && (5..25).contains(&y) {
                255
            } else {
                0
            };
            Rgba([10, 120, 10, alpha])
        }))
    }

    #[test]
    fn miss_extracts_and_stores() {
        let cache = MemoryMaskCache::new();
        let fresh =
            extract_cached(&MaskExtractor::default(), &cache, "badge.png", &badge()).unwrap();
        assert_eq!(fresh.mask.foreground_count(), 400);
        assert_eq!(fresh.strategy, "alpha");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.load("badge.png"), Some(fresh.mask));
    }

    #[test]
    fn hit_bypasses_extraction() {
        let cache = MemoryMaskCache::new();
        let stored = Mask::from_fn(30, 30, |x, _| x < 3);
        cache.save("badge.png", &stored).unwrap();
        let hit = extract_cached(&MaskExtractor::new(Vec::new()), &cache, "badge.png", &badge())
            .unwrap();
        assert_eq!(hit.mask, stored);
        assert_eq!(hit.strategy, CACHED_STRATEGY);
    }

    #[test]
    fn stale_dimensions_are_re_extracted() {
        let cache = MemoryMaskCache::new();
        cache.save("badge.png", &Mask::from_fn(8, 8, |_, _| true)).unwrap();
        let fresh =
            extract_cached(&MaskExtractor::default(), &cache, "badge.png", &badge()).unwrap();
        assert_eq!(fresh.mask.width(), 30);
        assert_ne!(fresh.strategy, CACHED_STRATEGY);
        assert_eq!(cache.load("badge.png").unwrap().width(), 30);
    }

    #[test]
    fn unknown_key_is_a_miss() {
        assert!(MemoryMaskCache::new().load("nothing").is_none());
        assert!(MemoryMaskCache::new().is_empty());
    }
}
