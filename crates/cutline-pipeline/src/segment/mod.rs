//! Foreground segmentation: separate the subject from its background.
//!
//! This module defines the [`Segmenter`] trait for pluggable segmentation
//! strategies, the built-in [`SegmenterKind`] strategies, and the
//! [`MaskExtractor`] that tries an ordered chain of them until one
//! produces a plausible mask.
//!
//! # Strategy chain
//!
//! 1. An optional injected [`BackgroundRemover`] (an ML model or similar),
//!    constructed once by the process and shared by reference.
//! 2. [`SegmenterKind::AlphaChannel`]: the image's own transparency.
//! 3. [`SegmenterKind::CornerSampling`]: a uniform background colour
//!    sampled at the corners.
//! 4. [`SegmenterKind::Otsu`]: a global luminance threshold, which always
//!    produces a mask.
//!
//! A strategy *declines* by returning a [`SegmentError`]; the extractor
//! logs it and moves on.

mod alpha;
mod corner;
mod gmm;
mod grabcut;
mod maxflow;
mod otsu;

use std::sync::Arc;

use image::{DynamicImage, RgbaImage};
use tracing::{debug, info, instrument, warn};

use crate::types::{Mask, PipelineError};

pub use grabcut::{GRABCUT_ITERATIONS, MIN_REFINED_RATIO, polygon_mask, refine_with_polygon};

/// Why a strategy declined to produce a mask.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentError {
    /// The image has zero width or height.
    #[error("image is empty")]
    EmptyImage,

    /// The image has no alpha channel.
    #[error("image has no alpha channel")]
    NoAlpha,

    /// The alpha mask covers nothing, or so much the image is opaque.
    #[error("alpha channel marks {ratio:.3} of the image as foreground")]
    AlphaCoverage {
        /// Fraction of pixels above the alpha threshold.
        ratio: f64,
    },

    /// No corner colour bucket holds a majority of the samples.
    #[error("no dominant background colour (top bucket holds {share:.3} of corner samples)")]
    NoDominantBackground {
        /// Fraction of samples in the most frequent bucket.
        share: f64,
    },

    /// The foreground ratio is outside the plausible range.
    #[error("implausible foreground ratio {ratio:.3}")]
    ImplausibleForeground {
        /// Fraction of pixels marked foreground.
        ratio: f64,
    },

    /// The injected background remover returned nothing usable.
    #[error("background remover declined: {0}")]
    ProviderDeclined(String),
}

/// Trait for segmentation strategies.
///
/// Input: a decoded image. Output: a binary mask of the same dimensions,
/// or a [`SegmentError`] explaining why this strategy does not apply.
pub trait Segmenter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Segment the image.
    ///
    /// # Errors
    ///
    /// Returns a [`SegmentError`] when the strategy declines.
    fn segment(&self, source: &DynamicImage) -> Result<Mask, SegmentError>;
}

/// Built-in segmentation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterKind {
    /// Threshold the alpha channel.
    AlphaChannel,
    /// Distance from a corner-sampled background colour.
    CornerSampling,
    /// Global Otsu threshold on luminance.
    Otsu,
}

impl SegmenterKind {
    /// The default chain, in the order it is tried.
    pub const DEFAULT_CHAIN: [Self; 3] = [Self::AlphaChannel, Self::CornerSampling, Self::Otsu];
}

impl Segmenter for SegmenterKind {
    fn name(&self) -> &'static str {
        match *self {
            Self::AlphaChannel => "alpha",
            Self::CornerSampling => "corner",
            Self::Otsu => "otsu",
        }
    }

    fn segment(&self, source: &DynamicImage) -> Result<Mask, SegmentError> {
        if source.width() == 0 || source.height() == 0 {
            return Err(SegmentError::EmptyImage);
        }
        match *self {
            Self::AlphaChannel => alpha::segment(source),
            Self::CornerSampling => corner::segment(&source.to_rgb8()),
            Self::Otsu => Ok(otsu::segment(&source.to_luma8())),
        }
    }
}

/// Output of an external background remover.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    /// The subject with its background made transparent.
    pub color: RgbaImage,
    /// Binary foreground mask.
    pub mask: Mask,
}

/// An external background-removal capability, such as an ML model.
///
/// Implementations are loaded once and shared across requests, so they
/// must be `Send + Sync`.
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background, or return `None` if the remover fails.
    fn remove_background(&self, source: &DynamicImage) -> Option<Segmentation>;
}

/// A successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Binary foreground mask, same dimensions as the source.
    pub mask: Mask,
    /// Name of the strategy that produced the mask.
    pub strategy: &'static str,
    /// Background-free colour raster, when the remover supplied one.
    pub color: Option<RgbaImage>,
}

/// Ordered chain of segmentation strategies.
pub struct MaskExtractor {
    provider: Option<Arc<dyn BackgroundRemover>>,
    strategies: Vec<Box<dyn Segmenter>>,
}

impl std::fmt::Debug for MaskExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskExtractor")
            .field("provider", &self.provider.is_some())
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for MaskExtractor {
    fn default() -> Self {
        Self::new(
            SegmenterKind::DEFAULT_CHAIN
                .into_iter()
                .map(|k| Box::new(k) as Box<dyn Segmenter>)
                .collect(),
        )
    }
}

impl MaskExtractor {
    /// An extractor trying `strategies` in order, with no provider.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn Segmenter>>) -> Self {
        Self {
            provider: None,
            strategies,
        }
    }

    /// Try `provider` before any built-in strategy.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn BackgroundRemover>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Segment `source`, returning the first mask any strategy produces.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoForeground`] when every strategy
    /// declines or the resulting mask is empty.
    pub fn extract(&self, source: &DynamicImage) -> Result<Mask, PipelineError> {
        self.extract_detailed(source).map(|e| e.mask)
    }

    /// Like [`extract`](Self::extract), also reporting which strategy
    /// succeeded and any colour raster from the provider.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoForeground`] when every strategy
    /// declines or the resulting mask is empty.
    #[instrument(skip(self, source), fields(width = source.width(), height = source.height()))]
    pub fn extract_detailed(&self, source: &DynamicImage) -> Result<Extraction, PipelineError> {
        if let Some(provider) = &self.provider {
            match self.try_provider(provider.as_ref(), source) {
                Ok(extraction) => return Ok(extraction),
                Err(e) => debug!(error = %e, "provider declined"),
            }
        }

        for strategy in &self.strategies {
            match strategy.segment(source) {
                Ok(mask) if mask.foreground_count() > 0 => {
                    info!(
                        strategy = strategy.name(),
                        ratio = mask.foreground_ratio(),
                        "foreground extracted"
                    );
                    return Ok(Extraction {
                        mask,
                        strategy: strategy.name(),
                        color: None,
                    });
                }
                Ok(_) => debug!(strategy = strategy.name(), "empty mask"),
                Err(e) => debug!(strategy = strategy.name(), error = %e, "strategy declined"),
            }
        }

        warn!("no segmentation strategy produced a foreground");
        Err(PipelineError::NoForeground)
    }

    fn try_provider(
        &self,
        provider: &dyn BackgroundRemover,
        source: &DynamicImage,
    ) -> Result<Extraction, SegmentError> {
        let segmentation = provider
            .remove_background(source)
            .ok_or_else(|| SegmentError::ProviderDeclined("no result".to_owned()))?;
        if segmentation.mask.width() != source.width()
            || segmentation.mask.height() != source.height()
        {
            return Err(SegmentError::ProviderDeclined(format!(
                "mask is {}x{}, image is {}x{}",
                segmentation.mask.width(),
                segmentation.mask.height(),
                source.width(),
                source.height()
            )));
        }
        if segmentation.mask.foreground_count() == 0 {
            return Err(SegmentError::ProviderDeclined("empty mask".to_owned()));
        }
        info!(
            ratio = segmentation.mask.foreground_ratio(),
            strategies_skipped = self.strategies.len(),
            "foreground extracted by provider"
        );
        Ok(Extraction {
            mask: segmentation.mask,
            strategy: "provider",
            color: Some(segmentation.color),
        })
    }
}
