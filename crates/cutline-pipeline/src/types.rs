//! Shared types for the cutline geometry engine.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference raster
/// data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` for preview rasters and decoded sources.
pub use image::RgbaImage;

/// Pixel value marking foreground in a [`Mask`].
pub const FOREGROUND: u8 = 255;

/// Pixel value marking background in a [`Mask`].
pub const BACKGROUND: u8 = 0;

/// An integer point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl PixelPoint {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        dx.hypot(dy)
    }
}

impl From<imageproc::point::Point<i32>> for PixelPoint {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<PixelPoint> for imageproc::point::Point<i32> {
    fn from(p: PixelPoint) -> Self {
        Self::new(p.x, p.y)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Axis-aligned extent of a set of points.
///
/// `width` and `height` are measured between extreme point coordinates
/// (`max - min`), so the shoelace area of an axis-aligned rectangle
/// contour equals `width * height` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Horizontal extent.
    pub width: i32,
    /// Vertical extent.
    pub height: i32,
}

impl BoundingBox {
    /// Right edge (`x + width`).
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`).
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Horizontal center, rounded toward the left edge.
    #[must_use]
    pub const fn center_x(&self) -> i32 {
        self.x + self.width / 2
    }

    /// Vertical center, rounded toward the top edge.
    #[must_use]
    pub const fn center_y(&self) -> i32 {
        self.y + self.height / 2
    }

    /// Area of the box in square pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }

    /// Returns `true` if either side has zero length.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// A closed boundary of a connected foreground region, as an ordered
/// sequence of pixel points. The closing edge from the last point back
/// to the first is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour(Vec<PixelPoint>);

impl Contour {
    /// Create a contour from its points.
    #[must_use]
    pub const fn new(points: Vec<PixelPoint>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// All points in boundary order.
    #[must_use]
    pub fn points(&self) -> &[PixelPoint] {
        &self.0
    }

    /// Consumes the contour and returns its points.
    #[must_use]
    pub fn into_points(self) -> Vec<PixelPoint> {
        self.0
    }

    /// Enclosed area (shoelace formula), always non-negative.
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.0.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice_area: i64 = 0;
        for i in 0..n {
            let a = self.0[i];
            let b = self.0[(i + 1) % n];
            twice_area += i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y);
        }
        #[allow(clippy::cast_precision_loss)]
        let area = twice_area.abs() as f64 / 2.0;
        area
    }

    /// Length of the closed polygon, including the closing edge.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        let n = self.0.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.0[i].distance(self.0[(i + 1) % n]))
            .sum()
    }

    /// Extent of the contour points, or `None` for an empty contour.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.0.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.0[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    /// Map every point through `scale` and then `offset` (used by the
    /// preview renderer to move a contour into supersampled canvas space).
    #[must_use]
    pub fn transformed(&self, scale: i32, offset_x: i32, offset_y: i32) -> Self {
        Self(
            self.0
                .iter()
                .map(|p| PixelPoint::new(p.x * scale + offset_x, p.y * scale + offset_y))
                .collect(),
        )
    }
}

/// A binary foreground mask: every pixel is [`FOREGROUND`] or
/// [`BACKGROUND`].
///
/// Masks are values: operations that derive a new mask return it rather
/// than mutating the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    /// An all-background mask.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Binarize a grayscale raster: pixels strictly above `threshold`
    /// become foreground.
    #[must_use]
    pub fn from_threshold(raster: &GrayImage, threshold: u8) -> Self {
        Self(GrayImage::from_fn(raster.width(), raster.height(), |x, y| {
            image::Luma([binary(raster.get_pixel(x, y).0[0] > threshold)])
        }))
    }

    /// Build a mask from a per-pixel predicate.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            image::Luma([binary(f(x, y))])
        }))
    }

    /// Wrap a raster that is already binary. Any non-zero pixel is
    /// normalised to [`FOREGROUND`].
    #[must_use]
    pub fn from_binary(mut raster: GrayImage) -> Self {
        for p in raster.pixels_mut() {
            if p.0[0] != BACKGROUND {
                p.0[0] = FOREGROUND;
            }
        }
        Self(raster)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.0.width(),
            height: self.0.height(),
        }
    }

    /// Whether the pixel at `(x, y)` is foreground. Out-of-bounds
    /// coordinates are background.
    #[must_use]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        x < self.0.width() && y < self.0.height() && self.0.get_pixel(x, y).0[0] != BACKGROUND
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn foreground_count(&self) -> u64 {
        self.0.pixels().map(|p| u64::from(p.0[0] != BACKGROUND)).sum()
    }

    /// Fraction of the mask that is foreground, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn foreground_ratio(&self) -> f64 {
        let total = u64::from(self.0.width()) * u64::from(self.0.height());
        if total == 0 {
            return 0.0;
        }
        self.foreground_count() as f64 / total as f64
    }

    /// Returns `true` if every foreground pixel of `other` is also
    /// foreground here. Masks of different sizes are never supersets.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.dimensions() == other.dimensions()
            && self
                .0
                .pixels()
                .zip(other.0.pixels())
                .all(|(a, b)| b.0[0] == BACKGROUND || a.0[0] != BACKGROUND)
    }

    /// Pixel-wise union.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::from_fn(self.width(), self.height(), |x, y| {
            self.is_foreground(x, y) || other.is_foreground(x, y)
        })
    }

    /// Pixels set here but not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self::from_fn(self.width(), self.height(), |x, y| {
            self.is_foreground(x, y) && !other.is_foreground(x, y)
        })
    }

    /// Swap foreground and background.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self::from_fn(self.width(), self.height(), |x, y| !self.is_foreground(x, y))
    }

    /// Borrow the underlying raster.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the mask and return the underlying raster.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

const fn binary(on: bool) -> u8 {
    if on { FOREGROUND } else { BACKGROUND }
}

/// What is being manufactured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// A free-standing object: no attachment hardware.
    #[default]
    Objet,
    /// A keyring: receives a ring tab or an internal hole.
    Keyring,
}

/// How a keyring is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoleType {
    /// A tab protruding outside the cutting line, carrying the hole.
    #[default]
    Ring,
    /// A hole cut inside the cutting line.
    Internal,
}

/// Which side of the shape carries the attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentPosition {
    /// Above the shape.
    #[default]
    Top,
    /// Below the shape.
    Bottom,
    /// Left of the shape.
    Left,
    /// Right of the shape.
    Right,
}

impl AttachmentPosition {
    /// Returns `true` for `Top` and `Bottom`.
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }
}

impl std::str::FromStr for AttachmentPosition {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown attachment position: {other}"
            ))),
        }
    }
}

/// Errors produced by the engine.
///
/// None of these are fatal to a quote: callers degrade to a simpler
/// fallback (see [`crate::quote`]).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Segmentation produced no usable mask.
    #[error("no usable foreground found")]
    NoForeground,

    /// The dominant contour is below the noise threshold.
    #[error("shape too small: {area:.1} px² is below the noise threshold")]
    ShapeTooSmall {
        /// Enclosed area of the largest contour.
        area: f64,
    },

    /// No contour was found.
    #[error("no contour found in mask")]
    NoContour,

    /// A bounding box had zero area during hole placement.
    #[error("degenerate geometry: zero-area bounding box")]
    DegenerateGeometry,

    /// A region hint polygon had fewer than three points.
    #[error("region hint polygon needs at least 3 points, got {0}")]
    InvalidPolygon(usize),

    /// Preview compositing failed.
    #[error("preview rendering failed: {0}")]
    RenderFailure(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
