//! Customer-facing preview of the cutting line.
//!
//! The preview is rendered at [`PreviewStyle::scale`] times the source
//! resolution so one-pixel outlines look thin. The source is composited
//! over white, the canvas is padded (extra room at the bottom for the
//! size label and on the attachment side for a ring tab), and the lines
//! are drawn as mask outlines.

pub mod label;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use tracing::{debug, instrument};

use crate::blur::{MASK_THRESHOLD, odd_kernel, smooth_mask};
use crate::config::CuttingConfig;
use crate::cutting::CuttingLineResult;
use crate::hole::{Hole, TAB_MARGIN_MM};
use crate::morphology::{close_disk, outline};
use crate::types::{AttachmentPosition, BACKGROUND, FOREGROUND, Mask, PipelineError};
use crate::units::PhysicalSize;

/// Base padding on every side, as a fraction of the larger canvas side.
const BASE_PADDING: f64 = 0.06;
/// Extra bottom padding when a size label is drawn.
const LABEL_PADDING: f64 = 0.08;
/// Minimum attachment-side padding for a ring tab.
const RING_PADDING: f64 = 0.12;
/// Canvas pixels per millimetre when no physical size is given: the larger
/// side spans this many millimetres.
const FALLBACK_SPAN_MM: f64 = 60.0;
/// Smallest tab margin in canvas pixels.
const MIN_TAB_MARGIN_PX: i32 = 3;

/// Rendering options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewStyle {
    /// Supersampling factor.
    pub scale: u32,
    /// Colour of the cutting line, hole outlines and size label.
    pub line_color: Rgba<u8>,
    /// Also outline the print line.
    pub show_print_line: bool,
    /// Colour of the print line.
    pub print_color: Rgba<u8>,
    /// How far a ring tab protrudes beyond the cutting line, in
    /// millimetres. Sizes the attachment-side padding.
    pub ring_protrusion_mm: f64,
}

impl Default for PreviewStyle {
    fn default() -> Self {
        Self::for_config(&CuttingConfig::default())
    }
}

impl PreviewStyle {
    /// The default style, with the ring protrusion taken from `config`.
    #[must_use]
    pub fn for_config(config: &CuttingConfig) -> Self {
        let ring = &config.keyring_hole;
        Self {
            scale: 2,
            line_color: Rgba([230, 0, 0, 255]),
            show_print_line: false,
            print_color: Rgba([0, 90, 230, 255]),
            ring_protrusion_mm: ring.edge_distance_mm + ring.diameter_mm + 1.5,
        }
    }
}

/// Canvas geometry: the source placed at `(ox, oy)` on a padded canvas.
#[derive(Debug, Clone, Copy)]
struct Layout {
    scale: u32,
    ox: u32,
    oy: u32,
    width: u32,
    height: u32,
    base_pad: u32,
    px_per_mm: f64,
}

impl Layout {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn new(
        source_w: u32,
        source_h: u32,
        result: &CuttingLineResult,
        size_mm: Option<PhysicalSize>,
        style: &PreviewStyle,
    ) -> Self {
        let scale = style.scale.max(1);
        let (sw, sh) = (source_w * scale, source_h * scale);
        let longest = f64::from(sw.max(sh));
        let px_per_mm = match size_mm {
            Some(size) if size.width_mm > 0.0 => f64::from(sw) / size.width_mm,
            _ => longest / FALLBACK_SPAN_MM,
        };

        let base_pad = (longest * BASE_PADDING) as u32;
        // top, bottom, left, right
        let mut extra = [0u32; 4];
        if size_mm.is_some() {
            extra[1] = (longest * LABEL_PADDING) as u32;
        }
        if result.has_ring() {
            let ring = ((style.ring_protrusion_mm * px_per_mm) as u32)
                .max((longest * RING_PADDING) as u32);
            let side = match result.options.attachment_position {
                AttachmentPosition::Top => 0,
                AttachmentPosition::Bottom => 1,
                AttachmentPosition::Left => 2,
                AttachmentPosition::Right => 3,
            };
            extra[side] = ring;
        }

        Self {
            scale,
            ox: base_pad + extra[2],
            oy: base_pad + extra[0],
            width: sw + 2 * base_pad + extra[2] + extra[3],
            height: sh + 2 * base_pad + extra[0] + extra[1],
            base_pad,
            px_per_mm,
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    const fn point(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x * self.scale as i32 + self.ox as i32,
            y * self.scale as i32 + self.oy as i32,
        )
    }

    fn line_thickness(&self) -> u8 {
        u8::try_from((self.width.min(self.height) / 600).max(1)).unwrap_or(u8::MAX)
    }

    /// Upscale a source-resolution mask (bilinear, re-thresholded) and
    /// place it on the canvas.
    fn place_mask(&self, mask: &Mask) -> Mask {
        let up = imageops::resize(
            mask.as_image(),
            mask.width() * self.scale,
            mask.height() * self.scale,
            FilterType::Triangle,
        );
        let mut canvas = GrayImage::new(self.width, self.height);
        imageops::replace(&mut canvas, &up, i64::from(self.ox), i64::from(self.oy));
        Mask::from_threshold(&canvas, MASK_THRESHOLD)
    }
}

/// Render a preview of `result` over `source`.
///
/// When `size_mm` is given, a `W×Hmm` label is drawn below the piece and
/// millimetre-based margins use its scale.
///
/// # Errors
///
/// Returns [`PipelineError::RenderFailure`] if the source is empty or its
/// dimensions do not match the result's masks.
#[instrument(skip(source, result, style), fields(width = source.width(), height = source.height()))]
pub fn render(
    source: &DynamicImage,
    result: &CuttingLineResult,
    size_mm: Option<PhysicalSize>,
    style: &PreviewStyle,
) -> Result<RgbaImage, PipelineError> {
    let (w, h) = (source.width(), source.height());
    if w == 0 || h == 0 {
        return Err(PipelineError::RenderFailure("source image is empty".to_owned()));
    }
    let cutting_mask = &result.cutting.mask;
    if cutting_mask.width() != w || cutting_mask.height() != h {
        return Err(PipelineError::RenderFailure(format!(
            "mask is {}x{}, source is {w}x{h}",
            cutting_mask.width(),
            cutting_mask.height()
        )));
    }

    let layout = Layout::new(w, h, result, size_mm, style);
    let mut canvas = RgbaImage::from_pixel(layout.width, layout.height, Rgba([255, 255, 255, 255]));
    composite_over_white(&mut canvas, source, &layout);

    let thin = layout.line_thickness();

    if style.show_print_line {
        let print = preview_smooth(&layout.place_mask(&result.print.mask));
        paint(&mut canvas, &outline(&print, thin), style.print_color);
    }

    let cutting = layout.place_mask(cutting_mask);
    match result.hole {
        Some(Hole::Ring { center, radius_px }) => {
            let (body, hole) = ring_tab(&cutting, center.x, center.y, radius_px, result, &layout);
            paint(&mut canvas, &outline(&body, thin), style.line_color);
            paint(&mut canvas, &outline(&hole, thin), style.line_color);
        }
        Some(Hole::Internal {
            center,
            width_px,
            height_px,
        }) => {
            paint(&mut canvas, &outline(&preview_smooth(&cutting), thin), style.line_color);
            let (cx, cy) = layout.point(center.x, center.y);
            let mut hole = GrayImage::new(layout.width, layout.height);
            draw_filled_ellipse_mut(
                &mut hole,
                (cx, cy),
                half_scaled(width_px, layout.scale),
                half_scaled(height_px, layout.scale),
                Luma([FOREGROUND]),
            );
            paint(&mut canvas, &outline(&Mask::from_binary(hole), thin), style.line_color);
        }
        None => {
            paint(&mut canvas, &outline(&preview_smooth(&cutting), thin), style.line_color);
        }
    }

    if let Some(size) = size_mm {
        draw_size_label(&mut canvas, size, &layout, style.line_color);
    }

    debug!(
        canvas_width = layout.width,
        canvas_height = layout.height,
        "preview rendered"
    );
    Ok(canvas)
}

/// Lanczos-upscale the source and alpha-blend it over the white canvas.
fn composite_over_white(canvas: &mut RgbaImage, source: &DynamicImage, layout: &Layout) {
    let up = imageops::resize(
        &source.to_rgba8(),
        source.width() * layout.scale,
        source.height() * layout.scale,
        FilterType::Lanczos3,
    );
    for (x, y, px) in up.enumerate_pixels() {
        let a = f32::from(px[3]) / 255.0;
        let blend = |c: u8| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let v = f32::from(c).mul_add(a, 255.0 * (1.0 - a)) as u8;
            v
        };
        canvas.put_pixel(
            x + layout.ox,
            y + layout.oy,
            Rgba([blend(px[0]), blend(px[1]), blend(px[2]), 255]),
        );
    }
}

/// Round the corners of a canvas mask before outlining it.
fn preview_smooth(mask: &Mask) -> Mask {
    let kernel = odd_kernel((mask.width().min(mask.height()) / 35).max(11));
    smooth_mask(mask, kernel)
}

/// Build the cutting body with a rounded ring tab, and the hole itself.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
fn ring_tab(
    cutting: &Mask,
    hole_x: i32,
    hole_y: i32,
    radius_px: u32,
    result: &CuttingLineResult,
    layout: &Layout,
) -> (Mask, Mask) {
    let (hx, hy) = layout.point(hole_x, hole_y);
    let hole_r = (radius_px * layout.scale) as i32;
    let margin = ((TAB_MARGIN_MM * layout.px_per_mm) as i32).max(MIN_TAB_MARGIN_PX);
    let tab_r = hole_r + margin;

    let mut tab = GrayImage::new(layout.width, layout.height);
    draw_filled_circle_mut(&mut tab, (hx, hy), tab_r, Luma([FOREGROUND]));

    // Bridge as wide as the tab, reaching well into the body.
    if let Some(bbox) = result
        .cutting
        .contour
        .transformed(layout.scale as i32, layout.ox as i32, layout.oy as i32)
        .bounding_box()
    {
        let position = result.options.attachment_position;
        let extent = if position.is_vertical() {
            bbox.height
        } else {
            bbox.width
        };
        let overlap = (extent / 4).max(tab_r * 2);
        let (x0, y0, x1, y1) = match position {
            AttachmentPosition::Top => (hx - tab_r, hy, hx + tab_r, bbox.y + overlap),
            AttachmentPosition::Bottom => (hx - tab_r, bbox.bottom() - overlap, hx + tab_r, hy),
            AttachmentPosition::Left => (hx, hy - tab_r, bbox.x + overlap, hy + tab_r),
            AttachmentPosition::Right => (bbox.right() - overlap, hy - tab_r, hx, hy + tab_r),
        };
        fill_rect(&mut tab, x0, y0, x1, y1);
    }

    let soft = odd_kernel(((f64::from(tab_r) * 0.4) as u32).max(5));
    let tab = smooth_mask(&Mask::from_binary(tab), soft);
    let combined = close_disk(&cutting.union(&tab), f64::from(tab_r) * 0.35);
    let body = smooth_mask(&combined, soft);

    let mut body = body.into_image();
    draw_filled_circle_mut(&mut body, (hx, hy), hole_r, Luma([BACKGROUND]));
    let mut hole = GrayImage::new(layout.width, layout.height);
    draw_filled_circle_mut(&mut hole, (hx, hy), hole_r, Luma([FOREGROUND]));
    (Mask::from_binary(body), Mask::from_binary(hole))
}

/// Fill the inclusive rectangle between two corners, in any order.
#[allow(clippy::cast_sign_loss)]
fn fill_rect(raster: &mut GrayImage, x0: i32, y0: i32, x1: i32, y1: i32) {
    let (left, right) = (x0.min(x1), x0.max(x1));
    let (top, bottom) = (y0.min(y1), y0.max(y1));
    let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
    draw_filled_rect_mut(raster, rect, Luma([FOREGROUND]));
}

#[allow(clippy::cast_possible_wrap)]
const fn half_scaled(px: u32, scale: u32) -> i32 {
    (px * scale / 2) as i32
}

/// Set every foreground pixel of `mask` to `color`.
fn paint(canvas: &mut RgbaImage, mask: &Mask, color: Rgba<u8>) {
    for (x, y, px) in mask.as_image().enumerate_pixels() {
        if px[0] != BACKGROUND {
            canvas.put_pixel(x, y, color);
        }
    }
}

/// Centre the size label in the bottom padding.
#[allow(clippy::cast_possible_wrap)]
fn draw_size_label(canvas: &mut RgbaImage, size: PhysicalSize, layout: &Layout, color: Rgba<u8>) {
    let text = label::size_label(size.width_mm, size.height_mm);
    let font_px = (layout.width.min(layout.height) / 18).max(18);
    let scale = (font_px / label::GLYPH_HEIGHT).max(2);
    let tw = label::text_width(&text, scale);
    let th = label::text_height(scale);
    let x = (layout.width as i32 - tw as i32) / 2;
    let y = layout.height as i32 - (layout.base_pad / 2) as i32 - (th / 2) as i32;
    label::draw_text(canvas, &text, x, y, scale, color);
}
