//! Built-in 5x7 bitmap font for the size label.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

/// Glyph width in font pixels.
pub const GLYPH_WIDTH: u32 = 5;
/// Glyph height in font pixels.
pub const GLYPH_HEIGHT: u32 = 7;
/// Blank columns between glyphs.
const SPACING: u32 = 1;

/// Rows of a glyph, most significant of the low five bits leftmost.
type Glyph = [u8; 7];

const BLANK: Glyph = [0; 7];

fn glyph(c: char) -> Glyph {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '×' => [0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x00],
        'x' => [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        _ => BLANK,
    }
}

/// Width of `text` rendered at `scale` canvas pixels per font pixel.
#[must_use]
pub fn text_width(text: &str, scale: u32) -> u32 {
    #[allow(clippy::cast_possible_truncation)]
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    (n * (GLYPH_WIDTH + SPACING) - SPACING) * scale
}

/// Height of a line of text at `scale`.
#[must_use]
pub const fn text_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Draw `text` with its top-left corner at `(x, y)`. Characters outside
/// the font render as blanks; pixels outside the canvas are clipped.
#[allow(clippy::cast_possible_wrap)]
pub fn draw_text(canvas: &mut RgbaImage, text: &str, x: i32, y: i32, scale: u32, color: Rgba<u8>) {
    let scale = scale.max(1);
    let step = ((GLYPH_WIDTH + SPACING) * scale) as i32;
    for (i, c) in (0i32..).zip(text.chars()) {
        let left = x + i * step;
        for (row, bits) in (0i32..).zip(glyph(c)) {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) != 0 {
                    let rect = Rect::at(left + (col * scale) as i32, y + row * scale as i32)
                        .of_size(scale, scale);
                    draw_filled_rect_mut(canvas, rect, color);
                }
            }
        }
    }
}

/// `W×Hmm`, with whole millimetres printed without decimals.
#[must_use]
pub fn size_label(width_mm: f64, height_mm: f64) -> String {
    format!("{}×{}mm", format_mm(width_mm), format_mm(height_mm))
}

fn format_mm(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn label_formats_whole_and_fractional_sizes() {
        assert_eq!(size_label(50.0, 30.0), "50×30mm");
        assert_eq!(size_label(42.5, 30.0), "42.5×30mm");
    }

    #[test]
    fn width_accounts_for_spacing() {
        assert_eq!(text_width("", 3), 0);
        assert_eq!(text_width("1", 2), 10);
        assert_eq!(text_width("10", 1), 11);
    }

    #[test]
    fn every_label_character_has_a_glyph() {
        for c in "0123456789.×m".chars() {
            assert_ne!(glyph(c), BLANK, "{c}");
        }
    }

    #[test]
    fn drawing_is_clipped_to_the_canvas() {
        let white = Rgba([255, 255, 255, 255]);
        let red = Rgba([230, 0, 0, 255]);
        let mut canvas = RgbaImage::from_pixel(20, 10, white);
        draw_text(&mut canvas, "8", 1, 1, 1, red);
        // Top bar of the 8 is columns 1..=3 of the glyph.
        assert_eq!(*canvas.get_pixel(2, 1), red);
        assert_eq!(*canvas.get_pixel(1, 1), white);
        draw_text(&mut canvas, "888", 15, 5, 2, red);
        assert_eq!(canvas.dimensions(), (20, 10));
    }
}
