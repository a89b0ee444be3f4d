//! Glyph rasterisation for invoice text.
//!
//! Two faces are supported:
//!
//! * [`Typeface::Builtin`] — the 8×8 bitmap glyphs from `font8x8`, scaled so
//!   one glyph cell is `size × size` layout units. Needs no font file.
//! * [`Typeface::TrueType`] — any TTF/OTF loaded at start-up via `rusttype`,
//!   anti-aliased with per-pixel coverage.
//!
//! Sizes passed to [`Typeface::measure`] are in layout units; sizes and
//! positions passed to [`Typeface::draw`] are in raster pixels.

use crate::error::InvoiceError;
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

// Slack for float error when a line was sized to fill its width exactly.
const WRAP_TOLERANCE: f32 = 1e-3;

/// A face able to measure and draw a single line of text.
#[derive(Clone, Default)]
pub enum Typeface {
    #[default]
    Builtin,
    TrueType(Font<'static>),
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Typeface::Builtin => f.write_str("Typeface::Builtin"),
            Typeface::TrueType(_) => f.write_str("Typeface::TrueType(..)"),
        }
    }
}

impl Typeface {
    /// Load a TrueType/OpenType face from raw font bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, InvoiceError> {
        Font::try_from_vec(bytes)
            .map(Typeface::TrueType)
            .ok_or_else(|| {
                InvoiceError::InvalidConfig("font file is not a valid TrueType/OpenType font".into())
            })
    }

    /// Advance width of `text` at `size`, in the same unit as `size`.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match self {
            Typeface::Builtin => text.chars().count() as f32 * size,
            Typeface::TrueType(font) => font
                .layout(text, Scale::uniform(size), point(0.0, 0.0))
                .last()
                .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                .unwrap_or(0.0),
        }
    }

    /// Break `text` into lines no wider than `max_width` at `size`.
    ///
    /// Lines break at whitespace; a word wider than `max_width` on its own is
    /// split between characters. Whitespace runs collapse to one space. At
    /// least one line is always returned.
    pub fn wrap(&self, text: &str, size: f32, max_width: f32) -> Vec<String> {
        let fits = |line: &str| self.measure(line, size) <= max_width + WRAP_TOLERANCE;
        let mut lines = Vec::new();
        let mut line = String::new();

        for word in text.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if fits(&candidate) {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            for c in word.chars() {
                line.push(c);
                if !fits(&line) && line.chars().count() > 1 {
                    line.pop();
                    lines.push(std::mem::take(&mut line));
                    line.push(c);
                }
            }
        }
        if !line.is_empty() || lines.is_empty() {
            lines.push(line);
        }
        lines
    }

    /// Draw `text` with its top-left corner at `(x, y)` pixels.
    ///
    /// Pixels outside the canvas are clipped.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        color: Rgba<u8>,
        bold: bool,
    ) {
        match self {
            Typeface::Builtin => draw_bitmap(canvas, text, x, y, size, color, bold),
            Typeface::TrueType(font) => draw_outline(font, canvas, text, x, y, size, color, bold),
        }
    }
}

fn glyph_bits(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn draw_bitmap(
    canvas: &mut RgbaImage,
    text: &str,
    x: f32,
    y: f32,
    size: f32,
    color: Rgba<u8>,
    bold: bool,
) {
    let cell = size / 8.0;
    // Bold widens every lit cell to the right instead of double-striking.
    let extra = if bold { (cell * 0.6).max(1.0) } else { 0.0 };

    for (i, c) in text.chars().enumerate() {
        let gx = x + i as f32 * size;
        for (row, bits) in glyph_bits(c).iter().enumerate() {
            for col in 0..8u32 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let x0 = gx + col as f32 * cell;
                let y0 = y + row as f32 * cell;
                fill_rect(canvas, x0, y0, x0 + cell + extra, y0 + cell, color);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_outline(
    font: &Font<'static>,
    canvas: &mut RgbaImage,
    text: &str,
    x: f32,
    y: f32,
    size: f32,
    color: Rgba<u8>,
    bold: bool,
) {
    let scale = Scale::uniform(size);
    let ascent = font.v_metrics(scale).ascent;
    let strikes: &[f32] = if bold { &[0.0, size / 24.0] } else { &[0.0] };

    for dx in strikes {
        for glyph in font.layout(text, scale, point(x + dx, y + ascent)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                blend_pixel(canvas, px, py, color, coverage);
            });
        }
    }
}

/// Fill the half-open pixel rectangle `[x0, x1) × [y0, y1)`, rounding edges.
pub(crate) fn fill_rect(canvas: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    let cx0 = x0.round().max(0.0) as u32;
    let cy0 = y0.round().max(0.0) as u32;
    let cx1 = (x1.round().max(0.0) as u32).min(w);
    let cy1 = (y1.round().max(0.0) as u32).min(h);
    for py in cy0..cy1 {
        for px in cx0..cx1 {
            canvas.put_pixel(px, py, color);
        }
    }
}

fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let a = coverage.clamp(0.0, 1.0);
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    for ch in 0..3 {
        let mixed = dst[ch] as f32 * (1.0 - a) + color[ch] as f32 * a;
        dst[ch] = mixed.round() as u8;
    }
    dst[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn builtin_measure_is_monospace() {
        let face = Typeface::Builtin;
        assert_eq!(face.measure("INVOICE", 32.0), 224.0);
        assert_eq!(face.measure("", 16.0), 0.0);
        assert_eq!(face.measure("é", 10.0), 10.0);
    }

    #[test]
    fn wrap_breaks_at_spaces() {
        let lines = Typeface::Builtin.wrap("Acme Corporation International", 10.0, 150.0);
        assert_eq!(lines, vec!["Acme", "Corporation", "International"]);
        let lines = Typeface::Builtin.wrap("Acme Co Ltd", 10.0, 100.0);
        assert_eq!(lines, vec!["Acme Co", "Ltd"]);
    }

    #[test]
    fn wrap_splits_overlong_words() {
        let lines = Typeface::Builtin.wrap("$100000.00", 10.0, 40.0);
        assert_eq!(lines, vec!["$100", "000.", "00"]);
        assert_eq!(lines.concat(), "$100000.00");
    }

    #[test]
    fn wrap_keeps_short_text_and_blank_input() {
        assert_eq!(Typeface::Builtin.wrap("  Acme   Co ", 16.0, 400.0), vec!["Acme Co"]);
        assert_eq!(Typeface::Builtin.wrap("", 16.0, 400.0), vec![String::new()]);
        // A single glyph wider than the line still gets its own line.
        assert_eq!(Typeface::Builtin.wrap("WW", 16.0, 8.0), vec!["W", "W"]);
    }

    #[test]
    fn builtin_draw_marks_pixels_inside_cell() {
        let face = Typeface::Builtin;
        let mut canvas = RgbaImage::from_pixel(40, 20, WHITE);
        face.draw(&mut canvas, "A", 4.0, 4.0, 16.0, BLACK, false);

        let dark: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!dark.is_empty());
        assert!(dark.iter().all(|&(x, y)| (4..20).contains(&x) && (4..20).contains(&y)));
    }

    #[test]
    fn space_draws_nothing() {
        let mut canvas = RgbaImage::from_pixel(20, 20, WHITE);
        Typeface::Builtin.draw(&mut canvas, " ", 0.0, 0.0, 16.0, BLACK, true);
        assert!(canvas.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let mut canvas = RgbaImage::from_pixel(10, 10, WHITE);
        Typeface::Builtin.draw(&mut canvas, "WWWW", -20.0, 5.0, 16.0, BLACK, false);
        // No panic; some pixels may be drawn along the visible edge.
        assert_eq!(canvas.dimensions(), (10, 10));
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let err = Typeface::from_bytes(b"not a font".to_vec()).unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidConfig(_)));
    }

    #[test]
    fn fill_rect_clamps_to_canvas() {
        let mut canvas = RgbaImage::from_pixel(4, 4, WHITE);
        fill_rect(&mut canvas, -2.0, -2.0, 2.0, 10.0, BLACK);
        assert_eq!(canvas.get_pixel(0, 3), &BLACK);
        assert_eq!(canvas.get_pixel(1, 0), &BLACK);
        assert_eq!(canvas.get_pixel(2, 0), &WHITE);
    }
}
