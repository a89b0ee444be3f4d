//! Invoice composition: [`NormalizedRecord`] → [`RenderedDocument`].
//!
//! The invoice is laid out as a display list on an 800-unit-wide block (one
//! layout unit is one raster pixel at scale 1). Text widths are measured with
//! the same [`Typeface`] the rasteriser later draws with, so right-aligned
//! columns line up exactly.
//!
//! Layout, top to bottom:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ [logo]                                       │
//! │ INVOICE                       Invoice Date   │
//! │                              January 1, 2024 │
//! │──────────────────────────────────────────────│
//! │ BILL TO              INVOICE #               │
//! │ Acme Co              INV-1A2B3C4D            │
//! │ DESCRIPTION          DATE          AMOUNT    │
//! │ Acme Co              1/1/2024       $0.00    │
//! │                          Total      $0.00    │
//! │          Thank you for your business!        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Text never crosses into a neighbouring column. Names and raw dates wrap
//! inside their column and push later rows down; amounts first shrink to fit
//! their cell (not below 8 units) and only then wrap.
//!
//! Composition never decodes the branding image; it only reserves its slot.
//! Bad image bytes surface as a render failure in the rasteriser.

use crate::model::NormalizedRecord;
use crate::pipeline::typeface::Typeface;
use chrono::{DateTime, NaiveDate, Utc};
use image::Rgba;
use std::sync::Arc;

/// Width of the composed block in layout units.
pub const LAYOUT_WIDTH: f32 = 800.0;
const PADDING: f32 = 40.0;
const CONTENT_LEFT: f32 = PADDING;
const CONTENT_RIGHT: f32 = LAYOUT_WIDTH - PADDING;
const BRANDING_MAX_HEIGHT: f32 = 60.0;
const BRANDING_MAX_WIDTH: f32 = 360.0;
const TOTAL_BOX_WIDTH: f32 = 300.0;
const COLUMN_GAP: f32 = 40.0;
const CELL_PADDING: f32 = 16.0;
// Edges (before cell padding) of the date column in the item table.
const DATE_COLUMN_LEFT: f32 = 400.0;
const DATE_COLUMN_RIGHT: f32 = 600.0;
/// Baseline-to-baseline distance of wrapped lines, as a multiple of size.
const LINE_SPACING: f32 = 1.375;
/// Amounts shrink to fit their cell down to this size, then wrap.
const MIN_TEXT_SIZE: f32 = 8.0;

pub const INK: Rgba<u8> = Rgba([17, 24, 39, 255]);
pub const MUTED: Rgba<u8> = Rgba([107, 114, 128, 255]);
pub const BORDER: Rgba<u8> = Rgba([229, 231, 235, 255]);
pub const HEADER_FILL: Rgba<u8> = Rgba([249, 250, 251, 255]);
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// One primitive of the display list. Coordinates are layout units with the
/// origin at the top-left of the block; `y` is the top edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        color: Rgba<u8>,
        text: String,
    },
    /// Horizontal rule.
    Rule {
        x: f32,
        y: f32,
        width: f32,
        thickness: f32,
        color: Rgba<u8>,
    },
    Fill {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgba<u8>,
    },
    /// Slot for the branding image, fitted inside the box keeping aspect ratio.
    Branding {
        x: f32,
        y: f32,
        max_width: f32,
        max_height: f32,
    },
}

/// The composed invoice, ready for rasterisation.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub record_id: String,
    pub width: f32,
    pub height: f32,
    pub elements: Vec<Element>,
    /// Caller-supplied image bytes, not yet decoded.
    pub branding: Option<Arc<Vec<u8>>>,
    pub generated_at: DateTime<Utc>,
    pub typeface: Arc<Typeface>,
}

impl RenderedDocument {
    /// All text runs in display order, for inspection and tests.
    pub fn texts(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Presentation choices for the composer.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub typeface: Arc<Typeface>,
    pub currency_symbol: String,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            typeface: Arc::new(Typeface::Builtin),
            currency_symbol: "$".to_string(),
        }
    }
}

/// Compose an invoice with the built-in face, stamped with the current time.
pub fn compose(record: &NormalizedRecord, branding: Option<&[u8]>) -> RenderedDocument {
    compose_at(
        record,
        branding.map(|b| Arc::new(b.to_vec())),
        Utc::now(),
        &ComposeOptions::default(),
    )
}

/// Compose an invoice at an explicit generation time.
pub fn compose_at(
    record: &NormalizedRecord,
    branding: Option<Arc<Vec<u8>>>,
    generated_at: DateTime<Utc>,
    options: &ComposeOptions,
) -> RenderedDocument {
    let mut b = Builder {
        face: &options.typeface,
        elements: Vec::new(),
    };
    let record_date = record.date.as_deref().and_then(parse_record_date);
    let issued_on = record_date.unwrap_or_else(|| generated_at.date_naive());
    let amount = format_amount(record.amount, &options.currency_symbol);

    // ── Header ───────────────────────────────────────────────────────────
    let top = PADDING;
    let mut title_y = top;
    if branding.is_some() {
        b.elements.push(Element::Branding {
            x: CONTENT_LEFT,
            y: top,
            max_width: BRANDING_MAX_WIDTH,
            max_height: BRANDING_MAX_HEIGHT,
        });
        title_y += BRANDING_MAX_HEIGHT + 20.0;
    }
    b.text(CONTENT_LEFT, title_y, 32.0, true, INK, "INVOICE");
    b.text_right(CONTENT_RIGHT, top, 14.0, false, MUTED, "Invoice Date");
    b.text_right(CONTENT_RIGHT, top + 18.0, 16.0, true, INK, &long_date(issued_on));

    let header_bottom = (title_y + 32.0).max(top + 34.0) + 30.0;
    b.rule(CONTENT_LEFT, header_bottom, CONTENT_RIGHT - CONTENT_LEFT, 2.0, BORDER);

    // ── Bill to / invoice number ─────────────────────────────────────────
    let y = header_bottom + 2.0 + 40.0;
    let second_column = CONTENT_LEFT + (CONTENT_RIGHT - CONTENT_LEFT - COLUMN_GAP) / 2.0 + COLUMN_GAP;
    let name = record.name.as_deref().unwrap_or("Client Name");
    b.text(CONTENT_LEFT, y, 12.0, true, MUTED, "BILL TO");
    let name_height = b.paragraph(
        CONTENT_LEFT,
        y + 20.0,
        second_column - COLUMN_GAP - CONTENT_LEFT,
        16.0,
        false,
        INK,
        name,
    );
    b.text(second_column, y, 12.0, true, MUTED, "INVOICE #");
    let number_height = b.paragraph(
        second_column,
        y + 20.0,
        CONTENT_RIGHT - second_column,
        16.0,
        false,
        INK,
        &record.reference_number(),
    );

    // ── Item table ───────────────────────────────────────────────────────
    let y = y + 20.0 + name_height.max(number_height) + 30.0 + 40.0;
    let head_height = 36.0;
    b.elements.push(Element::Fill {
        x: CONTENT_LEFT,
        y,
        width: CONTENT_RIGHT - CONTENT_LEFT,
        height: head_height,
        color: HEADER_FILL,
    });
    b.text(CONTENT_LEFT + 12.0, y + 12.0, 12.0, true, MUTED, "DESCRIPTION");
    b.text_right(DATE_COLUMN_RIGHT - 12.0, y + 12.0, 12.0, true, MUTED, "DATE");
    b.text_right(CONTENT_RIGHT - 12.0, y + 12.0, 12.0, true, MUTED, "AMOUNT");
    b.rule(CONTENT_LEFT, y + head_height, CONTENT_RIGHT - CONTENT_LEFT, 2.0, BORDER);

    let row = y + head_height + 2.0;
    let item_date = match (&record.date, record_date) {
        (_, Some(d)) => short_date(d),
        (Some(raw), None) => raw.clone(),
        (None, None) => "N/A".to_string(),
    };
    let cell_top = row + CELL_PADDING;
    let description_height = b.paragraph(
        CONTENT_LEFT + CELL_PADDING,
        cell_top,
        DATE_COLUMN_LEFT - CONTENT_LEFT - 2.0 * CELL_PADDING,
        16.0,
        false,
        INK,
        record.name.as_deref().unwrap_or("Service"),
    );
    let date_height = b.paragraph_right(
        DATE_COLUMN_RIGHT - CELL_PADDING,
        cell_top,
        DATE_COLUMN_RIGHT - DATE_COLUMN_LEFT - 2.0 * CELL_PADDING,
        16.0,
        false,
        MUTED,
        &item_date,
    );
    let amount_width = CONTENT_RIGHT - DATE_COLUMN_RIGHT - 2.0 * CELL_PADDING;
    let amount_size = b.fitted_size(&amount, 16.0, amount_width);
    let amount_height = b.paragraph_right(
        CONTENT_RIGHT - CELL_PADDING,
        cell_top,
        amount_width,
        amount_size,
        true,
        INK,
        &amount,
    );
    let row_height = CELL_PADDING
        + description_height.max(date_height).max(amount_height).max(16.0)
        + CELL_PADDING;
    b.rule(CONTENT_LEFT, row + row_height, CONTENT_RIGHT - CONTENT_LEFT, 1.0, BORDER);

    // ── Total ────────────────────────────────────────────────────────────
    let y = row + row_height + 1.0 + 40.0;
    let box_left = CONTENT_RIGHT - TOTAL_BOX_WIDTH;
    b.rule(box_left, y, TOTAL_BOX_WIDTH, 2.0, BORDER);
    b.text(box_left, y + 2.0 + 19.0, 18.0, true, INK, "Total");
    let total_width = TOTAL_BOX_WIDTH - b.face.measure("Total", 18.0) - CELL_PADDING;
    let total_size = b.fitted_size(&amount, 24.0, total_width);
    let total_height = b.paragraph_right(
        CONTENT_RIGHT,
        y + 2.0 + 16.0,
        total_width,
        total_size,
        true,
        INK,
        &amount,
    );
    let y = y + 2.0 + 16.0 + total_height.max(24.0) + 16.0;
    b.rule(box_left, y, TOTAL_BOX_WIDTH, 2.0, BORDER);

    // ── Footer ───────────────────────────────────────────────────────────
    let y = y + 2.0 + 40.0 + 60.0;
    b.rule(CONTENT_LEFT, y, CONTENT_RIGHT - CONTENT_LEFT, 1.0, BORDER);
    b.text_centered(y + 1.0 + 30.0, 14.0, MUTED, "Thank you for your business!");
    let height = y + 1.0 + 30.0 + 14.0 + PADDING;

    RenderedDocument {
        record_id: record.id.clone(),
        width: LAYOUT_WIDTH,
        height,
        elements: b.elements,
        branding,
        generated_at,
        typeface: Arc::clone(&options.typeface),
    }
}

struct Builder<'a> {
    face: &'a Typeface,
    elements: Vec<Element>,
}

impl Builder<'_> {
    fn text(&mut self, x: f32, y: f32, size: f32, bold: bool, color: Rgba<u8>, text: &str) {
        self.elements.push(Element::Text {
            x,
            y,
            size,
            bold,
            color,
            text: text.to_string(),
        });
    }

    fn text_right(&mut self, right: f32, y: f32, size: f32, bold: bool, color: Rgba<u8>, text: &str) {
        let x = right - self.face.measure(text, size);
        self.text(x, y, size, bold, color, text);
    }

    /// Wrap `text` into `width` starting at `x`. Returns the height used.
    #[allow(clippy::too_many_arguments)]
    fn paragraph(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        size: f32,
        bold: bool,
        color: Rgba<u8>,
        text: &str,
    ) -> f32 {
        let lines = self.face.wrap(text, size, width);
        for (i, line) in lines.iter().enumerate() {
            self.text(x, y + i as f32 * size * LINE_SPACING, size, bold, color, line);
        }
        block_height(lines.len(), size)
    }

    /// Like [`Builder::paragraph`], with every line ending at `right`.
    #[allow(clippy::too_many_arguments)]
    fn paragraph_right(
        &mut self,
        right: f32,
        y: f32,
        width: f32,
        size: f32,
        bold: bool,
        color: Rgba<u8>,
        text: &str,
    ) -> f32 {
        let lines = self.face.wrap(text, size, width);
        for (i, line) in lines.iter().enumerate() {
            self.text_right(right, y + i as f32 * size * LINE_SPACING, size, bold, color, line);
        }
        block_height(lines.len(), size)
    }

    /// Largest size up to `size` at which `text` fits on one line of `width`.
    fn fitted_size(&self, text: &str, size: f32, width: f32) -> f32 {
        let measured = self.face.measure(text, size);
        if measured <= width {
            size
        } else {
            (size * width / measured).max(MIN_TEXT_SIZE)
        }
    }

    fn text_centered(&mut self, y: f32, size: f32, color: Rgba<u8>, text: &str) {
        let x = (LAYOUT_WIDTH - self.face.measure(text, size)) / 2.0;
        self.text(x, y, size, false, color, text);
    }

    fn rule(&mut self, x: f32, y: f32, width: f32, thickness: f32, color: Rgba<u8>) {
        self.elements.push(Element::Rule {
            x,
            y,
            width,
            thickness,
            color,
        });
    }
}

fn block_height(lines: usize, size: f32) -> f32 {
    lines.saturating_sub(1) as f32 * size * LINE_SPACING + size
}

/// Format an amount with two decimals.
///
/// `None` (and non-finite values) render as zero. This is a presentation
/// default only; the record keeps `None`.
pub fn format_amount(amount: Option<f64>, currency_symbol: &str) -> String {
    let value = amount.filter(|v| v.is_finite()).unwrap_or(0.0);
    let cents = (value * 100.0).round();
    let sign = if cents < 0.0 { "-" } else { "" };
    format!("{sign}{currency_symbol}{:.2}", cents.abs() / 100.0)
}

/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps (Notion sends both).
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// "January 1, 2024"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// "1/1/2024"
pub fn short_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}
