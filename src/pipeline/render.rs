//! Rasterisation and pagination: [`RenderedDocument`] → [`RasterPage`]s.
//!
//! The whole invoice is drawn once onto a tall off-screen canvas (the
//! staging surface) at `scale` pixels per layout unit, then cut into
//! fixed-height pages. Only vertical offsets differ between pages; every page
//! has the full raster width.
//!
//! ## Page arithmetic
//!
//! All pagination maths is done in physical page units (the unit of
//! `page_width` / `page_height`, millimetres in practice):
//!
//! ```text
//! scaled_height = raster_height × page_width / raster_width
//! remaining     = scaled_height − page_height
//! while remaining >= 0:           (OverflowRule::Inclusive, default)
//!     emit page at offset scaled_height − remaining
//!     remaining −= page_height
//! ```
//!
//! Page 0 is always emitted, so content shorter than one page yields
//! exactly one page. The count is `ceil(scaled_height / page_height)`
//! except when the content ends exactly on a page boundary, where the
//! default rule adds one blank trailing page. [`OverflowRule::Exclusive`]
//! (`remaining > 0`) drops it.
//!
//! ## Staging surface lifetime
//!
//! A [`StagingSurface`] is created per export and never shared or pooled.
//! It is released by `Drop`, so every exit path (success, decode failure,
//! panic unwinding out of `spawn_blocking`) frees it. [`Paginator`] counts
//! live surfaces so hosts and tests can check nothing leaks.

use crate::config::OverflowRule;
use crate::error::{InvoiceError, Result};
use crate::observer::{NoopObserver, SharedObserver};
use crate::pipeline::compose::{Element, RenderedDocument, BACKGROUND};
use crate::pipeline::typeface::fill_rect;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Longest raster edge accepted, in pixels.
pub const MAX_RASTER_EDGE: u32 = 32_768;

/// Relative tolerance used when comparing page arithmetic to zero.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// One page cut from the tall raster.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 0-based position in the document.
    pub index: usize,
    /// Distance from the document top to the page top, in page units.
    pub offset: f64,
    /// Page pixels; rows below the end of the content are background.
    pub image: RgbaImage,
}

impl RasterPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Off-screen canvas holding the full-height raster of one document.
pub struct StagingSurface {
    canvas: RgbaImage,
    live: Arc<AtomicUsize>,
}

impl StagingSurface {
    fn new(width: u32, height: u32, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            canvas: RgbaImage::from_pixel(width, height, BACKGROUND),
            live,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// Take the raster out, releasing the surface.
    pub fn into_image(mut self) -> RgbaImage {
        std::mem::take(&mut self.canvas)
    }
}

impl Drop for StagingSurface {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!("Released staging surface");
    }
}

/// Rasterises composed documents and slices them into pages.
#[derive(Clone)]
pub struct Paginator {
    live: Arc<AtomicUsize>,
    overflow: OverflowRule,
    observer: SharedObserver,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(OverflowRule::default())
    }
}

impl Paginator {
    pub fn new(overflow: OverflowRule) -> Self {
        Self {
            live: Arc::new(AtomicUsize::new(0)),
            overflow,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Number of staging surfaces currently alive.
    pub fn live_surfaces(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Draw `doc` onto a fresh staging surface at `scale` pixels per unit.
    pub fn rasterize(&self, doc: &RenderedDocument, scale: f32) -> Result<StagingSurface> {
        let fail = |detail: String| InvoiceError::RenderFailure {
            record: doc.record_id.clone(),
            detail,
        };

        if !scale.is_finite() || scale <= 0.0 {
            return Err(fail(format!("scale must be positive, got {scale}")));
        }
        let width = (doc.width * scale).round();
        let height = (doc.height * scale).ceil();
        if !(1.0..=MAX_RASTER_EDGE as f32).contains(&width)
            || !(1.0..=MAX_RASTER_EDGE as f32).contains(&height)
        {
            return Err(fail(format!(
                "raster size {width}x{height} outside 1..={MAX_RASTER_EDGE} px"
            )));
        }

        let mut surface = StagingSurface::new(width as u32, height as u32, Arc::clone(&self.live));
        for element in &doc.elements {
            draw_element(&mut surface.canvas, doc, element, scale).map_err(fail)?;
        }

        let (w, h) = surface.dimensions();
        debug!("Rasterised {} → {}x{} px", doc.record_id, w, h);
        self.observer.on_rasterized(&doc.record_id, w, h);
        Ok(surface)
    }

    /// Rasterise `doc` and cut it into pages of `page_width × page_height`.
    ///
    /// The staging surface is released before this returns, on success and
    /// on error alike.
    pub fn paginate(
        &self,
        doc: &RenderedDocument,
        page_width: f64,
        page_height: f64,
        scale: f32,
    ) -> Result<Vec<RasterPage>> {
        if !(page_width.is_finite() && page_width > 0.0 && page_height.is_finite() && page_height > 0.0)
        {
            return Err(InvoiceError::RenderFailure {
                record: doc.record_id.clone(),
                detail: format!("page size {page_width}x{page_height} must be positive"),
            });
        }

        let surface = self.rasterize(doc, scale)?;
        let raster = surface.image();
        let (iw, ih) = raster.dimensions();

        let scaled_height = ih as f64 * page_width / iw as f64;
        let offsets = page_offsets(scaled_height, page_height, self.overflow);
        let px_per_unit = iw as f64 / page_width;
        let page_px = ((page_height * px_per_unit) - 1e-6).ceil().max(1.0) as u32;

        let mut pages = Vec::with_capacity(offsets.len());
        for (index, offset) in offsets.into_iter().enumerate() {
            let top = (offset * px_per_unit).round() as u32;
            let mut image = RgbaImage::from_pixel(iw, page_px, BACKGROUND);
            if top < ih {
                let rows = page_px.min(ih - top);
                let slice = imageops::crop_imm(raster, 0, top, iw, rows).to_image();
                imageops::replace(&mut image, &slice, 0, 0);
            }
            self.observer.on_page_emitted(&doc.record_id, index, offset);
            pages.push(RasterPage {
                index,
                offset,
                image,
            });
        }

        info!(
            "Paginated {}: {} page(s), content height {:.1} of {:.1} per page",
            doc.record_id,
            pages.len(),
            scaled_height,
            page_height
        );
        Ok(pages)
    }
}

/// Rasterise and paginate with a throwaway [`Paginator`] using the default
/// overflow rule.
pub fn paginate(
    doc: &RenderedDocument,
    page_width: f64,
    page_height: f64,
    scale: f32,
) -> Result<Vec<RasterPage>> {
    Paginator::default().paginate(doc, page_width, page_height, scale)
}

/// Page top offsets for content `scaled_height` tall, in page units.
///
/// Always contains at least the first page at offset 0.
pub fn page_offsets(scaled_height: f64, page_height: f64, rule: OverflowRule) -> Vec<f64> {
    let eps = page_height * BOUNDARY_EPSILON;
    let mut offsets = vec![0.0];
    let mut remaining = scaled_height - page_height;
    loop {
        let more = match rule {
            OverflowRule::Exclusive => remaining > eps,
            OverflowRule::Inclusive => remaining >= -eps,
        };
        if !more {
            break;
        }
        offsets.push(offsets.len() as f64 * page_height);
        remaining -= page_height;
    }
    offsets
}

fn draw_element(
    canvas: &mut RgbaImage,
    doc: &RenderedDocument,
    element: &Element,
    scale: f32,
) -> std::result::Result<(), String> {
    match element {
        Element::Text {
            x,
            y,
            size,
            bold,
            color,
            text,
        } => doc
            .typeface
            .draw(canvas, text, x * scale, y * scale, size * scale, *color, *bold),
        Element::Rule {
            x,
            y,
            width,
            thickness,
            color,
        } => fill_rect(
            canvas,
            x * scale,
            y * scale,
            (x + width) * scale,
            (y + thickness) * scale,
            *color,
        ),
        Element::Fill {
            x,
            y,
            width,
            height,
            color,
        } => fill_rect(
            canvas,
            x * scale,
            y * scale,
            (x + width) * scale,
            (y + height) * scale,
            *color,
        ),
        Element::Branding {
            x,
            y,
            max_width,
            max_height,
        } => {
            let Some(bytes) = doc.branding.as_deref() else {
                return Ok(());
            };
            let logo = image::load_from_memory(bytes)
                .map_err(|e| format!("branding image could not be decoded: {e}"))?
                .to_rgba8();
            let (lw, lh) = logo.dimensions();
            let fit = (max_width / lw as f32).min(max_height / lh as f32).min(1.0);
            let tw = ((lw as f32 * fit * scale).round() as u32).max(1);
            let th = ((lh as f32 * fit * scale).round() as u32).max(1);
            let resized = imageops::resize(&logo, tw, th, FilterType::Triangle);
            imageops::overlay(
                canvas,
                &resized,
                (x * scale).round() as i64,
                (y * scale).round() as i64,
            );
        }
    }
    Ok(())
}
