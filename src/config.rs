//! Configuration types for invoice export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. The config is resolved once (the CLI maps flags
//! and `INVOICE2PDF_*` environment variables onto the builder at start-up)
//! and then passed down to every stage; no stage reads the environment.
//!
//! Precedence for every knob, highest first:
//! 1. explicit builder call (CLI flag)
//! 2. environment variable (CLI only, via clap's `env`)
//! 3. the default documented on the field

use crate::error::InvoiceError;
use crate::observer::SharedObserver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for an invoice export.
///
/// # Example
/// ```rust
/// use notion_invoice::{ExportConfig, PageSize};
///
/// let config = ExportConfig::builder()
///     .page_size(PageSize::Letter)
///     .scale(3.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.page_width_mm, 215.9);
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Output page width in millimetres. Default: 210 (A4).
    pub page_width_mm: f64,

    /// Output page height in millimetres. Default: 297 (A4).
    pub page_height_mm: f64,

    /// Raster oversampling factor, pixels per layout unit. Range: 0.5–8. Default: 2.
    ///
    /// The invoice is laid out 800 units wide, so the default produces a
    /// 1600 px wide raster. Higher values sharpen text at the cost of render
    /// time and output size.
    pub scale: f32,

    /// What to do when the content ends exactly on a page boundary.
    /// Default: [`OverflowRule::Inclusive`].
    pub overflow: OverflowRule,

    /// JPEG quality used for page images inside the PDF. Range: 1–100. Default: 92.
    pub jpeg_quality: u8,

    /// TrueType/OpenType font for invoice text. If None, the built-in
    /// bitmap face is used.
    pub font_path: Option<PathBuf>,

    /// Branding image: local path, http(s) URL, or `data:` URI. Default: None.
    pub branding: Option<String>,

    /// Currency symbol prefixed to amounts. Default: "$".
    pub currency_symbol: String,

    /// Download timeout for URL branding images in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Observer receiving pipeline events. Default: None.
    pub observer: Option<SharedObserver>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let (w, h) = PageSize::A4.dimensions_mm();
        Self {
            page_width_mm: w,
            page_height_mm: h,
            scale: 2.0,
            overflow: OverflowRule::default(),
            jpeg_quality: 92,
            font_path: None,
            branding: None,
            currency_symbol: "$".to_string(),
            download_timeout_secs: 30,
            observer: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("page_width_mm", &self.page_width_mm)
            .field("page_height_mm", &self.page_height_mm)
            .field("scale", &self.scale)
            .field("overflow", &self.overflow)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("font_path", &self.font_path)
            .field("branding", &self.branding.as_ref().map(|b| branding_label(b)))
            .field("currency_symbol", &self.currency_symbol)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ExportObserver>"))
            .finish()
    }
}

/// Data URIs can be megabytes long; show only the scheme in debug output.
fn branding_label(source: &str) -> String {
    if source.starts_with("data:") {
        "data:<inline>".to_string()
    } else {
        source.to_string()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        let (w, h) = size.dimensions_mm();
        self.config.page_width_mm = w;
        self.config.page_height_mm = h;
        self
    }

    pub fn page_width_mm(mut self, mm: f64) -> Self {
        self.config.page_width_mm = mm;
        self
    }

    pub fn page_height_mm(mut self, mm: f64) -> Self {
        self.config.page_height_mm = mm;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn overflow(mut self, rule: OverflowRule) -> Self {
        self.config.overflow = rule;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn branding(mut self, source: impl Into<String>) -> Self {
        self.config.branding = Some(source.into());
        self
    }

    pub fn currency_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.config.currency_symbol = symbol.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, InvoiceError> {
        let c = &self.config;
        for (label, v) in [("width", c.page_width_mm), ("height", c.page_height_mm)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(InvoiceError::InvalidConfig(format!(
                    "Page {label} must be a positive number of millimetres, got {v}"
                )));
            }
        }
        if !c.scale.is_finite() || !(0.5..=8.0).contains(&c.scale) {
            return Err(InvoiceError::InvalidConfig(format!(
                "Scale must be 0.5–8, got {}",
                c.scale
            )));
        }
        if c.download_timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Standard output page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm. (default)
    #[default]
    A4,
    /// 8.5 × 11 in.
    Letter,
    /// Arbitrary size in millimetres.
    Custom { width_mm: f64, height_mm: f64 },
}

impl PageSize {
    /// `(width, height)` in millimetres.
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

/// Whether a page is emitted when the leftover height is exactly zero.
///
/// With `remaining` the content height still uncovered after the pages
/// emitted so far, a new page is added while:
///
/// | Rule | Condition | Exact multiple of page height |
/// |------|-----------|-------------------------------|
/// | `Inclusive` | `remaining >= 0` | one blank trailing page (default) |
/// | `Exclusive` | `remaining > 0`  | no trailing page |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowRule {
    Exclusive,
    #[default]
    Inclusive,
}
