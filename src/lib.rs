//! # notion-invoice
//!
//! Turn Notion database records into paginated PDF invoices.
//!
//! Each record's typed properties are flattened into a [`NormalizedRecord`],
//! laid out as a fixed-width invoice, rasterised once onto an off-screen
//! surface and sliced into fixed-height pages. The pages are packed into a
//! PDF, one full-bleed image per page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Notion JSON
//!  │
//!  ├─ 1. Normalize  typed properties → flat record (null ≠ 0)
//!  ├─ 2. Compose    record → 800-unit display list (+ branding slot)
//!  ├─ 3. Render     display list → tall raster → fixed-height pages
//!  ├─ 4. Assemble   pages + "invoice-<slug>-<millis>.pdf"
//!  └─ 5. Encode     lopdf, one JPEG per page
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notion_invoice::{export_to_dir, parse_pages, ExportConfig, PageSize};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let json = std::fs::read_to_string("records.json")?;
//!     let pages = parse_pages(&json)?;
//!     let config = ExportConfig::builder()
//!         .page_size(PageSize::Letter)
//!         .branding("logo.png")
//!         .build()?;
//!     let report = export_to_dir(&pages, "out", &config).await?;
//!     for done in &report.exported {
//!         println!("{} → {} ({} pages)", done.record_id, done.file_name, done.page_count);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! notion-invoice = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod observer;
pub mod pipeline;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, OverflowRule, PageSize};
pub use error::{InvoiceError, GENERIC_FAILURE_MESSAGE};
pub use export::{
    export_all, export_record, export_record_sync, export_record_with, export_to_dir, summarize,
    ExportAssets, ExportReport, ExportedRecord, FailedRecord, RecordSummary,
};
pub use model::{parse_pages, pages_from_value, NormalizedRecord, RawPage, RawProperty};
pub use observer::{ExportObserver, NoopObserver, SharedObserver};
pub use pipeline::assemble::{assemble, PagedArtifact};
pub use pipeline::compose::{compose, RenderedDocument};
pub use pipeline::normalize::{normalize, normalize_value};
pub use pipeline::render::{paginate, Paginator, RasterPage};
pub use sink::{ArtifactSink, DirectorySink, MemorySink};
