//! End-to-end export entry points.
//!
//! One export runs normalise → compose → rasterise/paginate → assemble for a
//! single record. The async API moves composition and rasterisation onto the
//! blocking pool; nothing else suspends. Batches ([`export_all`]) run records
//! one after another and keep going past per-record failures.

use crate::config::ExportConfig;
use crate::error::{InvoiceError, Result};
use crate::model::{NormalizedRecord, RawPage};
use crate::observer::{NoopObserver, SharedObserver};
use crate::pipeline::assemble::{self, PagedArtifact};
use crate::pipeline::compose::{self, ComposeOptions};
use crate::pipeline::input;
use crate::pipeline::normalize;
use crate::pipeline::render::Paginator;
use crate::pipeline::typeface::Typeface;
use crate::sink::{ArtifactSink, DirectorySink};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Resources loaded once and shared by every record of an export.
#[derive(Debug, Clone, Default)]
pub struct ExportAssets {
    /// Raw branding image bytes; decoded at rasterisation time.
    pub branding: Option<Arc<Vec<u8>>>,
    pub typeface: Arc<Typeface>,
}

impl ExportAssets {
    /// Built-in face, no branding.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Resolve the font and branding image named in `config`.
    pub async fn load(config: &ExportConfig) -> Result<Self> {
        let typeface = match &config.font_path {
            Some(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| InvoiceError::InvalidConfig(
                    format!("cannot read font '{}': {e}", path.display()),
                ))?;
                debug!("Loaded font {}", path.display());
                Typeface::from_bytes(bytes)?
            }
            None => Typeface::Builtin,
        };
        let branding = match &config.branding {
            Some(source) => Some(Arc::new(
                input::resolve_branding(source, config.download_timeout_secs).await?,
            )),
            None => None,
        };
        Ok(Self {
            branding,
            typeface: Arc::new(typeface),
        })
    }
}

/// Outcome of one successfully exported record.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedRecord {
    pub record_id: String,
    pub file_name: String,
    pub page_count: usize,
}

/// A record that could not be exported.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRecord {
    pub record_id: String,
    /// Full diagnostic text.
    pub error: String,
}

/// Result of a batch export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub exported: Vec<ExportedRecord>,
    pub failed: Vec<FailedRecord>,
    pub duration_ms: u64,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Export a single page, loading assets from `config` first.
pub async fn export_record(page: &RawPage, config: &ExportConfig) -> Result<PagedArtifact> {
    let assets = ExportAssets::load(config).await?;
    export_record_with(page, &assets, config).await
}

/// Export a single page with pre-loaded assets.
///
/// Composition and rasterisation run inside `spawn_blocking`.
pub async fn export_record_with(
    page: &RawPage,
    assets: &ExportAssets,
    config: &ExportConfig,
) -> Result<PagedArtifact> {
    let observer = observer_of(config);
    observer.on_export_start(&page.id);
    let record = normalize::normalize_with(&page.id, &page.properties, observer.as_ref());

    let assets = assets.clone();
    let cfg = config.clone();
    let obs = Arc::clone(&observer);
    let result = tokio::task::spawn_blocking(move || render_record(&record, &assets, &cfg, obs))
        .await
        .map_err(|e| InvoiceError::Internal(format!("Render task panicked: {}", e)))
        .and_then(|r| r);

    report(&observer, &page.id, result)
}

/// Blocking variant of [`export_record_with`]; runs every stage inline.
pub fn export_record_sync(
    page: &RawPage,
    assets: &ExportAssets,
    config: &ExportConfig,
) -> Result<PagedArtifact> {
    let observer = observer_of(config);
    observer.on_export_start(&page.id);
    let record = normalize::normalize_with(&page.id, &page.properties, observer.as_ref());
    let result = render_record(&record, assets, config, Arc::clone(&observer));
    report(&observer, &page.id, result)
}

/// Export every page in order, handing each artifact to `sink`.
///
/// Asset loading failures abort the batch; per-record failures are collected
/// in the report.
pub async fn export_all(
    pages: &[RawPage],
    config: &ExportConfig,
    sink: &dyn ArtifactSink,
) -> Result<ExportReport> {
    let start = Instant::now();
    let assets = ExportAssets::load(config).await?;
    info!("Exporting {} record(s)", pages.len());

    let mut report = ExportReport::default();
    for page in pages {
        let outcome = match export_record_with(page, &assets, config).await {
            Ok(artifact) => sink.accept(&artifact).map(|_| artifact),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(artifact) => report.exported.push(ExportedRecord {
                record_id: artifact.record_id,
                file_name: artifact.file_name,
                page_count: artifact.pages.len(),
            }),
            Err(e) => {
                warn!("Record {} failed: {}", page.id, e);
                report.failed.push(FailedRecord {
                    record_id: page.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Export complete: {}/{} records, {}ms",
        report.exported.len(),
        pages.len(),
        report.duration_ms
    );
    Ok(report)
}

/// [`export_all`] into a [`DirectorySink`] at `dir`.
pub async fn export_to_dir(
    pages: &[RawPage],
    dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<ExportReport> {
    let sink = DirectorySink::new(dir.as_ref(), config.jpeg_quality);
    export_all(pages, config, &sink).await
}

// ── Summary view ─────────────────────────────────────────────────────────

/// One row of the record listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    pub id: String,
    pub name: Option<String>,
    pub date: Option<String>,
    pub amount: Option<f64>,
}

impl RecordSummary {
    /// "N/A" for an absent amount; zero is shown as money.
    pub fn display_amount(&self, currency_symbol: &str) -> String {
        match self.amount {
            Some(_) => compose::format_amount(self.amount, currency_symbol),
            None => "N/A".to_string(),
        }
    }

    pub fn display_date(&self) -> String {
        match self.date.as_deref() {
            Some(raw) => compose::parse_record_date(raw)
                .map(compose::short_date)
                .unwrap_or_else(|| raw.to_string()),
            None => "N/A".to_string(),
        }
    }
}

impl From<NormalizedRecord> for RecordSummary {
    fn from(r: NormalizedRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            date: r.date,
            amount: r.amount,
        }
    }
}

/// Normalise every page for display without rendering anything.
pub fn summarize(pages: &[RawPage]) -> Vec<RecordSummary> {
    pages.iter().map(|p| RecordSummary::from(p.normalize())).collect()
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn observer_of(config: &ExportConfig) -> SharedObserver {
    config
        .observer
        .clone()
        .unwrap_or_else(|| Arc::new(NoopObserver))
}

fn render_record(
    record: &NormalizedRecord,
    assets: &ExportAssets,
    config: &ExportConfig,
    observer: SharedObserver,
) -> Result<PagedArtifact> {
    let generated_at = Utc::now();
    let options = ComposeOptions {
        typeface: Arc::clone(&assets.typeface),
        currency_symbol: config.currency_symbol.clone(),
    };
    let doc = compose::compose_at(record, assets.branding.clone(), generated_at, &options);
    let pages = Paginator::new(config.overflow)
        .with_observer(observer)
        .paginate(&doc, config.page_width_mm, config.page_height_mm, config.scale)?;
    assemble::assemble_at(
        pages,
        record,
        config.page_width_mm,
        config.page_height_mm,
        generated_at,
    )
}

fn report(
    observer: &SharedObserver,
    record_id: &str,
    result: Result<PagedArtifact>,
) -> Result<PagedArtifact> {
    match &result {
        Ok(artifact) => {
            info!(
                "Exported {} → {} ({} page(s))",
                record_id,
                artifact.file_name,
                artifact.pages.len()
            );
            observer.on_export_complete(record_id, &artifact.file_name, artifact.pages.len());
        }
        Err(e) => {
            warn!("Export of {} failed: {}", record_id, e);
            observer.on_export_failed(record_id, &e.to_string());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_pages;

    fn pages() -> Vec<RawPage> {
        parse_pages(
            r#"[
                {"id": "a1", "properties": {
                    "Name": {"type": "title", "title": [{"plain_text": "Acme Co"}]},
                    "Amount": {"type": "number", "number": 0},
                    "Date": {"type": "date", "date": {"start": "2024-01-01"}}
                }},
                {"id": "b2", "properties": {
                    "Name": {"type": "title", "title": [{"plain_text": "Beta LLC"}]}
                }}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn summary_distinguishes_zero_from_absent() {
        let rows = summarize(&pages());
        assert_eq!(rows[0].display_amount("$"), "$0.00");
        assert_eq!(rows[1].display_amount("$"), "N/A");
        assert_eq!(rows[0].display_date(), "1/1/2024");
        assert_eq!(rows[1].display_date(), "N/A");
    }

    #[test]
    fn sync_export_produces_named_artifact() {
        let config = ExportConfig::builder().scale(1.0).build().unwrap();
        let artifact = export_record_sync(&pages()[0], &ExportAssets::builtin(), &config).unwrap();
        assert!(artifact.file_name.starts_with("invoice-acme-co-"));
        assert!(artifact.file_name.ends_with(".pdf"));
        assert_eq!(artifact.page_count(), 1);
    }

    #[tokio::test]
    async fn async_export_matches_sync_page_count() {
        let config = ExportConfig::builder().scale(1.0).build().unwrap();
        let assets = ExportAssets::builtin();
        let a = export_record_with(&pages()[1], &assets, &config).await.unwrap();
        let b = export_record_sync(&pages()[1], &assets, &config).unwrap();
        assert_eq!(a.page_count(), b.page_count());
        assert_eq!(a.pages[0].image.dimensions(), b.pages[0].image.dimensions());
    }
}
