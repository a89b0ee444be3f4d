//! Artifact assembly: ordered pages + record → [`PagedArtifact`].

use crate::error::{InvoiceError, Result};
use crate::model::NormalizedRecord;
use crate::pipeline::render::RasterPage;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Slug used when the record has no usable name.
pub const FALLBACK_SLUG: &str = "invoice";

/// A finished, never-empty sequence of pages plus its suggested file name.
#[derive(Debug, Clone)]
pub struct PagedArtifact {
    pub record_id: String,
    pub file_name: String,
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub pages: Vec<RasterPage>,
}

impl PagedArtifact {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Assemble `pages` into an artifact named after `record`, stamped now.
pub fn assemble(
    pages: Vec<RasterPage>,
    record: &NormalizedRecord,
    page_width_mm: f64,
    page_height_mm: f64,
) -> Result<PagedArtifact> {
    assemble_at(pages, record, page_width_mm, page_height_mm, Utc::now())
}

/// [`assemble`] with an explicit timestamp for the file name.
pub fn assemble_at(
    pages: Vec<RasterPage>,
    record: &NormalizedRecord,
    page_width_mm: f64,
    page_height_mm: f64,
    generated_at: DateTime<Utc>,
) -> Result<PagedArtifact> {
    if pages.is_empty() {
        return Err(InvoiceError::EmptyArtifact {
            record: record.id.clone(),
        });
    }
    let file_name = file_name_for(record, generated_at.timestamp_millis());
    debug!("Assembled {} page(s) as {}", pages.len(), file_name);
    Ok(PagedArtifact {
        record_id: record.id.clone(),
        file_name,
        page_width_mm,
        page_height_mm,
        pages,
    })
}

/// `invoice-<slug>-<epoch-millis>.pdf`
pub fn file_name_for(record: &NormalizedRecord, epoch_millis: i64) -> String {
    let slug = record
        .name
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SLUG.to_string());
    format!("invoice-{slug}-{epoch_millis}.pdf")
}

/// Lower-case `name` and collapse whitespace runs to `-`.
///
/// Path separators and other characters rejected by common filesystems are
/// dropped so the result is always a single path component, and surrounding
/// whitespace is trimmed so a padded name never yields `invoice--x-…`.
pub fn slugify(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    WHITESPACE_RUN
        .replace_all(cleaned.trim(), "-")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::RgbaImage;

    fn page(index: usize) -> RasterPage {
        RasterPage {
            index,
            offset: index as f64 * 297.0,
            image: RgbaImage::new(4, 4),
        }
    }

    fn named(name: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            name: name.map(String::from),
            ..NormalizedRecord::new("rec-1")
        }
    }

    #[test]
    fn slug_collapses_whitespace() {
        assert_eq!(slugify("Acme  Co\tLtd"), "acme-co-ltd");
        assert_eq!(slugify("  Beta LLC "), "beta-llc");
        assert_eq!(slugify("a/b: c"), "ab-c");
        assert_eq!(slugify("../../etc/passwd"), "....etcpasswd");
    }

    #[test]
    fn file_name_uses_epoch_millis() {
        assert_eq!(
            file_name_for(&named(Some("Acme Co")), 1_700_000_000_123),
            "invoice-acme-co-1700000000123.pdf"
        );
    }

    #[test]
    fn missing_or_blank_name_falls_back() {
        assert_eq!(file_name_for(&named(None), 5), "invoice-invoice-5.pdf");
        assert_eq!(file_name_for(&named(Some("   ")), 5), "invoice-invoice-5.pdf");
        assert_eq!(file_name_for(&named(Some("///")), 5), "invoice-invoice-5.pdf");
    }

    #[test]
    fn empty_pages_are_rejected() {
        let err = assemble(Vec::new(), &named(Some("Acme")), 210.0, 297.0).unwrap_err();
        assert!(matches!(err, InvoiceError::EmptyArtifact { .. }));
    }

    #[test]
    fn assemble_keeps_page_order() {
        let at = Utc.timestamp_millis_opt(42).unwrap();
        let artifact =
            assemble_at(vec![page(0), page(1)], &named(Some("Acme")), 210.0, 297.0, at).unwrap();
        assert_eq!(artifact.page_count(), 2);
        assert_eq!(artifact.pages[1].index, 1);
        assert_eq!(artifact.file_name, "invoice-acme-42.pdf");
        assert_eq!(artifact.record_id, "rec-1");
    }
}
