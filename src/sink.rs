//! Destinations for finished artifacts.
//!
//! The pipeline ends at [`PagedArtifact`]; what happens to it next is the
//! host's business. [`DirectorySink`] encodes each artifact to PDF and writes
//! it next to its siblings, [`MemorySink`] keeps the bytes for tests and
//! embedding hosts.

use crate::error::{InvoiceError, Result};
use crate::pipeline::assemble::PagedArtifact;
use crate::pipeline::encode;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Accepts a finished artifact and its suggested file name.
pub trait ArtifactSink: Send + Sync {
    fn accept(&self, artifact: &PagedArtifact) -> Result<()>;
}

/// Writes `<dir>/<file_name>` as a PDF.
///
/// Writes are atomic: the PDF is written to a temp file in the same
/// directory and renamed into place, so a crash never leaves a partial file
/// under the final name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    jpeg_quality: u8,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            dir: dir.into(),
            jpeg_quality,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode and write `artifact`, returning the final path.
    pub fn write(&self, artifact: &PagedArtifact) -> Result<PathBuf> {
        let bytes = encode::to_pdf(artifact, self.jpeg_quality)?;
        let path = self.dir.join(&artifact.file_name);
        let write_err = |source: std::io::Error| InvoiceError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

impl ArtifactSink for DirectorySink {
    fn accept(&self, artifact: &PagedArtifact) -> Result<()> {
        self.write(artifact).map(|_| ())
    }
}

/// Keeps encoded PDFs in memory as `(file_name, bytes)` pairs.
#[derive(Debug)]
pub struct MemorySink {
    jpeg_quality: u8,
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(92)
    }
}

impl MemorySink {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality,
            files: Mutex::new(Vec::new()),
        }
    }

    /// Take everything collected so far.
    pub fn take(&self) -> Vec<(String, Vec<u8>)> {
        match self.files.lock() {
            Ok(mut files) => std::mem::take(&mut *files),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl ArtifactSink for MemorySink {
    fn accept(&self, artifact: &PagedArtifact) -> Result<()> {
        let bytes = encode::to_pdf(artifact, self.jpeg_quality)?;
        let mut files = self
            .files
            .lock()
            .map_err(|_| InvoiceError::Internal("memory sink lock poisoned".into()))?;
        files.push((artifact.file_name.clone(), bytes));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::RasterPage;
    use image::{Rgba, RgbaImage};

    fn artifact(name: &str) -> PagedArtifact {
        PagedArtifact {
            record_id: "rec".into(),
            file_name: name.into(),
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            pages: vec![RasterPage {
                index: 0,
                offset: 0.0,
                image: RgbaImage::from_pixel(21, 30, Rgba([255, 255, 255, 255])),
            }],
        }
    }

    #[test]
    fn directory_sink_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"), 80);
        let path = sink.write(&artifact("invoice-acme-1.pdf")).unwrap();

        assert_eq!(path, dir.path().join("out").join("invoice-acme-1.pdf"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        // Only the final file remains; the temp file was renamed.
        assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }

    #[test]
    fn memory_sink_collects_in_order() {
        let sink = MemorySink::new(80);
        sink.accept(&artifact("a.pdf")).unwrap();
        sink.accept(&artifact("b.pdf")).unwrap();
        let files = sink.take();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, "a.pdf");
        assert!(files[1].1.starts_with(b"%PDF"));
        assert!(sink.take().is_empty());
    }
}
