//! Error types for the notion-invoice library.
//!
//! Three failures belong to the export pipeline itself:
//!
//! * [`InvoiceError::ValidationFailure`] — the raw property collection is
//!   structurally malformed. Missing or null *individual* fields are normal
//!   data and never produce this error.
//! * [`InvoiceError::RenderFailure`] — rasterisation of the composed invoice
//!   did not complete (for example an undecodable branding image). No pages
//!   are produced.
//! * [`InvoiceError::EmptyArtifact`] — assembly was asked to build a document
//!   out of zero pages; always a symptom of an upstream render failure.
//!
//! The remaining variants cover the surfaces around the pipeline (input
//! files, branding downloads, output writes, configuration).
//!
//! `Display` keeps full diagnostic detail for logs. Hosts that show errors to
//! end users should prefer [`InvoiceError::user_message`], which never leaks
//! the shape of the source data.

use std::path::PathBuf;
use thiserror::Error;

/// Generic text shown to end users when any export step fails.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate document. Please try again.";

/// All errors returned by the notion-invoice library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The raw property collection is not structurally valid.
    #[error("Invalid property collection for record '{record}': {detail}")]
    ValidationFailure { record: String, detail: String },

    /// The composed invoice could not be rasterised.
    #[error("Rendering failed for record '{record}': {detail}")]
    RenderFailure { record: String, detail: String },

    /// Assembly was invoked with no pages.
    #[error("Cannot assemble record '{record}': no pages were rendered")]
    EmptyArtifact { record: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The records file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The input could not be parsed as Notion page JSON.
    #[error("Invalid input: {detail}")]
    InvalidInput { detail: String },

    /// `--record` named an id that is not in the input.
    #[error("Record '{id}' not found among {total} records")]
    RecordNotFound { id: String, total: usize },

    // ── Branding errors ───────────────────────────────────────────────────
    /// Branding image file was not found.
    #[error("Branding image not found: '{path}'")]
    BrandingNotFound { path: PathBuf },

    /// Branding image URL was valid but the download failed.
    #[error("Failed to download branding image '{url}': {reason}")]
    BrandingDownloadFailed { url: String, reason: String },

    /// Branding image download exceeded the configured timeout.
    #[error("Branding download timed out after {secs}s for '{url}'")]
    BrandingDownloadTimeout { url: String, secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The PDF container could not be encoded.
    #[error("Failed to encode PDF '{file_name}': {detail}")]
    PdfEncodingFailed { file_name: String, detail: String },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// Message safe to show to end users.
    ///
    /// Every variant maps to the same generic text; diagnostic detail stays
    /// in `Display` / `Debug` for logs.
    pub fn user_message(&self) -> &'static str {
        GENERIC_FAILURE_MESSAGE
    }

    /// True for the failures produced inside the render/assemble stages.
    pub fn is_render_failure(&self) -> bool {
        matches!(
            self,
            InvoiceError::RenderFailure { .. } | InvoiceError::EmptyArtifact { .. }
        )
    }
}

pub type Result<T, E = InvoiceError> = std::result::Result<T, E>;
