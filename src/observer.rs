//! Structured export events.
//!
//! Inject an [`Arc<dyn ExportObserver>`] via
//! [`crate::config::ExportConfigBuilder::observer`] to receive one event per
//! pipeline milestone. The pipeline stages never talk to a logging backend or
//! the network themselves; everything they want to report goes through this
//! trait (and through `tracing` for plain diagnostics).
//!
//! # Example
//!
//! ```rust
//! use notion_invoice::{ExportConfig, ExportObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     pages: AtomicUsize,
//! }
//!
//! impl ExportObserver for PageCounter {
//!     fn on_page_emitted(&self, _record_id: &str, _index: usize, _offset: f64) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter { pages: AtomicUsize::new(0) });
//!
//! let config = ExportConfig::builder()
//!     .observer(counter as Arc<dyn ExportObserver>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Receives pipeline events. All methods default to no-ops.
///
/// Implementations must be `Send + Sync`: rasterisation runs on a blocking
/// worker thread when the async API is used.
pub trait ExportObserver: Send + Sync {
    /// A record is about to be exported.
    fn on_export_start(&self, record_id: &str) {
        let _ = record_id;
    }

    /// A property was ignored during normalisation (unrecognized kind or an
    /// empty payload).
    ///
    /// # Arguments
    /// * `name` — property name as it appears in the source
    /// * `kind` — wire kind, e.g. `"checkbox"` or `"unrecognized"`
    fn on_property_skipped(&self, record_id: &str, name: &str, kind: &str) {
        let _ = (record_id, name, kind);
    }

    /// Normalisation finished.
    fn on_record_normalized(&self, record_id: &str, has_amount: bool) {
        let _ = (record_id, has_amount);
    }

    /// The composed invoice was rasterised.
    fn on_rasterized(&self, record_id: &str, width_px: u32, height_px: u32) {
        let _ = (record_id, width_px, height_px);
    }

    /// A page was cut from the raster.
    ///
    /// # Arguments
    /// * `index`  — 0-based page index
    /// * `offset` — distance of the page top from the document top, in
    ///   physical page units
    fn on_page_emitted(&self, record_id: &str, index: usize, offset: f64) {
        let _ = (record_id, index, offset);
    }

    /// The artifact was assembled.
    fn on_export_complete(&self, record_id: &str, file_name: &str, page_count: usize) {
        let _ = (record_id, file_name, page_count);
    }

    /// The export failed. `error` carries full diagnostic detail.
    fn on_export_failed(&self, record_id: &str, error: &str) {
        let _ = (record_id, error);
    }
}

/// Observer that ignores every event; the default.
pub struct NoopObserver;

impl ExportObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type SharedObserver = Arc<dyn ExportObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        skipped: Mutex<Vec<(String, String)>>,
        pages: AtomicUsize,
        failures: AtomicUsize,
    }

    impl ExportObserver for Recorder {
        fn on_property_skipped(&self, _record_id: &str, name: &str, kind: &str) {
            self.skipped
                .lock()
                .unwrap()
                .push((name.to_string(), kind.to_string()));
        }

        fn on_page_emitted(&self, _record_id: &str, _index: usize, _offset: f64) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_export_failed(&self, _record_id: &str, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_export_start("r");
        o.on_property_skipped("r", "Done", "checkbox");
        o.on_record_normalized("r", false);
        o.on_rasterized("r", 1600, 2000);
        o.on_page_emitted("r", 0, 0.0);
        o.on_export_complete("r", "invoice-x-1.pdf", 1);
        o.on_export_failed("r", "boom");
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_property_skipped("r", "Done", "checkbox");
        rec.on_page_emitted("r", 0, 0.0);
        rec.on_page_emitted("r", 1, 297.0);
        rec.on_export_failed("r", "render");

        assert_eq!(
            rec.skipped.lock().unwrap().as_slice(),
            &[("Done".to_string(), "checkbox".to_string())]
        );
        assert_eq!(rec.pages.load(Ordering::SeqCst), 2);
        assert_eq!(rec.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: SharedObserver = Arc::new(NoopObserver);
        o.on_export_start("r");
        o.on_export_complete("r", "f.pdf", 2);
    }
}
