//! Pipeline stages for record-to-invoice export.
//!
//! Each submodule implements exactly one transformation step. Data flows
//! strictly forward; no stage depends on a later one.
//!
//! ## Data Flow
//!
//! ```text
//! normalize ──▶ compose ──▶ render ──▶ assemble ──▶ encode
//! (properties)  (layout)    (raster,   (file name)   (lopdf)
//!                            pages)
//! ```
//!
//! 1. [`normalize`] — typed Notion properties to a flat record; never fails
//!    on missing or null fields
//! 2. [`compose`]   — record to a fixed-width display list; the branding
//!    image is carried undecoded
//! 3. [`render`]    — rasterise onto a scoped staging surface and slice into
//!    fixed-height pages; runs in `spawn_blocking` from the async API
//! 4. [`assemble`]  — ordered pages plus derived file name
//! 5. [`encode`]    — one full-bleed JPEG image per PDF page
//!
//! [`typeface`] and [`input`] support the stages: glyph drawing and branding
//! image resolution.

pub mod assemble;
pub mod compose;
pub mod encode;
pub mod input;
pub mod normalize;
pub mod render;
pub mod typeface;
