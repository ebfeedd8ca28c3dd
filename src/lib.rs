//! # cvsnap – snapshot-based CV → paginated A4 PDF exporter
//!
//! Converts a rendered CV page into a downloadable PDF by rasterizing the
//! exportable content into one tall bitmap and slicing it across A4 pages.
//! The pipeline stages are:
//!
//! 1. **Prepare** – clone the export container, strip `no-print` elements,
//!    apply compaction overrides ([`snapshot`])
//! 2. **Rasterize** – settle embedded images, lay out and paint the clone at
//!    2× into a single bitmap ([`raster`], with [`layout`] and [`fonts`])
//! 3. **Slice** – partition the bitmap into page-height bands ([`slicer`])
//! 4. **Assemble** – one band per A4 page at a uniform margin, save as
//!    `<Name>_CV_<YYYY-MM-DD>.pdf` ([`assemble`])
//!
//! [`pipeline::Exporter`] ties the stages together and serializes runs.

pub mod assemble;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod pipeline;
pub mod raster;
pub mod slicer;
pub mod snapshot;
pub mod style;
pub mod templates;

// Re-exports for convenience
pub use error::{ExportError, Result};
pub use pipeline::{print_fallback, ExportConfig, ExportOutput, Exporter};
