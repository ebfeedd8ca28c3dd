//! Error types for the export pipeline.

use thiserror::Error;

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that can abort an export run.
///
/// Image load failures are deliberately absent: a broken or slow image is
/// hidden from the output and logged, never fatal (see [`crate::raster`]).
#[derive(Error, Debug)]
pub enum ExportError {
    /// The export container element was not found in the input document.
    #[error("content container `#{id}` not found in the input document")]
    MissingContent { id: String },

    /// Another export run is already in progress on this exporter.
    #[error("an export run is already in progress")]
    Busy,

    /// A compaction-rule file could not be parsed.
    #[error("invalid compaction rules: {0}")]
    InvalidRules(String),

    /// Rasterization failed (layout or canvas capture).
    #[error("rasterization failed: {0}")]
    Raster(String),

    /// Band encoding or PDF finalization failed.
    #[error("document assembly failed: {0}")]
    Assembly(String),

    /// Filesystem error while reading input or writing the document.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
