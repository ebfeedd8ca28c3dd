//! Pipeline – ties snapshot preparation, image settling, rasterization,
//! slicing, and PDF assembly into a single export run.
//!
//! Runs are serialized: an [`Exporter`] carries a busy flag that plays the
//! role of the disabled trigger control. A second export while one is in
//! flight fails with [`ExportError::Busy`], and the flag is restored on
//! every exit path. The staged snapshot is owned by the run and released
//! unconditionally; a counter tracks it so tests can prove no residue
//! survives a run.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::assemble::{assemble, export_filename_today, PageGeometry};
use crate::dom::{parse_html, DomNode};
use crate::error::{ExportError, Result};
use crate::fonts::FontManager;
use crate::layout::layout;
use crate::raster::{rasterize, settle_images};
use crate::slicer::slice;
use crate::snapshot::{self, CompactionRule, PrintFrame, SnapshotOptions};
use crate::style::build_styled_tree;

/// Configuration for one exporter.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Subject name embedded in the filename (default: "Guillermo Caminero").
    pub subject_name: String,
    /// `id` of the export container (default: "cv-content").
    pub container_id: String,
    /// Physical page size in millimetres (default: ISO A4, 210 × 297).
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    /// Uniform margin on all sides (default: 10mm).
    pub margin_mm: f32,
    /// Raster oversampling factor (default: 2.0 for print quality).
    pub scale: f32,
    /// JPEG quality for encoded bands (default: 95).
    pub jpeg_quality: u8,
    /// Deadline for the whole image-settle phase (default: 5 seconds).
    pub image_timeout: Duration,
    /// Layout-compaction overrides applied to the snapshot.
    pub rules: Vec<CompactionRule>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            subject_name: "Guillermo Caminero".to_string(),
            container_id: "cv-content".to_string(),
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 10.0,
            scale: 2.0,
            jpeg_quality: 95,
            image_timeout: Duration::from_secs(5),
            rules: snapshot::default_rules(),
        }
    }
}

impl ExportConfig {
    pub fn content_width_mm(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }

    fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            container_id: self.container_id.clone(),
            frame: PrintFrame {
                width_mm: self.page_width_mm,
                padding_mm: self.margin_mm,
            },
            rules: self.rules.clone(),
        }
    }
}

/// The result of a successful export run.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// Finalized PDF bytes.
    pub pdf: Vec<u8>,
    /// `<Name>_CV_<YYYY-MM-DD>.pdf` for the current date.
    pub filename: String,
    /// Number of pages in the document (≥ 1).
    pub pages: usize,
    /// Pixel dimensions of the rasterized snapshot.
    pub bitmap_size: (u32, u32),
}

/// Runs exports, one at a time.
pub struct Exporter {
    config: ExportConfig,
    fonts: FontManager,
    busy: AtomicBool,
    staged: AtomicUsize,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            fonts: FontManager::with_system_fonts(),
            busy: AtomicBool::new(false),
            staged: AtomicUsize::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExportConfig::default())
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// True while an export run is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Number of snapshots currently staged. Zero between runs, success or
    /// failure.
    pub fn staged_snapshots(&self) -> usize {
        self.staged.load(Ordering::SeqCst)
    }

    /// Export an HTML document to a PDF. Relative image paths resolve
    /// against the current directory.
    pub fn export(&self, html: &str) -> Result<ExportOutput> {
        self.export_from(html, None)
    }

    /// Export with an explicit base directory for relative image paths.
    pub fn export_from(&self, html: &str, base_dir: Option<&Path>) -> Result<ExportOutput> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(ExportError::Busy);
        }
        let _trigger = TriggerGuard { busy: &self.busy };

        let result = self.run(html, base_dir);
        if let Err(e) = &result {
            log::error!("export failed: {e}");
        }
        result
    }

    fn run(&self, html: &str, base_dir: Option<&Path>) -> Result<ExportOutput> {
        let nodes = parse_html(html);

        let snapshot = snapshot::prepare(&nodes, &self.config.snapshot_options())?;
        let _staged = StageGuard::new(&self.staged);
        log::info!("snapshot staged at {}mm print width", snapshot.frame.width_mm);

        let settled = settle_images(&snapshot.root, base_dir, self.config.image_timeout);
        log::info!("{} image(s) settled", settled.len());

        let styled = build_styled_tree(&[DomNode::Element(snapshot.root.clone())], None);
        let laid = layout(&styled, snapshot.width_px(), &self.fonts, &settled.dims());
        let bitmap = rasterize(&laid, &settled, &self.fonts, self.config.scale)?;
        log::info!("rasterized {}x{} bitmap", bitmap.width(), bitmap.height());

        // px per mm follows the JS ratio: bitmap width over *content* width,
        // so the full-width bitmap shrinks into the margined content area.
        let px_per_mm = bitmap.width() as f32 / self.config.content_width_mm();
        let geometry = PageGeometry {
            page_width_mm: self.config.page_width_mm,
            page_height_mm: self.config.page_height_mm,
            margin_mm: self.config.margin_mm,
            px_per_mm,
        };
        geometry.validate()?;

        let bands = slice(&bitmap, geometry.capacity_px(), self.config.jpeg_quality)?;
        let title = format!("{} CV", self.config.subject_name);
        let pdf = assemble(&bands, &geometry, &title)?;

        let output = ExportOutput {
            filename: export_filename_today(&self.config.subject_name),
            pages: bands.len().max(1),
            bitmap_size: (bitmap.width(), bitmap.height()),
            pdf,
        };
        log::info!("assembled {} page(s) into {}", output.pages, output.filename);
        Ok(output)
    }
}

/// Restores the trigger to idle on every exit path.
struct TriggerGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for TriggerGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Tracks the staged snapshot for the duration of a run.
struct StageGuard<'a> {
    staged: &'a AtomicUsize,
}

impl<'a> StageGuard<'a> {
    fn new(staged: &'a AtomicUsize) -> Self {
        staged.fetch_add(1, Ordering::SeqCst);
        Self { staged }
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        self.staged.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Print fallback: prepare the sanitized, compacted snapshot and return it
/// as HTML for the host environment's native print path.
pub fn print_fallback(html: &str, config: &ExportConfig) -> Result<String> {
    let nodes = parse_html(html);
    let snapshot = snapshot::prepare(&nodes, &config.snapshot_options())?;
    Ok(snapshot.to_html())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<div id="cv-content"><section><p>Hello</p></section></div>"#;

    #[test]
    fn export_produces_a_pdf() {
        let exporter = Exporter::with_defaults();
        let out = exporter.export(MINIMAL).unwrap();
        assert_eq!(&out.pdf[0..5], b"%PDF-");
        assert!(out.pages >= 1);
        assert!(out.filename.starts_with("Guillermo_Caminero_CV_"));
        assert!(out.filename.ends_with(".pdf"));
    }

    #[test]
    fn missing_container_restores_idle_state() {
        let exporter = Exporter::with_defaults();
        let err = exporter.export("<div id=\"other\"></div>").unwrap_err();
        assert!(matches!(err, ExportError::MissingContent { .. }));
        assert!(!exporter.is_busy());
        assert_eq!(exporter.staged_snapshots(), 0);
    }

    #[test]
    fn rerun_after_completion_succeeds() {
        let exporter = Exporter::with_defaults();
        let first = exporter.export(MINIMAL).unwrap();
        let second = exporter.export(MINIMAL).unwrap();
        assert_eq!(first.pages, second.pages);
        assert_eq!(exporter.staged_snapshots(), 0);
        assert!(!exporter.is_busy());
    }

    #[test]
    fn print_fallback_strips_no_print() {
        let html = r#"<div id="cv-content"><p>Keep</p><button class="no-print">Btn</button></div>"#;
        let out = print_fallback(html, &ExportConfig::default()).unwrap();
        assert!(out.contains("Keep"));
        assert!(!out.contains("no-print"));
    }
}
