//! Integration tests for the cvsnap pipeline.
//!
//! These validate:
//! - End-to-end export of the sample CV
//! - The slicing invariants (coverage, capacity, page count)
//! - Error handling (missing container, broken images)
//! - Run serialization and cleanup
//! - Raster determinism

use sha2::{Digest, Sha256};

use cvsnap::assemble::{export_filename, PageGeometry};
use cvsnap::dom::{parse_html, DomNode};
use cvsnap::fonts::FontManager;
use cvsnap::layout::layout;
use cvsnap::pipeline::{print_fallback, ExportConfig, ExportOutput, Exporter};
use cvsnap::raster::{rasterize, settle_images};
use cvsnap::slicer::band_plan;
use cvsnap::snapshot::{prepare, SnapshotOptions};
use cvsnap::style::build_styled_tree;
use cvsnap::templates::sample_cv;
use cvsnap::ExportError;

// =====================================================================
// Helpers
// =====================================================================

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn export_sample() -> ExportOutput {
    Exporter::with_defaults()
        .export(&sample_cv())
        .expect("sample CV should export")
}

/// A CV long enough to guarantee multiple pages.
fn long_cv(items: usize) -> String {
    let mut body = String::from(r#"<div id="cv-content"><section class="py-12">"#);
    for i in 0..items {
        body.push_str(&format!(
            r#"<div class="work-experience-item bg-white p-8">
                 <h3 class="text-xl font-bold">Role number {i}</h3>
                 <p>Did a substantial amount of work on project {i}, including
                 design, implementation, rollout, and the inevitable cleanup
                 afterwards when requirements shifted.</p>
               </div>"#
        ));
    }
    body.push_str("</section></div>");
    body
}

// =====================================================================
// End-to-end
// =====================================================================

#[test]
fn sample_cv_exports_to_valid_pdf() {
    let out = export_sample();
    assert_valid_pdf(&out.pdf);
    assert!(out.pages >= 1);
    let (w, h) = out.bitmap_size;
    assert!(w > 0 && h > 0);
}

#[test]
fn page_count_matches_band_arithmetic() {
    let out = export_sample();
    let (w, h) = out.bitmap_size;
    let geometry = PageGeometry::a4(10.0, w as f32 / 190.0);
    let capacity = geometry.capacity_px();
    assert!(capacity > 0);
    let expected = (h.div_ceil(capacity)).max(1) as usize;
    assert_eq!(out.pages, expected);
}

#[test]
fn long_content_spans_multiple_pages() {
    let out = Exporter::with_defaults().export(&long_cv(60)).unwrap();
    assert!(
        out.pages > 1,
        "expected multiple pages, got {}",
        out.pages
    );
    assert_valid_pdf(&out.pdf);
}

#[test]
fn filename_embeds_subject_and_date() {
    let out = export_sample();
    assert!(out.filename.starts_with("Guillermo_Caminero_CV_"));
    assert!(out.filename.ends_with(".pdf"));
    // The embedded date is ISO-8601 calendar form: YYYY-MM-DD.
    let date_part = out
        .filename
        .trim_start_matches("Guillermo_Caminero_CV_")
        .trim_end_matches(".pdf");
    assert_eq!(date_part.len(), 10);
    assert_eq!(date_part.as_bytes()[4], b'-');
    assert_eq!(date_part.as_bytes()[7], b'-');

    let fixed = export_filename("Guillermo Caminero", jiff::civil::date(2024, 3, 7));
    assert_eq!(fixed, "Guillermo_Caminero_CV_2024-03-07.pdf");
}

#[test]
fn custom_subject_name_in_filename() {
    let config = ExportConfig {
        subject_name: "Ada Lovelace".to_string(),
        ..ExportConfig::default()
    };
    let out = Exporter::new(config).export(&sample_cv()).unwrap();
    assert!(out.filename.starts_with("Ada_Lovelace_CV_"));
}

// =====================================================================
// Slicing invariants on the public API
// =====================================================================

#[test]
fn slicer_reference_cases() {
    let heights: Vec<u32> = band_plan(1000, 400).iter().map(|b| b.height).collect();
    assert_eq!(heights, vec![400, 400, 200]);

    let exact = band_plan(400, 400);
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].height, 400);

    assert!(band_plan(0, 400).is_empty());
}

#[test]
fn slicer_covers_without_gap_or_overlap() {
    for (h, c) in [(2313u32, 554u32), (553, 554), (554, 554), (555, 554)] {
        let bands = band_plan(h, c);
        let mut next_row = 0u32;
        for band in &bands {
            assert_eq!(band.offset, next_row);
            assert!(band.height <= c);
            next_row += band.height;
        }
        assert_eq!(next_row, h);
    }
}

// =====================================================================
// Error handling
// =====================================================================

#[test]
fn missing_container_produces_no_document() {
    let exporter = Exporter::with_defaults();
    let err = exporter.export("<html><body><p>No CV here</p></body></html>");
    assert!(matches!(err, Err(ExportError::MissingContent { .. })));
    assert!(!exporter.is_busy(), "trigger must return to idle");
    assert_eq!(exporter.staged_snapshots(), 0, "no staged residue");
}

#[test]
fn broken_image_does_not_block_export() {
    let html = r#"<div id="cv-content">
        <section><p>Text survives</p>
        <img src="data:image/png;base64,notbase64!">
        <img src="does-not-exist.png">
        </section></div>"#;
    let out = Exporter::with_defaults().export(html).unwrap();
    assert_valid_pdf(&out.pdf);
}

#[test]
fn oversized_margin_fails_assembly_not_panics() {
    let config = ExportConfig {
        margin_mm: 150.0,
        ..ExportConfig::default()
    };
    let exporter = Exporter::new(config);
    let err = exporter.export(&sample_cv());
    assert!(matches!(err, Err(ExportError::Assembly(_))));
    assert!(!exporter.is_busy());
}

// =====================================================================
// Run serialization & cleanup
// =====================================================================

#[test]
fn concurrent_export_is_rejected_while_busy() {
    let exporter = std::sync::Arc::new(Exporter::with_defaults());

    let worker = {
        let exporter = exporter.clone();
        std::thread::spawn(move || exporter.export(&long_cv(60)))
    };

    // Wait until the worker's run holds the trigger.
    while !exporter.is_busy() {
        if worker.is_finished() {
            panic!("export finished before the busy window could be observed");
        }
        std::thread::yield_now();
    }

    let second = exporter.export(&sample_cv());
    assert!(
        matches!(second, Err(ExportError::Busy)),
        "expected Busy, got {second:?}"
    );

    let first = worker.join().expect("export thread panicked");
    assert!(first.is_ok());
    assert!(!exporter.is_busy(), "trigger must return to idle");
}

#[test]
fn reruns_leave_no_state_behind() {
    let exporter = Exporter::with_defaults();

    let first = exporter.export(&sample_cv()).unwrap();
    assert_eq!(exporter.staged_snapshots(), 0);

    // A failing run in between must not poison the next one.
    let _ = exporter.export("<div></div>");
    assert_eq!(exporter.staged_snapshots(), 0);

    let second = exporter.export(&sample_cv()).unwrap();
    assert_eq!(first.pages, second.pages);
    assert_eq!(first.bitmap_size, second.bitmap_size);
    assert!(!exporter.is_busy());
}

// =====================================================================
// Print fallback
// =====================================================================

#[test]
fn print_fallback_emits_sanitized_snapshot() {
    let html = sample_cv();
    let out = print_fallback(&html, &ExportConfig::default()).unwrap();
    assert!(out.contains("Work Experience"));
    assert!(!out.contains("no-print"));
    assert!(!out.contains("Download PDF"));
    // Compaction overrides landed as inline styles.
    assert!(out.contains("padding-top:0.2rem"));
}

// =====================================================================
// Raster determinism
// =====================================================================

#[test]
fn rasterization_is_deterministic() {
    let html = sample_cv();
    let nodes = parse_html(&html);
    // Heuristic-only metrics keep this test machine-independent.
    let fonts = FontManager::new();

    let raster_hash = || {
        let snapshot = prepare(&nodes, &SnapshotOptions::default()).unwrap();
        let settled = settle_images(
            &snapshot.root,
            None,
            std::time::Duration::from_secs(5),
        );
        let styled = build_styled_tree(
            &[DomNode::Element(snapshot.root.clone())],
            None,
        );
        let laid = layout(&styled, snapshot.width_px(), &fonts, &settled.dims());
        let bitmap = rasterize(&laid, &settled, &fonts, 2.0).unwrap();
        let mut hasher = Sha256::new();
        hasher.update(bitmap.as_raw());
        (bitmap.dimensions(), hasher.finalize())
    };

    let (dims_a, hash_a) = raster_hash();
    let (dims_b, hash_b) = raster_hash();
    assert_eq!(dims_a, dims_b);
    assert_eq!(hash_a, hash_b);
}
