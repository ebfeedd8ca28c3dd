//! Document assembler – places each encoded band on its own A4 page at a
//! uniform margin and produces the final PDF bytes via `printpdf`'s
//! ops-based API.

use jiff::civil::Date;
use printpdf::*;

use crate::error::{ExportError, Result};
use crate::slicer::PageBand;

/// PDF points per millimetre.
const PT_PER_MM: f32 = 72.0 / 25.4;

/// Physical page geometry plus the bitmap's pixel density.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    /// Uniform margin on all four sides.
    pub margin_mm: f32,
    /// Bitmap pixels per physical millimetre: bitmap width ÷ content width.
    pub px_per_mm: f32,
}

impl PageGeometry {
    /// ISO A4 with the canonical 10mm margin.
    pub fn a4(margin_mm: f32, px_per_mm: f32) -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm,
            px_per_mm,
        }
    }

    pub fn content_width_mm(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }

    pub fn content_height_mm(&self) -> f32 {
        self.page_height_mm - 2.0 * self.margin_mm
    }

    /// Page capacity: bitmap rows that fit one page's content area.
    pub fn capacity_px(&self) -> u32 {
        (self.content_height_mm() * self.px_per_mm).floor().max(0.0) as u32
    }

    pub fn validate(&self) -> Result<()> {
        if self.content_width_mm() <= 0.0 || self.content_height_mm() <= 0.0 {
            return Err(ExportError::Assembly(format!(
                "margin {}mm leaves no content area on a {}x{}mm page",
                self.margin_mm, self.page_width_mm, self.page_height_mm
            )));
        }
        if self.px_per_mm <= 0.0 {
            return Err(ExportError::Assembly(format!(
                "invalid pixel density {} px/mm",
                self.px_per_mm
            )));
        }
        Ok(())
    }
}

/// Assemble the ordered bands into a PDF document.
///
/// Each band gets its own page; its physical height comes from its pixel
/// height and the known density. An empty band list still produces a single
/// blank page, so a degenerate (empty) snapshot exports a valid document.
pub fn assemble(bands: &[PageBand], geometry: &PageGeometry, title: &str) -> Result<Vec<u8>> {
    geometry.validate()?;

    let page_w = Mm(geometry.page_width_mm);
    let page_h = Mm(geometry.page_height_mm);
    let page_h_pt = geometry.page_height_mm * PT_PER_MM;
    let margin_pt = geometry.margin_mm * PT_PER_MM;
    let content_width_pt = geometry.content_width_mm() * PT_PER_MM;

    let mut doc = PdfDocument::new(title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let mut pages = Vec::with_capacity(bands.len().max(1));

    for band in bands {
        let raw = RawImage::decode_from_bytes(&band.jpeg, &mut warnings)
            .map_err(|e| ExportError::Assembly(format!("band image rejected: {e}")))?;
        let xobj_id = doc.add_image(&raw);

        let band_height_pt = (band.height as f32 / geometry.px_per_mm) * PT_PER_MM;

        // PDF origin is bottom-left; the band hangs down from the top margin.
        let translate_y = page_h_pt - margin_pt - band_height_pt;

        // At dpi=72 printpdf renders 1 px = 1 pt, so scale = desired_pt / px.
        let scale_x = if band.width > 0 {
            content_width_pt / band.width as f32
        } else {
            1.0
        };
        let scale_y = if band.height > 0 {
            band_height_pt / band.height as f32
        } else {
            1.0
        };

        let ops = vec![Op::UseXobject {
            id: xobj_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(margin_pt)),
                translate_y: Some(Pt(translate_y)),
                dpi: Some(72.0),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                rotate: None,
            },
        }];
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    // At least one page, even for an empty bitmap.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    for warning in &warnings {
        log::debug!("printpdf: {warning:?}");
    }

    doc.with_pages(pages);
    Ok(doc.save(&PdfSaveOptions::default(), &mut Vec::new()))
}

/// Build the export filename: `<Name>_CV_<YYYY-MM-DD>.pdf`, spaces in the
/// subject name replaced with underscores, date in ISO-8601 calendar form.
pub fn export_filename(subject: &str, date: Date) -> String {
    let name = subject.trim().replace(char::is_whitespace, "_");
    format!("{name}_CV_{date}.pdf")
}

/// Filename for an export run happening now (local calendar date).
pub fn export_filename_today(subject: &str) -> String {
    export_filename(subject, jiff::Zoned::now().date())
}

#[cfg(test)]
mod tests {
    use super::*;

    // printpdf's glob export carries its own `image` module; name the image
    // crate's items explicitly so they win over the glob.
    use ::image::codecs::jpeg::JpegEncoder;
    use ::image::{Rgb, RgbImage};

    fn jpeg_band(width: u32, height: u32) -> PageBand {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
        let mut jpeg = Vec::new();
        let enc = JpegEncoder::new_with_quality(std::io::Cursor::new(&mut jpeg), 90);
        img.write_with_encoder(enc).unwrap();
        PageBand {
            jpeg,
            width,
            height,
        }
    }

    #[test]
    fn empty_band_list_yields_one_blank_page() {
        let geometry = PageGeometry::a4(10.0, 2.0);
        let pdf = assemble(&[], &geometry, "CV").unwrap();
        assert_eq!(&pdf[0..5], b"%PDF-");
    }

    #[test]
    fn one_page_per_band() {
        let geometry = PageGeometry::a4(10.0, 2.0);
        let bands = vec![jpeg_band(380, 554), jpeg_band(380, 200)];
        let pdf = assemble(&bands, &geometry, "CV").unwrap();
        assert_eq!(&pdf[0..5], b"%PDF-");
        assert!(pdf.len() > 500);
    }

    #[test]
    fn capacity_follows_margin_and_density() {
        // 297mm page, 10mm margins → 277mm content; at 2 px/mm → 554 px.
        let geometry = PageGeometry::a4(10.0, 2.0);
        assert_eq!(geometry.capacity_px(), 554);
    }

    #[test]
    fn oversized_margin_is_rejected() {
        let geometry = PageGeometry::a4(150.0, 2.0);
        assert!(matches!(
            assemble(&[], &geometry, "CV"),
            Err(ExportError::Assembly(_))
        ));
    }

    #[test]
    fn filename_format() {
        let date = Date::constant(2024, 3, 7);
        assert_eq!(
            export_filename("Guillermo Caminero", date),
            "Guillermo_Caminero_CV_2024-03-07.pdf"
        );
    }

    #[test]
    fn filename_pads_month_and_day() {
        let date = Date::constant(2025, 11, 30);
        assert_eq!(export_filename("A B", date), "A_B_CV_2025-11-30.pdf");
    }
}
