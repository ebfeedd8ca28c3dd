//! Page slicer – partitions the rasterized bitmap into page-height bands.
//!
//! This is the heart of the exporter. The offset advances by the FULL page
//! capacity on every iteration, never by the actual band height, so page
//! boundaries stay uniform and no pixel row is rendered twice or skipped.
//! The loop condition is strict, so a bitmap that is an exact multiple of
//! the capacity produces no trailing blank page.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::error::{ExportError, Result};
use crate::raster::Bitmap;

/// One horizontal slice of the bitmap: `offset` is the first pixel row,
/// `height` the number of rows in the band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub offset: u32,
    pub height: u32,
}

/// Plan the bands for a bitmap of `height` rows and a page capacity of
/// `capacity` rows.
///
/// Invariants: bands tile `[0, height)` exactly, with no gap and no overlap,
/// and no band exceeds `capacity`. A zero `capacity` yields no bands (the
/// pipeline validates geometry before getting here); a zero `height` also
/// yields none, and the assembler emits a single blank page for it.
pub fn band_plan(height: u32, capacity: u32) -> Vec<Band> {
    if capacity == 0 {
        return Vec::new();
    }
    let mut bands = Vec::new();
    let mut offset = 0u32;
    while offset < height {
        bands.push(Band {
            offset,
            height: capacity.min(height - offset),
        });
        offset = offset.saturating_add(capacity);
    }
    bands
}

/// A band encoded as a compressed image, ready for the assembler.
#[derive(Debug, Clone)]
pub struct PageBand {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Slice the bitmap into encoded page bands.
pub fn slice(bitmap: &Bitmap, capacity: u32, jpeg_quality: u8) -> Result<Vec<PageBand>> {
    let plan = band_plan(bitmap.height(), capacity);
    let mut bands = Vec::with_capacity(plan.len());
    for band in plan {
        let view = image::imageops::crop_imm(bitmap, 0, band.offset, bitmap.width(), band.height);
        let rgb = DynamicImage::ImageRgba8(view.to_image()).to_rgb8();

        let mut jpeg = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| ExportError::Assembly(format!("band encode failed: {e}")))?;

        bands.push(PageBand {
            jpeg,
            width: bitmap.width(),
            height: band.height,
        });
    }
    log::debug!(
        "sliced {}x{} bitmap into {} band(s) at capacity {}",
        bitmap.width(),
        bitmap.height(),
        bands.len(),
        capacity
    );
    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn heights(bands: &[Band]) -> Vec<u32> {
        bands.iter().map(|b| b.height).collect()
    }

    #[test]
    fn uneven_tail_band() {
        let bands = band_plan(1000, 400);
        assert_eq!(heights(&bands), vec![400, 400, 200]);
        assert_eq!(bands[0].offset, 0);
        assert_eq!(bands[1].offset, 400);
        assert_eq!(bands[2].offset, 800);
    }

    #[test]
    fn exact_multiple_has_no_trailing_blank() {
        let bands = band_plan(400, 400);
        assert_eq!(heights(&bands), vec![400]);
        let bands = band_plan(800, 400);
        assert_eq!(heights(&bands), vec![400, 400]);
    }

    #[test]
    fn short_bitmap_is_one_band() {
        let bands = band_plan(150, 400);
        assert_eq!(heights(&bands), vec![150]);
    }

    #[test]
    fn zero_height_plans_nothing() {
        assert!(band_plan(0, 400).is_empty());
    }

    #[test]
    fn zero_capacity_plans_nothing() {
        assert!(band_plan(100, 0).is_empty());
    }

    #[test]
    fn bands_tile_exactly() {
        for (h, c) in [(1000u32, 400u32), (997, 123), (1, 1), (5000, 5000), (4096, 512)] {
            let bands = band_plan(h, c);
            let expected = h.div_ceil(c) as usize;
            assert_eq!(bands.len(), expected, "H={h} C={c}");
            let mut covered = 0u32;
            for (i, band) in bands.iter().enumerate() {
                assert_eq!(band.offset, i as u32 * c, "offsets advance by capacity");
                assert_eq!(band.offset, covered, "no gap, no overlap");
                assert!(band.height <= c, "band exceeds capacity");
                covered += band.height;
            }
            assert_eq!(covered, h, "union covers the full bitmap");
        }
    }

    #[test]
    fn slice_encodes_each_band() {
        let bitmap = RgbaImage::from_pixel(10, 25, image::Rgba([0, 128, 255, 255]));
        let bands = slice(&bitmap, 10, 95).unwrap();
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].height, 10);
        assert_eq!(bands[2].height, 5);
        for band in &bands {
            assert_eq!(band.width, 10);
            // JPEG SOI marker
            assert_eq!(&band.jpeg[0..2], &[0xFF, 0xD8]);
        }
    }

    #[test]
    fn slice_of_empty_bitmap_is_empty() {
        let bitmap = RgbaImage::new(10, 0);
        let bands = slice(&bitmap, 10, 95).unwrap();
        assert!(bands.is_empty());
    }
}
