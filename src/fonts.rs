//! Font loading and text measurement using `ttf-parser`.
//!
//! The rasterizer needs real glyph outlines when they are available, but
//! layout must stay deterministic on machines without any usable font file,
//! so every measurement falls back to Helvetica-like heuristic metrics.

use std::collections::HashMap;
use std::path::PathBuf;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API). Empty for
    /// the synthetic fallback face.
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// The style variant of a face.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontVariant {
    pub bold: bool,
    pub italic: bool,
}

impl FontVariant {
    pub const REGULAR: FontVariant = FontVariant {
        bold: false,
        italic: false,
    };
}

/// Manages loaded font variants for the single sans-serif family the
/// snapshot is rendered with.
pub struct FontManager {
    fonts: HashMap<FontVariant, FontData>,
}

/// Candidate sans-serif files, checked per variant in order.
/// (family stem, bold suffix, italic suffix, bold-italic suffix)
const FAMILY_CANDIDATES: &[[&str; 4]] = &[
    [
        "DejaVuSans.ttf",
        "DejaVuSans-Bold.ttf",
        "DejaVuSans-Oblique.ttf",
        "DejaVuSans-BoldOblique.ttf",
    ],
    [
        "LiberationSans-Regular.ttf",
        "LiberationSans-Bold.ttf",
        "LiberationSans-Italic.ttf",
        "LiberationSans-BoldItalic.ttf",
    ],
    [
        "FreeSans.ttf",
        "FreeSansBold.ttf",
        "FreeSansOblique.ttf",
        "FreeSansBoldOblique.ttf",
    ],
];

fn system_font_dirs() -> Vec<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu",
        "/usr/share/fonts/dejavu",
        "/usr/share/fonts/TTF",
        "/usr/share/fonts/truetype/liberation",
        "/usr/share/fonts/liberation",
        "/usr/share/fonts/truetype/freefont",
        "/usr/share/fonts/gnu-free",
        "/Library/Fonts",
        "C:\\Windows\\Fonts",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

impl FontManager {
    /// Create a manager with only the synthetic fallback face.
    pub fn new() -> Self {
        let mut fonts = HashMap::new();
        fonts.insert(
            FontVariant::REGULAR,
            FontData {
                bytes: Vec::new(),
                units_per_em: 1000.0,
                ascender: 750.0,
                descender: -250.0,
            },
        );
        Self { fonts }
    }

    /// Create a manager and try to load system font files for all variants.
    pub fn with_system_fonts() -> Self {
        let mut mgr = Self::new();
        mgr.load_system_fonts();
        mgr
    }

    fn load_system_fonts(&mut self) {
        let dirs = system_font_dirs();
        for family in FAMILY_CANDIDATES {
            let variants = [
                (FontVariant::REGULAR, family[0]),
                (
                    FontVariant {
                        bold: true,
                        italic: false,
                    },
                    family[1],
                ),
                (
                    FontVariant {
                        bold: false,
                        italic: true,
                    },
                    family[2],
                ),
                (
                    FontVariant {
                        bold: true,
                        italic: true,
                    },
                    family[3],
                ),
            ];
            let mut loaded_any = false;
            for (variant, file_name) in variants {
                for dir in &dirs {
                    let path = dir.join(file_name);
                    let Ok(bytes) = std::fs::read(&path) else {
                        continue;
                    };
                    if self.load_font(variant, bytes).is_ok() {
                        log::debug!("loaded font {}", path.display());
                        loaded_any = true;
                        break;
                    }
                }
            }
            if loaded_any {
                return;
            }
        }
        log::warn!("no system font found; falling back to heuristic text metrics");
    }

    /// Load a TTF/OTF font from bytes for the given variant.
    pub fn load_font(&mut self, variant: FontVariant, bytes: Vec<u8>) -> Result<(), String> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("failed to parse font: {e}"))?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        self.fonts.insert(variant, data);
        Ok(())
    }

    /// Font data for a variant, falling back to the regular face.
    pub fn get(&self, variant: FontVariant) -> &FontData {
        self.fonts
            .get(&variant)
            .or_else(|| self.fonts.get(&FontVariant::REGULAR))
            .expect("regular face is always present")
    }

    /// Raw bytes of the best face for a variant, if a real font is loaded.
    pub fn face_bytes(&self, variant: FontVariant) -> Option<&[u8]> {
        let data = self.get(variant);
        if data.bytes.is_empty() {
            None
        } else {
            Some(&data.bytes)
        }
    }

    /// Measure the width of a string at a given font size (px).
    ///
    /// With real font bytes we sum glyph advances; otherwise an average
    /// character width heuristic (0.5 em, 0.55 em bold) keeps layout stable.
    pub fn measure_text_width(&self, text: &str, font_size: f32, variant: FontVariant) -> f32 {
        let data = self.get(variant);
        if data.bytes.is_empty() {
            let avg = if variant.bold { 0.55 } else { 0.5 };
            return text.chars().count() as f32 * font_size * avg;
        }
        if let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) {
            let scale = font_size / data.units_per_em;
            let mut width = 0.0f32;
            for ch in text.chars() {
                match face.glyph_index(ch) {
                    Some(gid) => {
                        width += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
                    }
                    None => width += font_size * 0.5,
                }
            }
            width
        } else {
            text.chars().count() as f32 * font_size * 0.5
        }
    }

    /// Ascender in px for a variant at a font size.
    pub fn ascender_px(&self, font_size: f32, variant: FontVariant) -> f32 {
        let data = self.get(variant);
        data.ascender * font_size / data.units_per_em
    }

    /// True if real font bytes are available for glyph outlines.
    pub fn has_real_fonts(&self) -> bool {
        !self.get(FontVariant::REGULAR).bytes.is_empty()
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::with_system_fonts()
    }
}

/// Word-wrap text to fit within `max_width` px. Returns at least one line.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    variant: FontVariant,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in &words {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            let w = fonts.measure_text_width(&candidate, font_size, variant);
            if w > max_width && !current.is_empty() {
                lines.push(current);
                current = word.to_string();
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::new();
        let w = mgr.measure_text_width("Hello", 16.0, FontVariant::REGULAR);
        // 5 chars × 16 × 0.5
        assert!((w - 40.0).abs() < 0.1);
    }

    #[test]
    fn bold_heuristic_is_wider() {
        let mgr = FontManager::new();
        let bold = FontVariant {
            bold: true,
            italic: false,
        };
        let w_regular = mgr.measure_text_width("Hello", 16.0, FontVariant::REGULAR);
        let w_bold = mgr.measure_text_width("Hello", 16.0, bold);
        assert!(w_bold > w_regular);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::new();
        let lines = wrap_text(
            "Hello world foo bar",
            16.0,
            FontVariant::REGULAR,
            60.0,
            &mgr,
        );
        assert!(lines.len() >= 2, "Expected wrapping, got {lines:?}");
    }

    #[test]
    fn wrap_preserves_all_words() {
        let mgr = FontManager::new();
        let text = "one two three four five six";
        let lines = wrap_text(text, 16.0, FontVariant::REGULAR, 80.0, &mgr);
        let joined = lines.join(" ");
        for word in text.split_whitespace() {
            assert!(joined.contains(word));
        }
    }
}
