//! Style resolver – maps inline CSS and the Tailwind-like utility classes a
//! CV page uses onto a flat [`ComputedStyle`] consumed by the block layout.
//!
//! Resolution order per element: tag defaults → utility classes → inline
//! `style` attribute. Compaction overrides (see [`crate::snapshot`]) are
//! injected as inline styles, so they win automatically.

use crate::dom::{DomNode, ElementNode, Tag};

/// Root font size in px; `rem` values resolve against this.
pub const REM_PX: f32 = 16.0;

/// CSS px per millimetre at the 96 dpi reference resolution.
pub const PX_PER_MM: f32 = 96.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// sRGB color with alpha, all channels 0.0–1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Color { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.001
    }

    /// Parse `#rgb`, `#rrggbb`, or a small set of named colors.
    pub fn parse(s: &str) -> Option<Color> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            let expand = |c: u8| {
                let v = (c as char).to_digit(16)? as f32;
                Some(v * 17.0 / 255.0)
            };
            match hex.len() {
                3 => {
                    let b = hex.as_bytes();
                    return Some(Color::rgb(expand(b[0])?, expand(b[1])?, expand(b[2])?));
                }
                6 => {
                    let parse2 =
                        |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(|v| v as f32 / 255.0);
                    return Some(Color::rgb(parse2(0)?, parse2(2)?, parse2(4)?));
                }
                _ => return None,
            }
        }
        match s.to_ascii_lowercase().as_str() {
            "white" => Some(Color::WHITE),
            "black" => Some(Color::BLACK),
            "transparent" => Some(Color::TRANSPARENT),
            "gray" | "grey" => Some(Color::rgb(0.5, 0.5, 0.5)),
            "red" => Some(Color::rgb(1.0, 0.0, 0.0)),
            "blue" => Some(Color::rgb(0.0, 0.0, 1.0)),
            _ => None,
        }
    }
}

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,

    // Spacing (px)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    /// Vertical gap between block children (from `space-y-*` / `gap`).
    pub child_gap: f32,

    // Explicit sizing (px)
    pub width: Option<f32>,
    pub height: Option<f32>,

    // Typography (inherited)
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub line_height: f32,
    pub color: Color,
    pub text_align: TextAlign,

    // Background (not inherited)
    pub background_color: Color,

    /// Keep-together hint for grouped items. Carried through layout as a
    /// hint only; the rasterizer does not consult it.
    pub break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            child_gap: 0.0,
            width: None,
            height: None,
            font_size: REM_PX,
            bold: false,
            italic: false,
            line_height: 1.5,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            background_color: Color::TRANSPARENT,
            break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// Style for a child element: inherited properties carry over, the rest
    /// reset to their defaults.
    fn inherit_from(parent: &ComputedStyle) -> Self {
        Self {
            font_size: parent.font_size,
            bold: parent.bold,
            italic: parent.italic,
            line_height: parent.line_height,
            color: parent.color,
            text_align: parent.text_align,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Styled tree
// ---------------------------------------------------------------------------

/// A DOM node with its resolved style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        /// `src` for `<img>` elements.
        src: Option<String>,
        children: Vec<StyledNode>,
    },
    Text {
        text: String,
    },
}

/// Resolve styles for a DOM subtree.
pub fn build_styled_tree(nodes: &[DomNode], parent: Option<&ComputedStyle>) -> Vec<StyledNode> {
    let mut styled = Vec::new();
    for node in nodes {
        match node {
            DomNode::Text(text) => {
                if !text.trim().is_empty() {
                    styled.push(StyledNode::Text { text: text.clone() });
                }
            }
            DomNode::Element(e) => {
                if e.tag.is_raw_text() || e.tag == Tag::Head {
                    continue;
                }
                let style = resolve_style(e, parent);
                let children = build_styled_tree(&e.children, Some(&style));
                styled.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    src: e.src().map(|s| s.to_string()),
                    children,
                });
            }
        }
    }
    styled
}

/// Resolve the computed style of one element.
pub fn resolve_style(elem: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = match parent {
        Some(p) => ComputedStyle::inherit_from(p),
        None => ComputedStyle::default(),
    };

    apply_tag_defaults(&elem.tag, &mut style);
    for class in elem.classes() {
        apply_class(class, &mut style);
    }
    if let Some(inline) = elem.inline_style() {
        apply_inline_style(inline, &mut style);
    }
    style
}

fn apply_tag_defaults(tag: &Tag, style: &mut ComputedStyle) {
    match tag {
        Tag::H1 => {
            style.font_size = 2.0 * REM_PX;
            style.bold = true;
            style.margin_top = 0.67 * style.font_size;
            style.margin_bottom = 0.67 * style.font_size;
            style.line_height = 1.2;
        }
        Tag::H2 => {
            style.font_size = 1.5 * REM_PX;
            style.bold = true;
            style.margin_top = 0.83 * style.font_size;
            style.margin_bottom = 0.83 * style.font_size;
            style.line_height = 1.25;
        }
        Tag::H3 => {
            style.font_size = 1.17 * REM_PX;
            style.bold = true;
            style.margin_top = style.font_size;
            style.margin_bottom = style.font_size;
            style.line_height = 1.3;
        }
        Tag::P => {
            style.margin_top = REM_PX;
            style.margin_bottom = REM_PX;
        }
        Tag::Ul | Tag::Ol => {
            style.margin_top = REM_PX;
            style.margin_bottom = REM_PX;
            style.padding_left = 2.5 * REM_PX;
        }
        Tag::Span | Tag::A => {
            style.display = Display::Inline;
        }
        _ => {}
    }
}

/// Tailwind spacing scale: one unit = 0.25 rem.
fn spacing_px(units: &str) -> Option<f32> {
    units.parse::<f32>().ok().map(|n| n * 0.25 * REM_PX)
}

fn apply_class(class: &str, style: &mut ComputedStyle) {
    // Spacing utilities with a numeric suffix.
    if let Some((prefix, rest)) = class.rsplit_once('-') {
        if let Some(px) = spacing_px(rest) {
            match prefix {
                "p" => {
                    style.padding_top = px;
                    style.padding_right = px;
                    style.padding_bottom = px;
                    style.padding_left = px;
                }
                "px" => {
                    style.padding_left = px;
                    style.padding_right = px;
                }
                "py" => {
                    style.padding_top = px;
                    style.padding_bottom = px;
                }
                "pt" => style.padding_top = px,
                "pb" => style.padding_bottom = px,
                "pl" => style.padding_left = px,
                "pr" => style.padding_right = px,
                "m" => {
                    style.margin_top = px;
                    style.margin_right = px;
                    style.margin_bottom = px;
                    style.margin_left = px;
                }
                "mx" => {
                    style.margin_left = px;
                    style.margin_right = px;
                }
                "my" => {
                    style.margin_top = px;
                    style.margin_bottom = px;
                }
                "mt" => style.margin_top = px,
                "mb" => style.margin_bottom = px,
                "ml" => style.margin_left = px,
                "mr" => style.margin_right = px,
                "space-y" => style.child_gap = px,
                "gap" => style.child_gap = px,
                "w" => style.width = Some(px),
                "h" => style.height = Some(px),
                _ => {}
            }
        }
    }

    match class {
        "font-bold" | "font-semibold" | "font-medium" => style.bold = true,
        "font-normal" => style.bold = false,
        "italic" => style.italic = true,
        "hidden" => style.display = Display::None,
        "text-center" => style.text_align = TextAlign::Center,
        "text-left" => style.text_align = TextAlign::Left,
        "text-right" => style.text_align = TextAlign::Right,
        "text-xs" => style.font_size = 0.75 * REM_PX,
        "text-sm" => style.font_size = 0.875 * REM_PX,
        "text-base" => style.font_size = REM_PX,
        "text-lg" => style.font_size = 1.125 * REM_PX,
        "text-xl" => style.font_size = 1.25 * REM_PX,
        "text-2xl" => style.font_size = 1.5 * REM_PX,
        "text-3xl" => style.font_size = 1.875 * REM_PX,
        "text-4xl" => style.font_size = 2.25 * REM_PX,
        "bg-white" => style.background_color = Color::WHITE,
        "bg-gray-50" => style.background_color = Color::rgb(0.98, 0.98, 0.98),
        "bg-gray-100" => style.background_color = Color::rgb(0.95, 0.96, 0.96),
        "bg-gray-200" => style.background_color = Color::rgb(0.90, 0.91, 0.92),
        "text-white" => style.color = Color::WHITE,
        "text-gray-500" => style.color = Color::rgb(0.42, 0.45, 0.50),
        "text-gray-600" => style.color = Color::rgb(0.29, 0.33, 0.39),
        "text-gray-700" => style.color = Color::rgb(0.22, 0.25, 0.32),
        "text-gray-800" => style.color = Color::rgb(0.12, 0.16, 0.22),
        "text-gray-900" => style.color = Color::rgb(0.07, 0.09, 0.15),
        "text-blue-600" => style.color = Color::rgb(0.15, 0.39, 0.92),
        "w-full" => style.width = None,
        _ => {}
    }
}

/// Apply a raw inline `style` attribute string.
pub fn apply_inline_style(inline: &str, style: &mut ComputedStyle) {
    for decl in inline.split(';') {
        let Some((prop, value)) = decl.split_once(':') else {
            continue;
        };
        apply_property(prop.trim(), value.trim(), style);
    }
}

/// Apply a single CSS declaration. Also the entry point for compaction
/// overrides, which arrive as individual (property, value) pairs.
pub fn apply_property(prop: &str, value: &str, style: &mut ComputedStyle) {
    let px = || parse_length(value);
    match prop.to_ascii_lowercase().as_str() {
        "padding" => {
            if let Some(v) = px() {
                style.padding_top = v;
                style.padding_right = v;
                style.padding_bottom = v;
                style.padding_left = v;
            }
        }
        "padding-top" => style.padding_top = px().unwrap_or(style.padding_top),
        "padding-right" => style.padding_right = px().unwrap_or(style.padding_right),
        "padding-bottom" => style.padding_bottom = px().unwrap_or(style.padding_bottom),
        "padding-left" => style.padding_left = px().unwrap_or(style.padding_left),
        "margin" => {
            if let Some(v) = px() {
                style.margin_top = v;
                style.margin_right = v;
                style.margin_bottom = v;
                style.margin_left = v;
            }
        }
        "margin-top" => style.margin_top = px().unwrap_or(style.margin_top),
        "margin-right" => style.margin_right = px().unwrap_or(style.margin_right),
        "margin-bottom" => style.margin_bottom = px().unwrap_or(style.margin_bottom),
        "margin-left" => style.margin_left = px().unwrap_or(style.margin_left),
        "gap" => style.child_gap = px().unwrap_or(style.child_gap),
        "width" => style.width = px(),
        "height" => style.height = px(),
        "font-size" => style.font_size = px().unwrap_or(style.font_size),
        "font-weight" => {
            style.bold = matches!(value, "bold" | "bolder" | "600" | "700" | "800" | "900")
        }
        "font-style" => style.italic = value.eq_ignore_ascii_case("italic"),
        "line-height" => {
            if let Ok(factor) = value.parse::<f32>() {
                style.line_height = factor;
            } else if let Some(v) = px() {
                style.line_height = v / style.font_size.max(1.0);
            }
        }
        "color" => {
            if let Some(c) = Color::parse(value) {
                style.color = c;
            }
        }
        "background" | "background-color" => {
            if let Some(c) = Color::parse(value) {
                style.background_color = c;
            }
        }
        "display" => {
            style.display = match value {
                "none" => Display::None,
                "inline" | "inline-block" => Display::Inline,
                _ => Display::Block,
            }
        }
        "text-align" => {
            style.text_align = match value {
                "center" => TextAlign::Center,
                "right" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "break-inside" | "page-break-inside" => {
            style.break_inside_avoid = value.eq_ignore_ascii_case("avoid");
        }
        _ => {}
    }
}

/// Parse a CSS length into px. Supports `px`, `rem`, `em` (against the root
/// size), `mm`, and bare numbers (treated as px).
pub fn parse_length(value: &str) -> Option<f32> {
    let v = value.trim();
    if v == "0" {
        return Some(0.0);
    }
    if let Some(n) = v.strip_suffix("px") {
        return n.trim().parse().ok();
    }
    if let Some(n) = v.strip_suffix("rem") {
        return n.trim().parse::<f32>().ok().map(|x| x * REM_PX);
    }
    if let Some(n) = v.strip_suffix("em") {
        return n.trim().parse::<f32>().ok().map(|x| x * REM_PX);
    }
    if let Some(n) = v.strip_suffix("mm") {
        return n.trim().parse::<f32>().ok().map(|x| x * PX_PER_MM);
    }
    v.parse().ok()
}
