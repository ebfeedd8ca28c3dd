//! Block-flow layout – positions the styled snapshot at the fixed print
//! width and flattens it into paint operations in document coordinates
//! (origin at the snapshot's top-left, CSS px).
//!
//! A CV page is a vertical stack of sections, so a simple top-down block
//! flow is all the rasterizer needs: blocks stack, inline runs are wrapped
//! into lines, images scale to fit the content width.

use std::collections::HashMap;

use crate::dom::Tag;
use crate::fonts::{wrap_text, FontManager, FontVariant};
use crate::style::{Color, Display, StyledNode, TextAlign};

/// Intrinsic pixel dimensions of settled images, keyed by `src`. Images
/// absent from the map (failed, timed out, hidden) occupy no space.
pub type ImageDims = HashMap<String, (u32, u32)>;

/// One drawing command for the rasterizer, in document px.
#[derive(Debug, Clone)]
pub enum PaintOp {
    /// Filled rectangle (box background).
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    },
    /// One line of text; `y` is the top of the line box.
    Text {
        x: f32,
        y: f32,
        text: String,
        font_size: f32,
        line_height: f32,
        variant: FontVariant,
        color: Color,
    },
    /// A settled image scaled into the given box.
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        src: String,
    },
}

/// The flattened document: paint ops plus overall pixel extent.
#[derive(Debug, Clone)]
pub struct LayoutResult {
    pub ops: Vec<PaintOp>,
    pub width: f32,
    pub height: f32,
}

/// Lay out a styled tree at `width` px.
pub fn layout(nodes: &[StyledNode], width: f32, fonts: &FontManager, images: &ImageDims) -> LayoutResult {
    let ctx = LayoutCtx { fonts, images };
    let mut ops = Vec::new();
    let mut y = 0.0f32;
    for node in nodes {
        y += flow_node(node, 0.0, y, width, &ctx, &mut ops);
    }
    LayoutResult {
        ops,
        width,
        height: y,
    }
}

struct LayoutCtx<'a> {
    fonts: &'a FontManager,
    images: &'a ImageDims,
}

/// Lay out one block-level node at `(x, y)` within `width`; returns the
/// vertical space consumed including the node's own margins.
fn flow_node(node: &StyledNode, x: f32, y: f32, width: f32, ctx: &LayoutCtx, ops: &mut Vec<PaintOp>) -> f32 {
    let StyledNode::Element { tag, style, src, children } = node else {
        // A stray text node at block level renders as an anonymous line.
        if let StyledNode::Text { text } = node {
            return flow_anonymous_text(text, x, y, width, ctx, ops);
        }
        return 0.0;
    };

    if style.display == Display::None {
        return 0.0;
    }
    if *tag == Tag::Br {
        return style.font_size * style.line_height;
    }

    let box_x = x + style.margin_left;
    let box_y = y + style.margin_top;
    let box_width = (width - style.margin_left - style.margin_right).max(0.0);

    let box_height = if *tag == Tag::Img {
        flow_image(src.as_deref(), style, box_x, box_y, box_width, ctx, ops)
    } else if is_inline_only(children) {
        flow_text_block(tag, style, children, box_x, box_y, box_width, ctx, ops)
    } else {
        flow_container(style, children, box_x, box_y, box_width, ctx, ops)
    };

    style.margin_top + box_height + style.margin_bottom
}

/// True when every child is inline content (text, spans, line breaks).
fn is_inline_only(children: &[StyledNode]) -> bool {
    !children.is_empty()
        && children.iter().all(|c| match c {
            StyledNode::Text { .. } => true,
            StyledNode::Element { tag, style, .. } => {
                tag.is_inline() || *tag == Tag::Br || style.display == Display::None
            }
        })
}

/// A block whose children are all inline: collect the text, wrap it, and
/// emit one op per line. Returns the border-box height.
fn flow_text_block(
    _tag: &Tag,
    style: &crate::style::ComputedStyle,
    children: &[StyledNode],
    x: f32,
    y: f32,
    width: f32,
    ctx: &LayoutCtx,
    ops: &mut Vec<PaintOp>,
) -> f32 {
    let content_x = x + style.padding_left;
    let content_width = (width - style.padding_left - style.padding_right).max(0.0);

    let text = collect_inline_text(children);
    let variant = FontVariant {
        bold: style.bold,
        italic: style.italic,
    };
    let lines = wrap_text(&text, style.font_size, variant, content_width, ctx.fonts);
    let line_height = style.font_size * style.line_height;
    let text_height = lines.len() as f32 * line_height;
    let box_height = style
        .height
        .unwrap_or(style.padding_top + text_height + style.padding_bottom);

    push_background(style, x, y, width, box_height, ops);

    let mut line_y = y + style.padding_top;
    for line in lines {
        if !line.is_empty() {
            let line_x = match style.text_align {
                TextAlign::Left => content_x,
                TextAlign::Center => {
                    let w = ctx.fonts.measure_text_width(&line, style.font_size, variant);
                    content_x + ((content_width - w) / 2.0).max(0.0)
                }
                TextAlign::Right => {
                    let w = ctx.fonts.measure_text_width(&line, style.font_size, variant);
                    content_x + (content_width - w).max(0.0)
                }
            };
            ops.push(PaintOp::Text {
                x: line_x,
                y: line_y,
                text: line,
                font_size: style.font_size,
                line_height,
                variant,
                color: style.color,
            });
        }
        line_y += line_height;
    }

    box_height
}

/// A block with block-level children: stack them vertically, honouring the
/// parent's `child_gap`. Returns the border-box height.
fn flow_container(
    style: &crate::style::ComputedStyle,
    children: &[StyledNode],
    x: f32,
    y: f32,
    width: f32,
    ctx: &LayoutCtx,
    ops: &mut Vec<PaintOp>,
) -> f32 {
    let content_x = x + style.padding_left;
    let content_width = (width - style.padding_left - style.padding_right).max(0.0);

    // Children are laid out into a side buffer so the background rect (whose
    // height depends on them) can be painted underneath.
    let mut child_ops = Vec::new();
    let mut cur_y = y + style.padding_top;
    let mut first = true;
    for child in children {
        if matches!(
            child,
            StyledNode::Element { style, .. } if style.display == Display::None
        ) {
            continue;
        }
        if !first {
            cur_y += style.child_gap;
        }
        let consumed = flow_node(child, content_x, cur_y, content_width, ctx, &mut child_ops);
        if consumed > 0.0 {
            first = false;
        }
        cur_y += consumed;
    }

    let box_height = style.height.unwrap_or((cur_y - y) + style.padding_bottom);
    push_background(style, x, y, width, box_height, ops);
    ops.extend(child_ops);
    box_height
}

/// An `<img>` element: scaled to its explicit size or to fit the content
/// width. An unsettled image occupies no space.
fn flow_image(
    src: Option<&str>,
    style: &crate::style::ComputedStyle,
    x: f32,
    y: f32,
    width: f32,
    ctx: &LayoutCtx,
    ops: &mut Vec<PaintOp>,
) -> f32 {
    let Some(src) = src else { return 0.0 };
    let Some(&(px_w, px_h)) = ctx.images.get(src) else {
        return 0.0;
    };
    if px_w == 0 || px_h == 0 {
        return 0.0;
    }

    let intrinsic_w = px_w as f32;
    let intrinsic_h = px_h as f32;
    let (draw_w, draw_h) = match (style.width, style.height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w * intrinsic_h / intrinsic_w),
        (None, Some(h)) => (h * intrinsic_w / intrinsic_h, h),
        (None, None) => {
            if intrinsic_w > width {
                (width, width * intrinsic_h / intrinsic_w)
            } else {
                (intrinsic_w, intrinsic_h)
            }
        }
    };

    ops.push(PaintOp::Image {
        x,
        y,
        width: draw_w,
        height: draw_h,
        src: src.to_string(),
    });
    draw_h
}

fn flow_anonymous_text(
    text: &str,
    x: f32,
    y: f32,
    width: f32,
    ctx: &LayoutCtx,
    ops: &mut Vec<PaintOp>,
) -> f32 {
    let style = crate::style::ComputedStyle::default();
    let variant = FontVariant::REGULAR;
    let lines = wrap_text(text.trim(), style.font_size, variant, width, ctx.fonts);
    let line_height = style.font_size * style.line_height;
    let mut line_y = y;
    for line in &lines {
        if !line.is_empty() {
            ops.push(PaintOp::Text {
                x,
                y: line_y,
                text: line.clone(),
                font_size: style.font_size,
                line_height,
                variant,
                color: style.color,
            });
        }
        line_y += line_height;
    }
    lines.len() as f32 * line_height
}

fn push_background(
    style: &crate::style::ComputedStyle,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    ops: &mut Vec<PaintOp>,
) {
    if !style.background_color.is_transparent() {
        ops.push(PaintOp::Rect {
            x,
            y,
            width,
            height,
            color: style.background_color,
        });
    }
}

/// Flatten an inline subtree into a single string. `<br>` becomes a newline;
/// nested spans contribute their text in order.
fn collect_inline_text(children: &[StyledNode]) -> String {
    let mut out = String::new();
    collect_into(children, &mut out);
    normalize_whitespace(&out)
}

fn collect_into(children: &[StyledNode], out: &mut String) {
    for child in children {
        match child {
            StyledNode::Text { text } => out.push_str(text),
            StyledNode::Element { tag, style, children, .. } => {
                if style.display == Display::None {
                    continue;
                }
                if *tag == Tag::Br {
                    out.push('\n');
                } else {
                    collect_into(children, out);
                }
            }
        }
    }
}

/// Collapse runs of spaces/tabs while preserving explicit newlines.
fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        if c == '\n' {
            while out.ends_with(' ') {
                out.pop();
            }
            out.push('\n');
            pending_space = false;
        } else if c.is_whitespace() {
            pending_space = !out.is_empty() && !out.ends_with('\n');
        } else {
            if pending_space {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::style::build_styled_tree;

    fn layout_html(html: &str, width: f32) -> LayoutResult {
        let nodes = parse_html(html);
        let styled = build_styled_tree(&nodes, None);
        let fonts = FontManager::new();
        layout(&styled, width, &fonts, &ImageDims::new())
    }

    #[test]
    fn paragraph_produces_text_ops_and_height() {
        let result = layout_html("<p>Hello world</p>", 600.0);
        assert!(result.height > 0.0);
        assert!(result
            .ops
            .iter()
            .any(|op| matches!(op, PaintOp::Text { text, .. } if text == "Hello world")));
    }

    #[test]
    fn blocks_stack_vertically() {
        let one = layout_html("<p>One</p>", 600.0);
        let two = layout_html("<p>One</p><p>Two</p>", 600.0);
        assert!(two.height > one.height);
    }

    #[test]
    fn hidden_elements_take_no_space() {
        let hidden = layout_html(r#"<div><p class="hidden">Gone</p></div>"#, 600.0);
        assert!(!hidden
            .ops
            .iter()
            .any(|op| matches!(op, PaintOp::Text { text, .. } if text == "Gone")));
    }

    #[test]
    fn background_rect_spans_children() {
        let result = layout_html(r#"<div class="bg-white p-4"><p>Boxed</p></div>"#, 600.0);
        let rect = result
            .ops
            .iter()
            .find_map(|op| match op {
                PaintOp::Rect { height, .. } => Some(*height),
                _ => None,
            })
            .expect("expected a background rect");
        assert!(rect > 16.0, "rect height {rect} should cover padding + text");
    }

    #[test]
    fn unsettled_image_collapses() {
        let result = layout_html(r#"<div><img src="missing.png"></div>"#, 600.0);
        assert!(!result
            .ops
            .iter()
            .any(|op| matches!(op, PaintOp::Image { .. })));
    }

    #[test]
    fn settled_image_scales_to_width() {
        let nodes = parse_html(r#"<div><img src="wide.png"></div>"#);
        let styled = build_styled_tree(&nodes, None);
        let fonts = FontManager::new();
        let mut dims = ImageDims::new();
        dims.insert("wide.png".to_string(), (1200, 600));
        let result = layout(&styled, 600.0, &fonts, &dims);
        let (w, h) = result
            .ops
            .iter()
            .find_map(|op| match op {
                PaintOp::Image { width, height, .. } => Some((*width, *height)),
                _ => None,
            })
            .expect("expected an image op");
        assert!((w - 600.0).abs() < 0.01);
        assert!((h - 300.0).abs() < 0.01);
    }

    #[test]
    fn child_gap_adds_space_between_items() {
        let without = layout_html("<div><p>A</p><p>B</p></div>", 600.0);
        let with = layout_html(r#"<div class="space-y-8"><p>A</p><p>B</p></div>"#, 600.0);
        assert!((with.height - without.height - 32.0).abs() < 0.01);
    }

    #[test]
    fn whitespace_normalization() {
        assert_eq!(normalize_whitespace("a   b \n c"), "a b\nc");
        assert_eq!(normalize_whitespace("  hi  "), "hi");
    }
}
