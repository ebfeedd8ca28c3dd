//! HTML parser – converts a CV page's HTML into a simple DOM tree.
//!
//! We support the controlled subset of elements a rendered CV actually uses:
//! - Structural: div, section, p, h1-h3, ul, ol, li, img, br
//! - Inline: span, a
//! - Attributes of interest: `id`, `class`, `style`, `src`
//!
//! `<script>` and `<style>` elements are parsed as raw text and dropped, so a
//! full saved page can be fed in unmodified.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of a supported element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    Section,
    P,
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Span,
    A,
    Img,
    Br,
    Body,
    Html,
    Head,
    Script,
    Style,
    /// Catch-all for unknown tags – kept in the tree and treated as divs.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "div" => Tag::Div,
            "section" => Tag::Section,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "span" => Tag::Span,
            "a" => Tag::A,
            "img" => Tag::Img,
            "br" => Tag::Br,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            "script" => Tag::Script,
            "style" => Tag::Style,
            _ => Tag::Unknown(s.to_string()),
        }
    }

    /// Canonical lowercase name, used by selectors and serialization.
    pub fn name(&self) -> &str {
        match self {
            Tag::Div => "div",
            Tag::Section => "section",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Span => "span",
            Tag::A => "a",
            Tag::Img => "img",
            Tag::Br => "br",
            Tag::Body => "body",
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Script => "script",
            Tag::Style => "style",
            Tag::Unknown(s) => s.as_str(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Tag::Span | Tag::A)
    }

    /// Void elements never carry children.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Img | Tag::Br)
    }

    /// Raw-text elements whose content is not markup.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Script | Tag::Style)
    }
}

/// A node in the DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").map(|s| s.as_str())
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| *c == class)
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }

    /// Append a `property: value` pair to the element's inline style, so it
    /// wins over class-derived styling the way an inline override would.
    pub fn push_inline_style(&mut self, property: &str, value: &str) {
        let entry = self.attributes.entry("style".to_string()).or_default();
        if !entry.is_empty() && !entry.trim_end().ends_with(';') {
            entry.push(';');
        }
        entry.push_str(property);
        entry.push(':');
        entry.push_str(value);
    }
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over the HTML subset
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes.
///
/// Hand-written parser for the constrained input; a full HTML5 parser would
/// be overkill for the controlled pages this crate consumes.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_inter_element_whitespace();
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            // Doctype / processing instruction
            while !self.eof() && !self.starts_with(">") {
                self.advance(1);
            }
            if !self.eof() {
                self.advance(1);
            }
            return None;
        }
        if self.starts_with("<") {
            Some(self.parse_element())
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        while !self.eof() && !self.starts_with("<") {
            self.advance(1);
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> DomNode {
        self.advance(1); // '<'
        let tag = Tag::from_name(&self.parse_name());
        let mut elem = ElementNode::new(tag.clone());

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute();
            elem.attributes.insert(key, value);
        }

        if self.starts_with("/>") {
            self.advance(2);
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance(1);
        }
        if tag.is_void() {
            return DomNode::Element(elem);
        }

        if tag.is_raw_text() {
            // Consume verbatim up to the matching close tag; the content is
            // intentionally discarded.
            let close = format!("</{}", tag.name());
            while !self.eof() && !self.starts_with_ci(&close) {
                self.advance(1);
            }
            self.consume_close_tag();
            return DomNode::Element(elem);
        }

        elem.children = self.parse_nodes();
        self.consume_close_tag();
        DomNode::Element(elem)
    }

    fn consume_close_tag(&mut self) {
        if self.starts_with("</") {
            self.advance(2);
            self.parse_name();
            self.skip_whitespace();
            if self.starts_with(">") {
                self.advance(1);
            }
        }
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1);
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.starts_with_char(quote) {
                self.advance(1);
                let start = self.pos;
                while !self.eof() && !self.starts_with_char(quote) {
                    self.advance(1);
                }
                let val = self.input[start..self.pos].to_string();
                if !self.eof() {
                    self.advance(1);
                }
                return decode_entities(&val);
            }
        }
        // Unquoted value
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' || c == '/' {
                break;
            }
            self.advance(1);
        }
        self.input[start..self.pos].to_string()
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    /// Skip runs of pure whitespace between elements, but keep whitespace
    /// that belongs to mixed text content.
    fn skip_inter_element_whitespace(&mut self) {
        let saved = self.pos;
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn skip_comment(&mut self) {
        self.advance(4); // <!--
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(3);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn starts_with_ci(&self, s: &str) -> bool {
        let rest = &self.input.as_bytes()[self.pos..];
        rest.len() >= s.len() && rest[..s.len()].eq_ignore_ascii_case(s.as_bytes())
    }

    fn starts_with_char(&self, c: char) -> bool {
        self.input[self.pos..].starts_with(c)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
}

// ---------------------------------------------------------------------------
// Tree queries
// ---------------------------------------------------------------------------

/// Find the element with the given `id` anywhere in the tree.
pub fn find_by_id<'a>(nodes: &'a [DomNode], id: &str) -> Option<&'a ElementNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.id() == Some(id) {
                return Some(e);
            }
            if let Some(found) = find_by_id(&e.children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Unwrap `<html><body>` wrappers and return the body's children, or the
/// input nodes unchanged if no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

/// Serialize a tree back to HTML. Used by the print fallback so the
/// sanitized snapshot can be handed to a native print path.
pub fn to_html(nodes: &[DomNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(t) => out.push_str(&encode_entities(t)),
        DomNode::Element(e) => {
            out.push('<');
            out.push_str(e.tag.name());
            let mut attrs: Vec<(&String, &String)> = e.attributes.iter().collect();
            attrs.sort_by_key(|(k, _)| k.as_str());
            for (k, v) in attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                out.push_str(&encode_entities(v));
                out.push('"');
            }
            if e.tag.is_void() {
                out.push_str(" />");
                return;
            }
            out.push('>');
            for child in &e.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(e.tag.name());
            out.push('>');
        }
    }
}

fn encode_entities(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_section_with_classes() {
        let html = r#"<section id="about-section" class="py-12 bg-white"><p>Hi</p></section>"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Section);
            assert_eq!(e.id(), Some("about-section"));
            assert!(e.has_class("py-12"));
            assert_eq!(e.children.len(), 1);
        } else {
            panic!("Expected element");
        }
    }

    #[test]
    fn parse_void_img() {
        let html = r#"<img src="avatar.png" class="rounded">"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Img);
            assert_eq!(e.src(), Some("avatar.png"));
            assert!(e.children.is_empty());
        } else {
            panic!("Expected img element");
        }
    }

    #[test]
    fn script_content_is_discarded() {
        let html = r#"<div><script>if (a < b) { alert("<p>"); }</script><p>Kept</p></div>"#;
        let nodes = parse_html(html);
        if let DomNode::Element(div) = &nodes[0] {
            assert_eq!(div.children.len(), 2);
            if let DomNode::Element(script) = &div.children[0] {
                assert_eq!(script.tag, Tag::Script);
                assert!(script.children.is_empty());
            } else {
                panic!("Expected script element");
            }
        } else {
            panic!("Expected div");
        }
    }

    #[test]
    fn find_container_by_id() {
        let html = r#"<html><body><div id="cv-content"><p>CV</p></div></body></html>"#;
        let nodes = parse_html(html);
        let found = find_by_id(&nodes, "cv-content");
        assert!(found.is_some());
        assert_eq!(found.unwrap().tag, Tag::Div);
        assert!(find_by_id(&nodes, "missing").is_none());
    }

    #[test]
    fn body_children_unwraps_page() {
        let html = r#"<!DOCTYPE html><html><head></head><body><section>A</section></body></html>"#;
        let nodes = parse_html(html);
        let body = body_children(&nodes);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn push_inline_style_appends() {
        let mut e = ElementNode::new(Tag::Div);
        e.attributes
            .insert("style".to_string(), "color: red".to_string());
        e.push_inline_style("padding-top", "0.2rem");
        assert_eq!(e.inline_style(), Some("color: red;padding-top:0.2rem"));
    }

    #[test]
    fn roundtrip_simple_tree() {
        let html = r#"<div class="a"><p>Hello <span>world</span></p><br /></div>"#;
        let nodes = parse_html(html);
        let out = to_html(&nodes);
        assert!(out.contains("<span>world</span>"));
        assert!(out.contains("<br />"));
    }
}
