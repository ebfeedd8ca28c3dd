//! Snapshot preparer – clones the exportable subtree, strips `no-print`
//! elements, applies the layout-compaction overrides, and frames the clone
//! at the fixed print width.
//!
//! Compaction is a declarative list of `(selector, property, value)` rules
//! applied to the clone as inline-style overrides. The source tree is never
//! mutated; the clone is owned by the pipeline and dropped when the run
//! ends, whatever the outcome.

use serde::{Deserialize, Serialize};

use crate::dom::{find_by_id, DomNode, ElementNode};
use crate::error::{ExportError, Result};

/// Classes whose elements are excluded from the export entirely.
pub const NO_PRINT_CLASS: &str = "no-print";

/// Grouped items that should stay together across page boundaries. The mark
/// is a hint carried into the styled tree; the rasterizer does not consult
/// it directly.
pub const BREAK_AVOID_CLASSES: &[&str] = &[
    "work-experience-item",
    "education-item",
    "certification-item",
];

/// One layout-compaction override: `selector { property: value }` applied to
/// every matching element in the clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionRule {
    pub selector: String,
    pub property: String,
    pub value: String,
}

impl CompactionRule {
    pub fn new(selector: &str, property: &str, value: &str) -> Self {
        Self {
            selector: selector.to_string(),
            property: property.to_string(),
            value: value.to_string(),
        }
    }
}

/// The built-in compaction set: collapse section chrome so multi-page output
/// keeps related fields together.
pub fn default_rules() -> Vec<CompactionRule> {
    let r = CompactionRule::new;
    vec![
        // Sections lose their screen padding almost entirely.
        r("section", "padding-top", "0.2rem"),
        r("section", "padding-bottom", "0.2rem"),
        r("section", "margin-top", "0"),
        r("section", "margin-bottom", "0"),
        r("section", "padding-left", "1rem"),
        r("section", "padding-right", "1rem"),
        // Headings tighten up.
        r("h2", "margin-top", "0.2rem"),
        r("h2", "margin-bottom", "0.2rem"),
        // About section is the densest block on the page.
        r("#about-section", "padding-top", "0.15rem"),
        r("#about-section", "padding-bottom", "0.1rem"),
        r("#about-section", "margin-bottom", "0"),
        r("#about-section p", "margin-top", "0.15rem"),
        r("#about-section p", "margin-bottom", "0.15rem"),
        // Item boxes.
        r(".work-experience-item", "padding", "0.4rem"),
        r(".work-experience-item", "margin-bottom", "0.25rem"),
        r(".education-item", "padding", "0.4rem"),
        r(".education-item", "margin-bottom", "0.25rem"),
        // Spacing containers collapse their inter-item gaps.
        r(".space-y-8", "gap", "0"),
        r(".space-y-6", "gap", "0"),
        // Outer width containers.
        r(".max-w-7xl", "padding-top", "0.2rem"),
        r(".max-w-7xl", "padding-bottom", "0.2rem"),
        r(".max-w-7xl", "padding-left", "1rem"),
        r(".max-w-7xl", "padding-right", "1rem"),
        // White card boxes.
        r(".bg-white", "padding", "0.5rem"),
        r(".bg-white", "margin-bottom", "0.2rem"),
        r("#about-section .bg-white", "margin-bottom", "0"),
        // Common utility spacings.
        r(".mb-6", "margin-bottom", "0.2rem"),
        r(".pb-4", "padding-bottom", "0.1rem"),
        r(".mt-4", "margin-top", "0.2rem"),
    ]
}

/// Parse a compaction-rule file (a JSON array of rules).
pub fn rules_from_json(json: &str) -> Result<Vec<CompactionRule>> {
    serde_json::from_str(json).map_err(|e| ExportError::InvalidRules(e.to_string()))
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum SimpleSelector {
    Tag(String),
    Class(String),
    Id(String),
}

impl SimpleSelector {
    fn parse(part: &str) -> Result<Self> {
        if let Some(class) = part.strip_prefix('.') {
            if class.is_empty() {
                return Err(ExportError::InvalidRules(format!("empty class in `{part}`")));
            }
            Ok(SimpleSelector::Class(class.to_string()))
        } else if let Some(id) = part.strip_prefix('#') {
            if id.is_empty() {
                return Err(ExportError::InvalidRules(format!("empty id in `{part}`")));
            }
            Ok(SimpleSelector::Id(id.to_string()))
        } else {
            Ok(SimpleSelector::Tag(part.to_ascii_lowercase()))
        }
    }

    fn matches(&self, elem: &ElementNode) -> bool {
        match self {
            SimpleSelector::Tag(t) => elem.tag.name() == t,
            SimpleSelector::Class(c) => elem.has_class(c),
            SimpleSelector::Id(i) => elem.id() == Some(i.as_str()),
        }
    }
}

/// A parsed selector: one simple selector, or a descendant chain.
#[derive(Debug, Clone)]
struct Selector {
    parts: Vec<SimpleSelector>,
}

impl Selector {
    fn parse(s: &str) -> Result<Self> {
        let parts: Result<Vec<_>> = s.split_whitespace().map(SimpleSelector::parse).collect();
        let parts = parts?;
        if parts.is_empty() {
            return Err(ExportError::InvalidRules("empty selector".to_string()));
        }
        Ok(Selector { parts })
    }

    /// `ancestors` is the element's ancestor chain from the snapshot root
    /// downwards. The final part must match the element itself; the earlier
    /// parts must match ancestors in document order.
    fn matches(&self, elem: &ElementNode, ancestors: &[AncestorKey]) -> bool {
        let (last, rest) = match self.parts.split_last() {
            Some(split) => split,
            None => return false,
        };
        if !last.matches(elem) {
            return false;
        }
        let mut i = 0;
        for anc in ancestors {
            if i < rest.len() && anc.matches(&rest[i]) {
                i += 1;
            }
        }
        i == rest.len()
    }
}

/// Ancestor descriptor captured during traversal, so matching never needs to
/// hold a borrow on the mutable tree.
struct AncestorKey {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
}

impl AncestorKey {
    fn of(elem: &ElementNode) -> Self {
        Self {
            tag: elem.tag.name().to_string(),
            id: elem.id().map(|s| s.to_string()),
            classes: elem.classes().iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matches(&self, sel: &SimpleSelector) -> bool {
        match sel {
            SimpleSelector::Tag(t) => &self.tag == t,
            SimpleSelector::Class(c) => self.classes.iter().any(|x| x == c),
            SimpleSelector::Id(i) => self.id.as_deref() == Some(i.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Geometry of the staged print frame.
#[derive(Debug, Clone, Copy)]
pub struct PrintFrame {
    /// Frame width in millimetres (A4 width canonical).
    pub width_mm: f32,
    /// Inner padding in millimetres.
    pub padding_mm: f32,
}

impl Default for PrintFrame {
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            padding_mm: 10.0,
        }
    }
}

/// Options for snapshot preparation.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// `id` of the export container element.
    pub container_id: String,
    pub frame: PrintFrame,
    pub rules: Vec<CompactionRule>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            container_id: "cv-content".to_string(),
            frame: PrintFrame::default(),
            rules: default_rules(),
        }
    }
}

/// The prepared, owned clone of the exportable content.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub root: ElementNode,
    pub frame: PrintFrame,
}

impl Snapshot {
    /// Frame width in CSS px.
    pub fn width_px(&self) -> f32 {
        self.frame.width_mm * crate::style::PX_PER_MM
    }

    /// Serialize the sanitized clone back to HTML (print fallback).
    pub fn to_html(&self) -> String {
        crate::dom::to_html(&[DomNode::Element(self.root.clone())])
    }
}

/// Prepare a snapshot from a parsed document.
///
/// Looks up the container, deep-clones it, strips `no-print` subtrees,
/// marks break-avoid groups, applies the compaction rules, and frames the
/// clone for print. The input tree is left untouched.
pub fn prepare(nodes: &[DomNode], options: &SnapshotOptions) -> Result<Snapshot> {
    let source = find_by_id(nodes, &options.container_id).ok_or_else(|| {
        ExportError::MissingContent {
            id: options.container_id.clone(),
        }
    })?;

    // Parse all selectors up front so a bad rule fails the run before any
    // partial application.
    let compiled: Result<Vec<(Selector, &CompactionRule)>> = options
        .rules
        .iter()
        .map(|rule| Selector::parse(&rule.selector).map(|sel| (sel, rule)))
        .collect();
    let compiled = compiled?;

    let mut clone = source.clone();

    strip_no_print(&mut clone);
    mark_break_avoid(&mut clone);

    let mut ancestors = Vec::new();
    for (selector, rule) in &compiled {
        apply_rule(&mut clone, selector, rule, &mut ancestors);
        debug_assert!(ancestors.is_empty());
    }

    // Print frame: the clone is staged at a fixed physical width on a white
    // background, exactly as it will be rasterized.
    clone.push_inline_style("background", "white");
    clone.push_inline_style("width", &format!("{}mm", options.frame.width_mm));
    clone.push_inline_style("padding", &format!("{}mm", options.frame.padding_mm));

    log::debug!(
        "prepared snapshot of #{} ({} compaction rules)",
        options.container_id,
        compiled.len()
    );

    Ok(Snapshot {
        root: clone,
        frame: options.frame,
    })
}

fn strip_no_print(elem: &mut ElementNode) {
    elem.children.retain(|child| match child {
        DomNode::Element(e) => !e.has_class(NO_PRINT_CLASS),
        DomNode::Text(_) => true,
    });
    for child in &mut elem.children {
        if let DomNode::Element(e) = child {
            strip_no_print(e);
        }
    }
}

fn mark_break_avoid(elem: &mut ElementNode) {
    if BREAK_AVOID_CLASSES.iter().any(|c| elem.has_class(c)) {
        elem.push_inline_style("break-inside", "avoid");
    }
    for child in &mut elem.children {
        if let DomNode::Element(e) = child {
            mark_break_avoid(e);
        }
    }
}

fn apply_rule(
    elem: &mut ElementNode,
    selector: &Selector,
    rule: &CompactionRule,
    ancestors: &mut Vec<AncestorKey>,
) {
    if selector.matches(elem, ancestors) {
        elem.push_inline_style(&rule.property, &rule.value);
    }
    ancestors.push(AncestorKey::of(elem));
    for child in &mut elem.children {
        if let DomNode::Element(e) = child {
            apply_rule(e, selector, rule, ancestors);
        }
    }
    ancestors.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    const PAGE: &str = r##"
        <div id="cv-content">
            <section id="about-section" class="py-12">
                <div class="bg-white"><p>About me</p></div>
            </section>
            <section>
                <div class="work-experience-item bg-white"><p>Job</p></div>
            </section>
            <button class="no-print">Download PDF</button>
        </div>
    "##;

    #[test]
    fn missing_container_is_an_error() {
        let nodes = parse_html("<div id=\"other\"></div>");
        let err = prepare(&nodes, &SnapshotOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::MissingContent { .. }));
    }

    #[test]
    fn no_print_elements_are_stripped() {
        let nodes = parse_html(PAGE);
        let snap = prepare(&nodes, &SnapshotOptions::default()).unwrap();
        let html = snap.to_html();
        assert!(!html.contains("no-print"));
        assert!(!html.contains("Download PDF"));
        assert!(html.contains("About me"));
    }

    #[test]
    fn source_tree_is_untouched() {
        let nodes = parse_html(PAGE);
        let before = nodes.clone();
        let _ = prepare(&nodes, &SnapshotOptions::default()).unwrap();
        assert_eq!(nodes, before);
    }

    #[test]
    fn break_avoid_groups_are_marked() {
        let nodes = parse_html(PAGE);
        let snap = prepare(&nodes, &SnapshotOptions::default()).unwrap();
        let html = snap.to_html();
        assert!(html.contains("break-inside:avoid"));
    }

    #[test]
    fn descendant_selector_scopes_to_ancestor() {
        let nodes = parse_html(PAGE);
        let rules = vec![CompactionRule::new(
            "#about-section .bg-white",
            "margin-bottom",
            "0",
        )];
        let opts = SnapshotOptions {
            rules,
            ..SnapshotOptions::default()
        };
        let snap = prepare(&nodes, &opts).unwrap();
        let html = snap.to_html();
        // Only the about-section card gets the override, not the work item.
        let hits = html.matches("margin-bottom:0").count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn print_frame_is_applied_to_root() {
        let nodes = parse_html(PAGE);
        let snap = prepare(&nodes, &SnapshotOptions::default()).unwrap();
        let style = snap.root.inline_style().unwrap_or_default();
        assert!(style.contains("width:210mm"));
        assert!(style.contains("padding:10mm"));
        assert!((snap.width_px() - 210.0 * crate::style::PX_PER_MM).abs() < 0.01);
    }

    #[test]
    fn rules_parse_from_json() {
        let json = r#"[{"selector": "section", "property": "padding-top", "value": "0.2rem"}]"#;
        let rules = rules_from_json(json).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].selector, "section");
        assert!(rules_from_json("not json").is_err());
    }

    #[test]
    fn bad_selector_is_rejected() {
        let nodes = parse_html(PAGE);
        let opts = SnapshotOptions {
            rules: vec![CompactionRule::new(".", "padding", "0")],
            ..SnapshotOptions::default()
        };
        assert!(matches!(
            prepare(&nodes, &opts),
            Err(ExportError::InvalidRules(_))
        ));
    }

    #[test]
    fn repeated_preparation_is_identical() {
        let nodes = parse_html(PAGE);
        let a = prepare(&nodes, &SnapshotOptions::default()).unwrap();
        let b = prepare(&nodes, &SnapshotOptions::default()).unwrap();
        assert_eq!(a.to_html(), b.to_html());
    }
}
