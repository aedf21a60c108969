//! Canonicalization helpers: closing truncated streaming XML and wrapping
//! fragments in the full document envelope.

use crate::catalog::{LAYER_ID, ROOT_ID};
use crate::dom::Element;
use crate::entities::escape_xml;
use regex::Regex;
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Matches one open, close or self-closing tag; quoted values may contain '>'.
    RE.get_or_init(|| {
        Regex::new(r#"<(/?)([A-Za-z][A-Za-z0-9_]*)(?:"[^"]*"|'[^']*'|[^>])*>"#)
            .expect("valid regex")
    })
}

fn geometry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<mxGeometry(?:"[^"]*"|[^>])*(?:/>|>.*?</mxGeometry>)"#)
            .expect("valid regex")
    })
}

/// Closes tags left open by a truncated stream.
///
/// A trailing half-open tag (`<mxCel` with no `>`) is dropped. A trailing
/// cell that was opened but never closed and has no complete geometry child
/// is omitted entirely rather than emitted as an invalid fragment; once a
/// cell has its geometry it is closed in place.
pub fn close_streaming_xml(partial: &str) -> String {
    let mut text = partial.trim_end().to_owned();

    // Drop a dangling tag fragment after the last complete '>'.
    if let Some(lt) = text.rfind('<')
        && !text[lt..].contains('>')
    {
        text.truncate(lt);
        text.truncate(text.trim_end().len());
    }

    let mut stack = open_tag_stack(&text);

    // Trailing open cells without a complete geometry child are dropped,
    // innermost first; everything opened inside them goes too.
    while let Some(idx) = stack.iter().rposition(|(name, _)| name == "mxCell") {
        let (_, start) = stack[idx];
        if geometry_regex().is_match(&text[start..]) {
            break;
        }
        text.truncate(start);
        text.truncate(text.trim_end().len());
        stack.truncate(idx);
    }

    for (name, _) in stack.iter().rev() {
        text.push_str(&format!("</{name}>"));
    }
    text
}

/// Open tags (name, byte offset) still unclosed at end of input, outermost
/// first.
pub(crate) fn open_tag_stack(text: &str) -> Vec<(String, usize)> {
    let mut stack: Vec<(String, usize)> = Vec::new();
    for m in tag_regex().find_iter(text) {
        let tag = m.as_str();
        let closing = tag.starts_with("</");
        let self_closing = tag.ends_with("/>");
        let name = tag
            .trim_start_matches("</")
            .trim_start_matches('<')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect::<String>();
        if closing {
            if let Some(at) = stack.iter().rposition(|(open, _)| *open == name) {
                stack.truncate(at);
            }
        } else if !self_closing {
            stack.push((name, m.start()));
        }
    }
    stack
}

fn model_element() -> Element {
    Element::new("mxGraphModel")
        .with_attr("dx", "1422")
        .with_attr("dy", "794")
        .with_attr("grid", "1")
        .with_attr("gridSize", "10")
        .with_attr("guides", "1")
        .with_attr("tooltips", "1")
        .with_attr("connect", "1")
        .with_attr("arrows", "1")
        .with_attr("fold", "1")
        .with_attr("page", "1")
        .with_attr("pageScale", "1")
        .with_attr("pageWidth", "850")
        .with_attr("pageHeight", "1100")
        .with_attr("math", "0")
        .with_attr("shadow", "0")
}

fn diagram_element() -> Element {
    Element::new("diagram")
        .with_attr("id", "diagram-1")
        .with_attr("name", "Page-1")
}

fn mxfile_element() -> Element {
    Element::new("mxfile").with_attr("host", "app.diagrams.net")
}

pub fn reserved_cells() -> (Element, Element) {
    (
        Element::new("mxCell").with_attr("id", ROOT_ID),
        Element::new("mxCell")
            .with_attr("id", LAYER_ID)
            .with_attr("parent", ROOT_ID),
    )
}

/// A graph model skeleton: `mxGraphModel > root` with the two reserved cells.
pub fn model_skeleton() -> Element {
    let (root_cell, layer_cell) = reserved_cells();
    model_element().with_child(
        Element::new("root")
            .with_child(root_cell)
            .with_child(layer_cell),
    )
}

/// Wraps a graph model element in the `mxfile > diagram` envelope.
pub fn enveloped(model: Element) -> Element {
    mxfile_element().with_child(diagram_element().with_child(model))
}

/// The minimal valid document: envelope plus the two reserved cells.
pub fn empty_diagram() -> String {
    enveloped(model_skeleton()).to_xml()
}

fn open_tag(el: &Element) -> String {
    let mut out = format!("<{}", el.name);
    for (key, value) in &el.attrs {
        out.push_str(&format!(" {key}=\"{}\"", escape_xml(value)));
    }
    out.push('>');
    out
}

/// Wraps a fragment in the full document envelope.
///
/// Documents already carrying the envelope pass through unchanged. A bare
/// `mxGraphModel` gains `mxfile > diagram`; a bare `root` additionally gains
/// the model element; loose cells gain everything including the reserved
/// cells (unless the fragment already defines the root cell).
pub fn wrap_in_envelope(fragment: &str) -> String {
    let trimmed = fragment.trim();
    if trimmed.contains("<mxfile") {
        return trimmed.to_owned();
    }

    let file_open = open_tag(&mxfile_element());
    let diagram_open = open_tag(&diagram_element());
    if trimmed.contains("<mxGraphModel") {
        return format!(
            "{file_open}\n  {diagram_open}\n{trimmed}\n  </diagram>\n</mxfile>"
        );
    }

    let model_open = open_tag(&model_element());
    if trimmed.contains("<root") {
        return format!(
            "{file_open}\n  {diagram_open}\n    {model_open}\n{trimmed}\n    </mxGraphModel>\n  </diagram>\n</mxfile>"
        );
    }

    let reserved = if trimmed.contains(r#"id="0""#) {
        String::new()
    } else {
        let (root_cell, layer_cell) = reserved_cells();
        format!("{}\n        {}\n        ", root_cell.to_xml(), layer_cell.to_xml())
    };
    format!(
        "{file_open}\n  {diagram_open}\n    {model_open}\n      <root>\n        {reserved}{trimmed}\n      </root>\n    </mxGraphModel>\n  </diagram>\n</mxfile>"
    )
}

/// The `mxGraphModel` element of a parsed document, whether the document is
/// enveloped or starts at the model.
pub fn graph_model(doc: &Element) -> Option<&Element> {
    doc.find(|el| el.name == "mxGraphModel")
}

pub fn graph_model_mut(doc: &mut Element) -> Option<&mut Element> {
    doc.find_mut(|el| el.name == "mxGraphModel")
}

/// The `root` cell container of a parsed document.
pub fn model_root(doc: &Element) -> Option<&Element> {
    graph_model(doc)?.child("root")
}

pub fn model_root_mut(doc: &mut Element) -> Option<&mut Element> {
    graph_model_mut(doc)?.child_mut("root")
}
