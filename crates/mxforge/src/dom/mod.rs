//! Generic XML element tree for the mxGraph dialect.
//!
//! The tree is deliberately schema-free: validation and repair must be able
//! to observe defects (nested cells, unknown tags) that a typed model would
//! reject at parse time. Typed components are built on top by `parse`.

mod quick;

pub use quick::QuickXmlCodec;

use crate::entities::escape_xml;
use crate::error::ParseError;
use indexmap::IndexMap;
use std::fmt;

/// Tag names the dialect understands, in canonical casing.
pub const VOCABULARY: [&str; 10] = [
    "mxfile",
    "diagram",
    "mxGraphModel",
    "root",
    "mxCell",
    "mxGeometry",
    "mxPoint",
    "mxRectangle",
    "Array",
    "object",
];

/// Looks up the canonical casing for a tag, matching case-insensitively.
pub fn canonical_tag(name: &str) -> Option<&'static str> {
    VOCABULARY
        .iter()
        .find(|tag| tag.eq_ignore_ascii_case(name))
        .copied()
}

/// One XML element: a name, ordered attributes, child elements and any
/// directly contained character data.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        self.attrs.shift_remove(key)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Pre-order walk over this element and every descendant.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// First element in document order matching `pred`, including `self`.
    pub fn find<F>(&self, pred: F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool + Copy,
    {
        self.descendants().find(|el| pred(el))
    }

    /// Mutable counterpart of [`Element::find`].
    pub fn find_mut<F>(&mut self, pred: F) -> Option<&mut Element>
    where
        F: Fn(&Element) -> bool + Copy,
    {
        if pred(self) {
            return Some(self);
        }
        for child in &mut self.children {
            if let Some(found) = child.find_mut(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Serializes the subtree with two-space indentation, attributes in
    /// insertion order and all text escaped. Output is deterministic for a
    /// given tree.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out, 0);
        out
    }

    fn write_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_xml(value));
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        if self.children.is_empty() {
            out.push_str(&escape_xml(&self.text));
        } else {
            if !self.text.is_empty() {
                out.push_str(&escape_xml(&self.text));
            }
            for child in &self.children {
                out.push('\n');
                child.write_into(out, depth + 1);
            }
            out.push('\n');
            out.push_str(&indent);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Parsing and serialization seam.
///
/// The engine ships [`QuickXmlCodec`] and takes any other implementation for
/// callers that need to intercept or instrument the XML layer.
pub trait XmlCodec: fmt::Debug + Send + Sync {
    /// Parses a complete document into its root element.
    fn parse(&self, xml: &str) -> Result<Element, ParseError>;

    /// Serializes an element tree back to XML text.
    fn serialize(&self, element: &Element) -> String {
        element.to_xml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new("root")
            .with_child(Element::new("mxCell").with_attr("id", "0"))
            .with_child(
                Element::new("mxCell")
                    .with_attr("id", "1")
                    .with_attr("parent", "0"),
            )
    }

    #[test]
    fn serializes_deterministically_with_indentation() {
        let xml = sample().to_xml();
        assert_eq!(
            xml,
            "<root>\n  <mxCell id=\"0\" />\n  <mxCell id=\"1\" parent=\"0\" />\n</root>"
        );
    }

    #[test]
    fn escapes_attribute_values() {
        let el = Element::new("mxCell").with_attr("value", "a < b & \"c\"");
        assert_eq!(
            el.to_xml(),
            "<mxCell value=\"a &lt; b &amp; &quot;c&quot;\" />"
        );
    }

    #[test]
    fn descendants_walk_in_document_order() {
        let tree = sample();
        let names: Vec<&str> = tree.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["root", "mxCell", "mxCell"]);
        let ids: Vec<&str> = tree.descendants().filter_map(|e| e.attr("id")).collect();
        assert_eq!(ids, ["0", "1"]);
    }

    #[test]
    fn canonical_tag_fixes_case() {
        assert_eq!(canonical_tag("MXCELL"), Some("mxCell"));
        assert_eq!(canonical_tag("mxgraphmodel"), Some("mxGraphModel"));
        assert_eq!(canonical_tag("svg"), None);
    }

    #[test]
    fn find_mut_reaches_nested_elements() {
        let mut tree = sample();
        let cell = tree
            .find_mut(|e| e.attr("id") == Some("1"))
            .unwrap();
        cell.set_attr("value", "edited");
        assert_eq!(
            tree.find(|e| e.attr("id") == Some("1")).unwrap().attr("value"),
            Some("edited")
        );
    }
}
