#![forbid(unsafe_code)]

//! Headless engine for the mxGraph diagram XML dialect (the draw.io file
//! format): a typed component model, a bidirectional converter between
//! components and XML, a structured edit-operation executor, a structural
//! validator, and a heuristic auto-repair pipeline for malformed,
//! model-generated XML.
//!
//! Design goals:
//! - bit-exact wire format: the output renders in draw.io unchanged
//! - deterministic, testable outputs (stable attribute and token order)
//! - no I/O: every entry point is a pure function over its input string
//!
//! The common paths are available as free functions; [`Engine`] bundles them
//! behind an injectable XML codec for hosts that bring their own parser.

pub mod autofix;
pub mod canonical;
pub mod catalog;
pub mod component;
pub mod convert;
pub mod dom;
pub mod entities;
pub mod error;
pub mod ops;
pub mod parse;
pub mod style;
pub mod validate;

#[cfg(test)]
mod tests;

pub use autofix::{FixReport, FixRule, repair_rules, run_repair_pipeline, validate_and_fix};
pub use canonical::{close_streaming_xml, empty_diagram, wrap_in_envelope};
pub use component::{
    Component, ConnectorShape, ConnectorStyle, DiagramAnalysis, NodeCommon, Point, Routing,
    ShapeStyle, TextStyle,
};
pub use convert::{component_to_cell_xml, components_to_xml};
pub use dom::{Element, QuickXmlCodec, XmlCodec};
pub use error::{
    Error, OperationError, ParseError, Result, StructuralViolation, ViolationCode,
};
pub use ops::{CellGeometry, DiagramOperation, apply_diagram_ops};
pub use parse::{resolve_child_relationships, xml_to_components};
pub use validate::validate_cell_structure;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Typed components plus a kind-count summary for one document.
pub fn analyze_diagram(xml: &str) -> Result<DiagramAnalysis> {
    Engine::new().analyze(xml)
}

/// Entry point bundling every engine operation behind one XML codec.
///
/// Cloning is cheap; the codec is shared.
#[derive(Debug, Clone)]
pub struct Engine {
    codec: Arc<dyn XmlCodec>,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            codec: Arc::new(QuickXmlCodec),
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given codec for all parsing and serialization.
    pub fn with_codec(codec: Arc<dyn XmlCodec>) -> Self {
        Self { codec }
    }

    /// Serializes typed components into a complete enveloped document.
    pub fn components_to_xml(&self, components: &[Component]) -> String {
        convert::components_to_xml(components)
    }

    /// Decodes every cell of the document into typed components.
    pub fn xml_to_components(&self, xml: &str) -> Result<Vec<Component>> {
        let doc = self.codec.parse(xml)?;
        Ok(parse::components_from_document(&doc))
    }

    /// Applies an all-or-nothing batch of edit operations.
    pub fn apply_operations(&self, xml: &str, ops: &[DiagramOperation]) -> Result<String> {
        ops::apply_with_codec(self.codec.as_ref(), xml, ops)
    }

    /// First violated structural invariant, or `None` for a sound document.
    pub fn validate(&self, xml: &str) -> Option<StructuralViolation> {
        validate::validate_with_codec(self.codec.as_ref(), xml)
    }

    /// Validates and, if invalid, runs the textual repair pipeline once.
    pub fn validate_and_fix(&self, xml: &str) -> FixReport {
        autofix::validate_and_fix(xml)
    }

    /// Completes a possibly streaming-truncated fragment and wraps it in the
    /// document envelope.
    pub fn canonicalize(&self, partial: &str) -> String {
        canonical::wrap_in_envelope(&canonical::close_streaming_xml(partial))
    }

    /// Typed components plus a textual summary counting components by kind.
    pub fn analyze(&self, xml: &str) -> Result<DiagramAnalysis> {
        let components = self.xml_to_components(xml)?;
        let summary = analysis_summary(&components);
        Ok(DiagramAnalysis {
            components,
            summary,
        })
    }
}

/// Stable one-line summary: total, then per-kind counts in descending count
/// order with ties broken lexicographically.
fn analysis_summary(components: &[Component]) -> String {
    if components.is_empty() {
        return "Diagram contains no components.".to_owned();
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for component in components {
        *counts.entry(component.kind_name()).or_default() += 1;
    }
    let mut entries: Vec<(&str, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let breakdown = entries
        .iter()
        .map(|(kind, n)| format!("{n} {kind}"))
        .collect::<Vec<_>>()
        .join(", ");
    let noun = if components.len() == 1 {
        "component"
    } else {
        "components"
    };
    format!(
        "Diagram contains {} {noun}: {breakdown}.",
        components.len()
    )
}
