//! Structural validator: pure invariant checks over a parsed document.
//!
//! Checks run in a fixed priority order and the first violated invariant is
//! returned; later checks assume the earlier ones passed (duplicate ids would
//! make reference resolution ambiguous, so they are reported first).

use crate::catalog::{LAYER_ID, ROOT_ID};
use crate::dom::{Element, QuickXmlCodec, XmlCodec};
use crate::error::{StructuralViolation, ViolationCode};
use std::collections::HashSet;

/// Validates raw XML text. `None` means the document is structurally sound.
pub fn validate_cell_structure(xml: &str) -> Option<StructuralViolation> {
    validate_with_codec(&QuickXmlCodec, xml)
}

pub(crate) fn validate_with_codec(
    codec: &dyn XmlCodec,
    xml: &str,
) -> Option<StructuralViolation> {
    match codec.parse(xml) {
        Err(err) => Some(StructuralViolation::new(
            ViolationCode::MalformedXml,
            format!("document is not well-formed XML ({err})"),
            Vec::new(),
            "Fix the reported syntax error, or run the auto-fix pipeline and validate the repaired output.",
        )),
        Ok(doc) => validate_document(&doc),
    }
}

/// Validates an already-parsed document, checks 2–7.
pub(crate) fn validate_document(doc: &Element) -> Option<StructuralViolation> {
    check_nested_cells(doc)
        .or_else(|| check_duplicate_ids(doc))
        .or_else(|| check_missing_parents(doc))
        .or_else(|| check_parent_refs(doc))
        .or_else(|| check_edge_refs(doc))
        .or_else(|| check_waypoints(doc))
}

fn cells(doc: &Element) -> impl Iterator<Item = &Element> {
    doc.descendants().filter(|el| el.name == "mxCell")
}

/// Ids that parent/source/target references may resolve to: every cell id
/// plus the id of any object wrapper.
fn known_ids(doc: &Element) -> HashSet<&str> {
    doc.descendants()
        .filter(|el| el.name == "mxCell" || el.name == "object")
        .filter_map(|el| el.attr("id"))
        .collect()
}

fn check_nested_cells(doc: &Element) -> Option<StructuralViolation> {
    let mut offending = Vec::new();
    collect_nested(doc, false, &mut offending);
    if offending.is_empty() {
        return None;
    }
    Some(StructuralViolation::new(
        ViolationCode::NestedCell,
        "cell elements are nested inside another cell; containment is expressed only through the parent attribute",
        offending,
        "Move each inner cell out to the root container and set its parent attribute to the outer cell's id.",
    ))
}

fn collect_nested(el: &Element, inside_cell: bool, out: &mut Vec<String>) {
    for child in &el.children {
        let is_cell = child.name == "mxCell";
        if is_cell && inside_cell {
            out.push(child.attr("id").unwrap_or("?").to_owned());
        }
        collect_nested(child, inside_cell || is_cell, out);
    }
}

fn check_duplicate_ids(doc: &Element) -> Option<StructuralViolation> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for cell in cells(doc) {
        if let Some(id) = cell.attr("id")
            && !seen.insert(id)
            && !duplicates.iter().any(|d| d == id)
        {
            duplicates.push(id.to_owned());
        }
    }
    if duplicates.is_empty() {
        return None;
    }
    Some(StructuralViolation::new(
        ViolationCode::DuplicateId,
        format!("cell ids are not unique: [{}]", duplicates.join(", ")),
        duplicates,
        "Rename the duplicated cells so every id occurs exactly once in the document.",
    ))
}

fn check_missing_parents(doc: &Element) -> Option<StructuralViolation> {
    let offending: Vec<String> = cells(doc)
        .filter(|cell| {
            let id = cell.attr("id").unwrap_or_default();
            id != ROOT_ID && id != LAYER_ID && cell.attr("parent").is_none()
        })
        .map(|cell| cell.attr("id").unwrap_or("?").to_owned())
        .collect();
    if offending.is_empty() {
        return None;
    }
    Some(StructuralViolation::new(
        ViolationCode::MissingParent,
        format!(
            "cells without a parent attribute: [{}]",
            offending.join(", ")
        ),
        offending,
        "Give each cell a parent referencing an existing cell or the default layer \"1\".",
    ))
}

fn check_parent_refs(doc: &Element) -> Option<StructuralViolation> {
    let ids = known_ids(doc);
    let mut offending = Vec::new();
    let mut missing = Vec::new();
    for cell in cells(doc) {
        if let Some(parent) = cell.attr("parent")
            && !ids.contains(parent)
        {
            offending.push(cell.attr("id").unwrap_or("?").to_owned());
            if !missing.iter().any(|m| m == parent) {
                missing.push(parent.to_owned());
            }
        }
    }
    if offending.is_empty() {
        return None;
    }
    Some(StructuralViolation::new(
        ViolationCode::InvalidParentRef,
        format!(
            "parent references do not resolve: [{}]",
            missing.join(", ")
        ),
        offending,
        "Point each parent attribute at an existing cell id or the default layer \"1\".",
    ))
}

fn check_edge_refs(doc: &Element) -> Option<StructuralViolation> {
    let ids = known_ids(doc);
    let mut offending = Vec::new();
    let mut missing = Vec::new();
    for cell in cells(doc) {
        if !matches!(cell.attr("edge"), Some("1") | Some("true")) {
            continue;
        }
        for endpoint in ["source", "target"] {
            if let Some(reference) = cell.attr(endpoint)
                && !ids.contains(reference)
            {
                let id = cell.attr("id").unwrap_or("?").to_owned();
                if !offending.contains(&id) {
                    offending.push(id);
                }
                if !missing.iter().any(|m| m == reference) {
                    missing.push(reference.to_owned());
                }
            }
        }
    }
    if offending.is_empty() {
        return None;
    }
    Some(StructuralViolation::new(
        ViolationCode::InvalidEdgeRef,
        format!(
            "edge endpoints do not resolve: [{}]",
            missing.join(", ")
        ),
        offending,
        "Make each edge's source and target reference the id of an existing vertex cell.",
    ))
}

fn check_waypoints(doc: &Element) -> Option<StructuralViolation> {
    let mut offending = Vec::new();
    collect_bad_waypoints(doc, None, &mut offending);
    if offending.is_empty() {
        return None;
    }
    Some(StructuralViolation::new(
        ViolationCode::InvalidWaypoint,
        "point elements without a recognized positional role or waypoint container",
        offending,
        "Tag each point with as=\"sourcePoint\", as=\"targetPoint\" or as=\"offset\", or place it inside an Array with as=\"points\".",
    ))
}

fn collect_bad_waypoints(el: &Element, cell_id: Option<&str>, out: &mut Vec<String>) {
    let current = if el.name == "mxCell" {
        el.attr("id")
    } else {
        cell_id
    };
    for child in &el.children {
        if child.name == "mxPoint" {
            let has_role = matches!(
                child.attr("as"),
                Some("sourcePoint") | Some("targetPoint") | Some("offset")
            );
            let in_points = el.name == "Array" && el.attr("as") == Some("points");
            if !has_role && !in_points {
                let id = current.unwrap_or("?").to_owned();
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        collect_bad_waypoints(child, current, out);
    }
}
