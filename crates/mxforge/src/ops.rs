//! Structured edit-operation executor.
//!
//! A batch of [`DiagramOperation`]s is applied strictly in input order
//! against a freshly parsed document. The batch is all-or-nothing: the first
//! failing operation aborts with an [`OperationError`] and no XML is
//! returned, so partial application is never observable to the caller.

use crate::canonical;
use crate::catalog::{LAYER_ID, ROOT_ID};
use crate::component::{Component, ConnectorShape, ConnectorStyle, Point};
use crate::convert;
use crate::dom::{Element, QuickXmlCodec, XmlCodec};
use crate::entities::{has_escaped_markup, has_markup_tags, normalize_breaks, unescape_once};
use crate::error::{OperationError, ParseError, Result};
use crate::style::{StyleMap, fmt_number};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Geometry patch for `updateCell` and `addCell`. Absent fields leave the
/// current value in place.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CellGeometry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<bool>,
}

/// One structured edit, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiagramOperation {
    /// Replaces an edge's geometry with the given fixed endpoints and
    /// waypoints.
    #[serde(rename_all = "camelCase")]
    SetEdgePoints {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_point: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_point: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        waypoints: Option<Vec<Point>>,
    },
    /// Sets a cell's text value. `escape: false` stores the value verbatim,
    /// skipping the markup rule.
    SetCellValue {
        id: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        escape: Option<bool>,
    },
    /// Updates any of a cell's value, style string, or geometry.
    UpdateCell {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        geometry: Option<CellGeometry>,
    },
    /// Adds a raw cell. Fails if the id already exists or the declared
    /// parent does not.
    AddCell {
        id: String,
        parent: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vertex: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        edge: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        geometry: Option<CellGeometry>,
    },
    /// Removes the named cell. A no-op when the id does not exist.
    DeleteCell { id: String },
    /// Adds a typed component through the converter. Fails on id collision.
    AddComponent { component: Component },
    /// Updates a component's geometry, text, and recognized style keys.
    /// Unrecognized style keys are preserved.
    #[serde(rename_all = "camelCase")]
    UpdateComponent {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill_color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke_color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke_width: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opacity: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_size: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shadow: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dashed: Option<bool>,
    },
    /// Creates a connector between two existing components. Fails if either
    /// endpoint or the new id does not resolve.
    ConnectComponents {
        id: String,
        source: String,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<ConnectorStyle>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        waypoints: Option<Vec<Point>>,
    },
}

/// Applies a batch of operations and returns the new document on success.
pub fn apply_diagram_ops(xml: &str, ops: &[DiagramOperation]) -> Result<String> {
    apply_with_codec(&QuickXmlCodec, xml, ops)
}

pub(crate) fn apply_with_codec(
    codec: &dyn XmlCodec,
    xml: &str,
    ops: &[DiagramOperation],
) -> Result<String> {
    debug!(count = ops.len(), "applying diagram operations");
    let wrapped = canonical::wrap_in_envelope(xml);
    let mut doc = codec.parse(&wrapped)?;
    for op in ops {
        let root = canonical::model_root_mut(&mut doc)
            .ok_or_else(|| ParseError::new("document has no root container element", 1))?;
        apply_one(root, op)?;
    }
    Ok(codec.serialize(&doc))
}

fn apply_one(root: &mut Element, op: &DiagramOperation) -> Result<()> {
    match op {
        DiagramOperation::SetEdgePoints {
            id,
            source_point,
            target_point,
            waypoints,
        } => set_edge_points(
            root,
            id,
            *source_point,
            *target_point,
            waypoints.as_deref(),
        )?,
        DiagramOperation::SetCellValue { id, value, escape } => {
            let cell = find_cell_mut(root, id).ok_or_else(|| OperationError::CellNotFound {
                op: "setCellValue",
                id: id.clone(),
            })?;
            if escape.unwrap_or(true) {
                assign_value(cell, value);
            } else {
                // The caller vouches for the escaping. The value is taken as
                // already-escaped attribute text, so undo one level before
                // storing decoded text and the serializer restores it as-is.
                let slot = value_slot(cell);
                cell.set_attr(slot, unescape_once(value).into_owned());
            }
        }
        DiagramOperation::UpdateCell {
            id,
            value,
            style,
            geometry,
        } => {
            let cell = find_cell_mut(root, id).ok_or_else(|| OperationError::CellNotFound {
                op: "updateCell",
                id: id.clone(),
            })?;
            {
                let inner = style_cell_mut(cell);
                if let Some(style) = style {
                    inner.set_attr("style", style.clone());
                }
                if let Some(patch) = geometry {
                    merge_geometry(inner, patch);
                }
            }
            if let Some(value) = value {
                assign_value(cell, value);
            }
        }
        DiagramOperation::AddCell {
            id,
            parent,
            value,
            style,
            vertex,
            edge,
            source,
            target,
            geometry,
        } => {
            if find_cell(root, id).is_some() {
                return Err(OperationError::IdCollision {
                    op: "addCell",
                    id: id.clone(),
                }
                .into());
            }
            if !parent_resolves(root, parent) {
                return Err(OperationError::UnknownParent {
                    id: id.clone(),
                    parent: parent.clone(),
                }
                .into());
            }
            let mut cell = Element::new("mxCell").with_attr("id", id.clone());
            if let Some(style) = style {
                cell.set_attr("style", style.clone());
            }
            if vertex.unwrap_or(false) {
                cell.set_attr("vertex", "1");
            }
            if edge.unwrap_or(false) {
                cell.set_attr("edge", "1");
            }
            if let Some(source) = source {
                cell.set_attr("source", source.clone());
            }
            if let Some(target) = target {
                cell.set_attr("target", target.clone());
            }
            cell.set_attr("parent", parent.clone());
            if let Some(patch) = geometry {
                merge_geometry(&mut cell, patch);
            }
            if let Some(value) = value {
                assign_value(&mut cell, value);
            }
            root.children.push(cell);
        }
        DiagramOperation::DeleteCell { id } => {
            remove_cell(root, id);
        }
        DiagramOperation::AddComponent { component } => {
            let id = component.id();
            if !id.is_empty() && find_cell(root, id).is_some() {
                return Err(OperationError::IdCollision {
                    op: "addComponent",
                    id: id.to_owned(),
                }
                .into());
            }
            root.children.push(convert::component_to_cell(component));
        }
        DiagramOperation::UpdateComponent {
            id,
            x,
            y,
            width,
            height,
            label,
            title,
            text,
            fill_color,
            stroke_color,
            stroke_width,
            opacity,
            font_size,
            font_color,
            shadow,
            dashed,
        } => {
            let cell = find_cell_mut(root, id).ok_or_else(|| OperationError::CellNotFound {
                op: "updateComponent",
                id: id.clone(),
            })?;
            {
                let inner = style_cell_mut(cell);
                let patch = CellGeometry {
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                    relative: None,
                };
                if patch != CellGeometry::default() {
                    merge_geometry(inner, &patch);
                }

                let mut map = StyleMap::parse(inner.attr("style").unwrap_or_default());
                if let Some(v) = fill_color {
                    map.set("fillColor", v.clone());
                }
                if let Some(v) = stroke_color {
                    map.set("strokeColor", v.clone());
                }
                if let Some(v) = stroke_width {
                    map.set("strokeWidth", fmt_number(*v));
                }
                if let Some(v) = opacity {
                    map.set("opacity", fmt_number(*v));
                }
                if let Some(v) = font_size {
                    map.set("fontSize", fmt_number(*v));
                }
                if let Some(v) = font_color {
                    map.set("fontColor", v.clone());
                }
                if let Some(v) = shadow {
                    map.set_bool("shadow", *v);
                }
                if let Some(v) = dashed {
                    map.set_bool("dashed", *v);
                }
                if !map.is_empty() {
                    inner.set_attr("style", map.to_string());
                }
            }
            if let Some(text) = label
                .as_deref()
                .or(title.as_deref())
                .or(text.as_deref())
            {
                assign_value(cell, text);
            }
        }
        DiagramOperation::ConnectComponents {
            id,
            source,
            target,
            label,
            style,
            waypoints,
        } => {
            if find_cell(root, id).is_some() {
                return Err(OperationError::IdCollision {
                    op: "connectComponents",
                    id: id.clone(),
                }
                .into());
            }
            for endpoint in [source, target] {
                if find_cell(root, endpoint).is_none() {
                    return Err(OperationError::MissingEndpoint {
                        id: id.clone(),
                        endpoint: endpoint.clone(),
                    }
                    .into());
                }
            }
            let connector = ConnectorShape {
                id: id.clone(),
                source: source.clone(),
                target: target.clone(),
                label: label.clone(),
                style: style.clone().unwrap_or_default(),
                waypoints: waypoints.clone().unwrap_or_default(),
            };
            root.children
                .push(convert::component_to_cell(&Component::Connector(connector)));
        }
    }
    Ok(())
}

fn set_edge_points(
    root: &mut Element,
    id: &str,
    source_point: Option<Point>,
    target_point: Option<Point>,
    waypoints: Option<&[Point]>,
) -> Result<()> {
    let cell = find_cell_mut(root, id).ok_or_else(|| OperationError::CellNotFound {
        op: "setEdgePoints",
        id: id.to_owned(),
    })?;
    let cell = style_cell_mut(cell);
    if !matches!(cell.attr("edge"), Some("1") | Some("true")) {
        return Err(OperationError::NotAnEdge {
            op: "setEdgePoints",
            id: id.to_owned(),
        }
        .into());
    }

    cell.children.retain(|child| child.name != "mxGeometry");
    let mut geometry = Element::new("mxGeometry").with_attr("relative", "1");
    if let Some(point) = source_point {
        geometry
            .children
            .push(point_element(point).with_attr("as", "sourcePoint"));
    }
    if let Some(point) = target_point {
        geometry
            .children
            .push(point_element(point).with_attr("as", "targetPoint"));
    }
    if let Some(points) = waypoints
        && !points.is_empty()
    {
        let mut array = Element::new("Array").with_attr("as", "points");
        for point in points {
            array.children.push(point_element(*point));
        }
        geometry.children.push(array);
    }
    geometry.set_attr("as", "geometry");
    cell.children.push(geometry);
    Ok(())
}

fn point_element(point: Point) -> Element {
    Element::new("mxPoint")
        .with_attr("x", fmt_number(point.x))
        .with_attr("y", fmt_number(point.y))
}

/// Applies the markup rule, then stores the value. If the incoming text
/// carries markup-like tags, pre-escaped markup, or the style already
/// declares `html=1`, the style is made to declare it, line breaks become
/// `<br>`, and exactly one un-escape pass keeps repeated edits from
/// compounding entity escapes.
fn assign_value(cell: &mut Element, raw: &str) {
    let style_html = {
        let inner = style_cell_mut(cell);
        StyleMap::parse(inner.attr("style").unwrap_or_default()).get("html") == Some("1")
    };
    let wants_markup = has_markup_tags(raw) || has_escaped_markup(raw) || style_html;
    let slot = value_slot(cell);
    if !wants_markup {
        cell.set_attr(slot, raw);
        return;
    }
    let stored = unescape_once(&normalize_breaks(raw)).into_owned();
    cell.set_attr(slot, stored);
    let inner = style_cell_mut(cell);
    let mut map = StyleMap::parse(inner.attr("style").unwrap_or_default());
    if map.get("html") != Some("1") {
        map.set("html", "1");
        inner.set_attr("style", map.to_string());
    }
}

/// The attribute that carries a cell's text: `label` on object wrappers,
/// `value` on plain cells.
fn value_slot(cell: &Element) -> &'static str {
    if cell.name == "object" { "label" } else { "value" }
}

/// Style and geometry live on the inner cell of an object wrapper.
fn style_cell_mut(cell: &mut Element) -> &mut Element {
    if cell.name == "object"
        && let Some(idx) = cell.children.iter().position(|c| c.name == "mxCell")
    {
        return &mut cell.children[idx];
    }
    cell
}

fn is_cell_element(el: &Element) -> bool {
    matches!(el.name.as_str(), "mxCell" | "object")
}

fn find_cell<'a>(root: &'a Element, id: &str) -> Option<&'a Element> {
    root.find(|el| is_cell_element(el) && el.attr("id") == Some(id))
}

fn find_cell_mut<'a>(root: &'a mut Element, id: &str) -> Option<&'a mut Element> {
    root.find_mut(|el| is_cell_element(el) && el.attr("id") == Some(id))
}

fn parent_resolves(root: &Element, parent: &str) -> bool {
    parent == ROOT_ID || parent == LAYER_ID || find_cell(root, parent).is_some()
}

fn remove_cell(el: &mut Element, id: &str) -> bool {
    if let Some(idx) = el
        .children
        .iter()
        .position(|c| is_cell_element(c) && c.attr("id") == Some(id))
    {
        el.children.remove(idx);
        return true;
    }
    for child in &mut el.children {
        if remove_cell(child, id) {
            return true;
        }
    }
    false
}

fn merge_geometry(cell: &mut Element, patch: &CellGeometry) {
    let geometry = geometry_mut(cell);
    if let Some(x) = patch.x {
        geometry.set_attr("x", fmt_number(x));
    }
    if let Some(y) = patch.y {
        geometry.set_attr("y", fmt_number(y));
    }
    if let Some(width) = patch.width {
        geometry.set_attr("width", fmt_number(width));
    }
    if let Some(height) = patch.height {
        geometry.set_attr("height", fmt_number(height));
    }
    match patch.relative {
        Some(true) => geometry.set_attr("relative", "1"),
        Some(false) => {
            geometry.remove_attr("relative");
        }
        None => {}
    }
}

fn geometry_mut(cell: &mut Element) -> &mut Element {
    if let Some(idx) = cell.children.iter().position(|c| c.name == "mxGeometry") {
        return &mut cell.children[idx];
    }
    cell.children
        .push(Element::new("mxGeometry").with_attr("as", "geometry"));
    let last = cell.children.len() - 1;
    &mut cell.children[last]
}
