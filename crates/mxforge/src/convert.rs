//! Component→XML converter: turns typed components into complete dialect
//! documents.
//!
//! Non-connector components are emitted in input order, connectors always
//! after them, so readers of the output can assume endpoint cells appear
//! before the edges that reference them.

use crate::canonical;
use crate::catalog::{self, LAYER_ID};
use crate::component::{
    CardShape, Component, ConnectorShape, ConnectorStyle, ListShape, NodeCommon, ProcessShape,
    Routing, ShapeStyle, TableShape, TextStyle, TimelineShape, UmlClassShape,
};
use crate::dom::Element;
use crate::style::{StyleMap, fmt_number};
use tracing::debug;

/// Serializes a component list into a complete enveloped document.
pub fn components_to_xml(components: &[Component]) -> String {
    debug!(count = components.len(), "serializing components to diagram XML");
    let mut model = canonical::model_skeleton();
    if let Some(root) = model.child_mut("root") {
        for component in components.iter().filter(|c| !c.is_connector()) {
            root.children.push(component_to_cell(component));
        }
        for component in components.iter().filter(|c| c.is_connector()) {
            root.children.push(component_to_cell(component));
        }
    }
    canonical::enveloped(model).to_xml()
}

/// Builds the cell element for one component.
pub fn component_to_cell(component: &Component) -> Element {
    match component {
        Component::Connector(edge) => connector_cell(edge),
        vertex => vertex_cell(vertex),
    }
}

/// The cell element for one component, serialized on its own.
pub fn component_to_cell_xml(component: &Component) -> String {
    component_to_cell(component).to_xml()
}

fn vertex_cell(component: &Component) -> Element {
    let fallback = NodeCommon::default();
    let common = component.common().unwrap_or(&fallback);

    let mut cell = Element::new("mxCell").with_attr("id", common.id.clone());
    if let Some(label) = vertex_label(component) {
        cell.set_attr("value", label);
    }
    cell.set_attr("style", vertex_style(component));
    cell.set_attr("vertex", "1");
    if matches!(component, Component::Group(_)) {
        cell.set_attr("connectable", "0");
    }
    cell.set_attr("parent", common.parent_or_layer());

    let (default_w, default_h) = catalog::default_size(component);
    let mut geometry = Element::new("mxGeometry");
    if let Some(x) = common.x {
        geometry.set_attr("x", fmt_number(x));
    }
    if let Some(y) = common.y {
        geometry.set_attr("y", fmt_number(y));
    }
    geometry.set_attr("width", fmt_number(common.width.unwrap_or(default_w)));
    geometry.set_attr("height", fmt_number(common.height.unwrap_or(default_h)));
    geometry.set_attr("as", "geometry");
    cell.with_child(geometry)
}

/// Style string for a vertex: kind base fragment, field-driven extras, the
/// two shared bags, then the constant trailing tokens.
fn vertex_style(component: &Component) -> String {
    let mut style = StyleMap::parse(&catalog::base_style(component));
    match component {
        Component::RoundedRectangle(s) => {
            if let Some(radius) = s.corner_radius {
                style.set("arcSize", fmt_number(radius));
            }
        }
        Component::Swimlane(s) => {
            if let Some(height) = s.title_height {
                style.set("startSize", fmt_number(height));
            }
        }
        Component::Image(s) => {
            style.set("image", s.href.clone());
        }
        _ => {}
    }
    if let Some(common) = component.common() {
        apply_shape_style(&mut style, &common.shape_style);
        apply_text_style(&mut style, &common.text_style);
    }
    style.extend_from(catalog::TRAILING_STYLE);
    style.to_string()
}

pub(crate) fn apply_shape_style(style: &mut StyleMap, bag: &ShapeStyle) {
    if let Some(v) = &bag.fill_color {
        style.set("fillColor", v.clone());
    }
    if let Some(v) = &bag.stroke_color {
        style.set("strokeColor", v.clone());
    }
    if let Some(v) = bag.stroke_width {
        style.set("strokeWidth", fmt_number(v));
    }
    if let Some(v) = bag.opacity {
        style.set("opacity", fmt_number(v));
    }
    if let Some(v) = bag.shadow {
        style.set_bool("shadow", v);
    }
    if let Some(v) = bag.dashed {
        style.set_bool("dashed", v);
    }
}

pub(crate) fn apply_text_style(style: &mut StyleMap, bag: &TextStyle) {
    if let Some(v) = bag.font_size {
        style.set("fontSize", fmt_number(v));
    }
    if let Some(v) = &bag.font_family {
        style.set("fontFamily", v.clone());
    }
    if let Some(v) = &bag.font_color {
        style.set("fontColor", v.clone());
    }
    if let Some(bold) = bag.bold {
        style.set("fontStyle", if bold { "1" } else { "0" });
    }
    if let Some(v) = &bag.align {
        style.set("align", v.clone());
    }
    if let Some(v) = &bag.vertical_align {
        style.set("verticalAlign", v.clone());
    }
}

/// Label text per kind. Composites compose multi-line markup; the dialect
/// escaping happens once, at serialization.
fn vertex_label(component: &Component) -> Option<String> {
    use Component::*;
    match component {
        Rectangle(s) | Ellipse(s) | Diamond(s) | Hexagon(s) | Triangle(s) | Cylinder(s)
        | Parallelogram(s) | Trapezoid(s) | Step(s) | Note(s) | Text(s) | NetworkServer(s)
        | NetworkRouter(s) | NetworkSwitch(s) | NetworkFirewall(s) | Callout(s) | Actor(s)
        | Document(s) | Cloud(s) => s.label.clone(),
        RoundedRectangle(s) => s.label.clone(),
        Image(s) => s.label.clone(),
        Swimlane(s) => s.label.clone(),
        Group(s) => s.label.clone(),
        Aws(i) | Azure(i) | Gcp(i) => i.label.clone(),
        UmlClass(c) => Some(uml_label(c, false)),
        UmlInterface(c) => Some(uml_label(c, true)),
        UmlPackage(p) => Some(p.name.clone()),
        Card(c) => Some(card_label(c)),
        List(l) => Some(list_label(l)),
        Timeline(t) => Some(timeline_label(t)),
        Table(t) => Some(table_label(t)),
        Process(p) => process_label(p),
        Connector(_) => None,
    }
}

/// `«interface»` stereotype line, bold name, then `<hr>`-separated attribute
/// and method blocks. Both separators are always present when either block
/// has entries, so the parser can tell the blocks apart.
fn uml_label(shape: &UmlClassShape, interface: bool) -> String {
    let mut label = String::new();
    if interface {
        label.push_str("«interface»<br>");
    }
    label.push_str("<b>");
    label.push_str(&shape.name);
    label.push_str("</b>");
    if !shape.attributes.is_empty() || !shape.methods.is_empty() {
        label.push_str("<hr>");
        label.push_str(&shape.attributes.join("<br>"));
        label.push_str("<hr>");
        label.push_str(&shape.methods.join("<br>"));
    }
    label
}

fn card_label(card: &CardShape) -> String {
    match &card.subtitle {
        Some(subtitle) => format!(
            "<b>{}</b><br><font style=\"font-size: 10px;\">{subtitle}</font>",
            card.title
        ),
        None => format!("<b>{}</b>", card.title),
    }
}

fn list_label(list: &ListShape) -> String {
    let mut lines = Vec::new();
    if let Some(heading) = &list.label {
        lines.push(format!("<b>{heading}</b>"));
    }
    for (index, item) in list.items.iter().enumerate() {
        if list.ordered {
            lines.push(format!("{}. {item}", index + 1));
        } else {
            lines.push(format!("• {item}"));
        }
    }
    lines.join("<br>")
}

fn timeline_label(timeline: &TimelineShape) -> String {
    let mut lines = Vec::new();
    if let Some(heading) = &timeline.label {
        lines.push(heading.clone());
    }
    for event in &timeline.events {
        lines.push(format!("<b>{event}</b>"));
    }
    lines.join("<br>")
}

fn table_label(table: &TableShape) -> String {
    let mut out = String::new();
    if let Some(heading) = &table.label {
        out.push_str("<b>");
        out.push_str(heading);
        out.push_str("</b>");
    }
    out.push_str("<table border=\"1\" cellpadding=\"4\">");
    for row in &table.rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str("<td>");
            out.push_str(cell);
            out.push_str("</td>");
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
    out
}

fn process_label(process: &ProcessShape) -> Option<String> {
    if process.steps.is_empty() {
        process.label.clone()
    } else {
        Some(process.steps.join(" → "))
    }
}

fn connector_cell(edge: &ConnectorShape) -> Element {
    let mut cell = Element::new("mxCell").with_attr("id", edge.id.clone());
    if let Some(label) = &edge.label {
        cell.set_attr("value", label.clone());
    }
    cell.set_attr("style", connector_style(&edge.style));
    cell.set_attr("edge", "1");
    cell.set_attr("parent", LAYER_ID);
    cell.set_attr("source", edge.source.clone());
    cell.set_attr("target", edge.target.clone());

    let mut geometry = Element::new("mxGeometry")
        .with_attr("relative", "1")
        .with_attr("as", "geometry");
    if !edge.waypoints.is_empty() {
        let mut array = Element::new("Array").with_attr("as", "points");
        for point in &edge.waypoints {
            array.children.push(
                Element::new("mxPoint")
                    .with_attr("x", fmt_number(point.x))
                    .with_attr("y", fmt_number(point.y)),
            );
        }
        geometry.children.push(array);
    }
    cell.with_child(geometry)
}

/// Edge style: routing token, explicit arrowheads (dialect defaults written
/// out), then the optional stroke/animation/anchor tokens.
pub(crate) fn connector_style(style: &ConnectorStyle) -> String {
    let mut map = StyleMap::new();
    match style.routing {
        Routing::Straight => {}
        Routing::Orthogonal => map.set("edgeStyle", "orthogonalEdgeStyle"),
        Routing::Curved => {
            map.set("edgeStyle", "orthogonalEdgeStyle");
            map.set("curved", "1");
        }
        Routing::EntityRelation => map.set("edgeStyle", "entityRelationEdgeStyle"),
    }
    map.set(
        "endArrow",
        style.end_arrow.clone().unwrap_or_else(|| "classic".into()),
    );
    map.set(
        "startArrow",
        style.start_arrow.clone().unwrap_or_else(|| "none".into()),
    );
    if let Some(v) = &style.stroke_color {
        map.set("strokeColor", v.clone());
    }
    if let Some(v) = style.stroke_width {
        map.set("strokeWidth", fmt_number(v));
    }
    if let Some(v) = style.dashed {
        map.set_bool("dashed", v);
    }
    if let Some(v) = style.animated {
        map.set_bool("flowAnimation", v);
    }
    if let Some(v) = style.exit_x {
        map.set("exitX", fmt_number(v));
    }
    if let Some(v) = style.exit_y {
        map.set("exitY", fmt_number(v));
    }
    if let Some(v) = style.entry_x {
        map.set("entryX", fmt_number(v));
    }
    if let Some(v) = style.entry_y {
        map.set("entryY", fmt_number(v));
    }
    map.set("html", "1");
    map.to_string()
}
