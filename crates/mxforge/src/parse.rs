//! XML→component parser: classifies dialect cells back into typed
//! components, including container-children resolution.

use crate::canonical;
use crate::catalog::{self, LAYER_ID, ROOT_ID};
use crate::component::{
    CardShape, CloudIcon, Component, ConnectorShape, ConnectorStyle, GroupShape, ImageShape,
    ListShape, NodeCommon, Point, ProcessShape, RoundedShape, Routing, Shape, ShapeStyle,
    SwimlaneShape, TableShape, TextStyle, TimelineShape, UmlClassShape, UmlPackageShape,
};
use crate::dom::{Element, QuickXmlCodec, XmlCodec};
use crate::error::Result;
use crate::style::StyleMap;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Decodes a dialect document into typed components.
///
/// The two reserved cells are skipped; edges decode as connectors, vertices
/// have their kind inferred from the style signature.
pub fn xml_to_components(xml: &str) -> Result<Vec<Component>> {
    let doc = QuickXmlCodec.parse(xml)?;
    Ok(components_from_document(&doc))
}

pub(crate) fn components_from_document(doc: &Element) -> Vec<Component> {
    let Some(root) = canonical::model_root(doc) else {
        return Vec::new();
    };
    let mut components = Vec::new();
    for child in &root.children {
        let decoded = match child.name.as_str() {
            "mxCell" => decode_cell(child, None),
            // object wrappers carry id/label for the cell they contain
            "object" => child.child("mxCell").and_then(|c| decode_cell(c, Some(child))),
            _ => None,
        };
        components.extend(decoded);
    }
    resolve_child_relationships(&mut components);
    debug!(count = components.len(), "decoded components from diagram XML");
    components
}

/// Appends each component's id to its parent's derived `children` list when
/// the parent is a container kind. Must run after all components are decoded;
/// a single forward pass cannot resolve parents that appear later in the
/// list.
pub fn resolve_child_relationships(components: &mut [Component]) {
    let links: Vec<(String, String)> = components
        .iter()
        .filter_map(|component| {
            let common = component.common()?;
            let parent = common.parent.clone()?;
            Some((common.id.clone(), parent))
        })
        .collect();
    for (child, parent) in links {
        if let Some(target) = components.iter_mut().find(|c| c.id() == parent)
            && catalog::is_container(target)
            && let Some(children) = target.children_mut()
        {
            children.push(child);
        }
    }
}

fn decode_cell(cell: &Element, wrapper: Option<&Element>) -> Option<Component> {
    let id = cell
        .attr("id")
        .or_else(|| wrapper.and_then(|w| w.attr("id")))
        .unwrap_or_default()
        .to_owned();
    if id == ROOT_ID || id == LAYER_ID {
        return None;
    }
    let value = cell
        .attr("value")
        .or_else(|| wrapper.and_then(|w| w.attr("label")))
        .map(str::to_owned);
    let is_edge = matches!(cell.attr("edge"), Some("1") | Some("true"));
    Some(if is_edge {
        Component::Connector(decode_connector(cell, id, value))
    } else {
        decode_vertex(cell, id, value)
    })
}

fn decode_connector(cell: &Element, id: String, label: Option<String>) -> ConnectorShape {
    let style = StyleMap::parse(cell.attr("style").unwrap_or_default());
    let routing = if style.get("edgeStyle") == Some("entityRelationEdgeStyle") {
        Routing::EntityRelation
    } else if style.get("edgeStyle") == Some("orthogonalEdgeStyle") {
        if style.get_bool("curved") == Some(true) {
            Routing::Curved
        } else {
            Routing::Orthogonal
        }
    } else {
        Routing::Straight
    };

    let waypoints = cell
        .child("mxGeometry")
        .and_then(|geometry| {
            geometry
                .children
                .iter()
                .find(|el| el.name == "Array" && el.attr("as") == Some("points"))
        })
        .map(|array| {
            array
                .children_named("mxPoint")
                .filter_map(|point| {
                    Some(Point::new(
                        point.attr("x")?.parse().ok()?,
                        point.attr("y")?.parse().ok()?,
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    ConnectorShape {
        id,
        source: cell.attr("source").unwrap_or_default().to_owned(),
        target: cell.attr("target").unwrap_or_default().to_owned(),
        label,
        style: ConnectorStyle {
            routing,
            // dialect defaults read back as "unset"
            start_arrow: style
                .get("startArrow")
                .filter(|v| *v != "none")
                .map(str::to_owned),
            end_arrow: style
                .get("endArrow")
                .filter(|v| *v != "classic")
                .map(str::to_owned),
            stroke_color: style.get("strokeColor").map(str::to_owned),
            stroke_width: style.get_f64("strokeWidth"),
            dashed: style.get_bool("dashed"),
            animated: style.get_bool("flowAnimation"),
            exit_x: style.get_f64("exitX"),
            exit_y: style.get_f64("exitY"),
            entry_x: style.get_f64("entryX"),
            entry_y: style.get_f64("entryY"),
        },
        waypoints,
    }
}

fn decode_vertex(cell: &Element, id: String, value: Option<String>) -> Component {
    let style = StyleMap::parse(cell.attr("style").unwrap_or_default());
    let mut common = NodeCommon::new(id);
    common.parent = cell
        .attr("parent")
        .filter(|p| *p != LAYER_ID)
        .map(str::to_owned);
    if let Some(geometry) = cell.child("mxGeometry") {
        common.x = geometry.attr("x").and_then(|v| v.parse().ok());
        common.y = geometry.attr("y").and_then(|v| v.parse().ok());
        common.width = geometry.attr("width").and_then(|v| v.parse().ok());
        common.height = geometry.attr("height").and_then(|v| v.parse().ok());
    }

    let mut component = classify_vertex(&style, value.as_deref(), common);
    let base = StyleMap::parse(&catalog::base_style(&component));
    if let Some(shared) = component.common_mut() {
        shared.shape_style = shape_bag(&style, &base);
        shared.text_style = text_bag(&style, &base);
    }
    component
}

/// Ordered signature predicates. Order is significant: predicates are not
/// mutually exclusive substrings (a cloud shape also carries `ellipse`, the
/// UML recipe also carries `swimlane`, every rounded rectangle would match
/// the rectangle fallback).
fn classify_vertex(style: &StyleMap, value: Option<&str>, common: NodeCommon) -> Component {
    let label = value.map(str::to_owned);
    let shape = style.get("shape").unwrap_or_default();

    if shape == "cloud" {
        return Component::Cloud(Shape { common, label });
    }
    if style.has("ellipse") {
        return Component::Ellipse(Shape { common, label });
    }
    if style.has("rhombus") {
        return Component::Diamond(Shape { common, label });
    }
    if style.get("childLayout") == Some("stackLayout") {
        return decode_uml_member_box(value, common);
    }
    if shape == "table" {
        return Component::Table(decode_table(value, common));
    }
    if style.has("swimlane") {
        return Component::Swimlane(SwimlaneShape {
            common,
            label,
            title_height: style.get_f64("startSize"),
            children: Vec::new(),
        });
    }
    if style.has("group") {
        return Component::Group(GroupShape {
            common,
            label,
            children: Vec::new(),
        });
    }
    match shape {
        "cylinder3" => return Component::Cylinder(Shape { common, label }),
        "hexagon" => return Component::Hexagon(Shape { common, label }),
        "document" => return Component::Document(Shape { common, label }),
        "callout" => return Component::Callout(Shape { common, label }),
        "actor" => return Component::Actor(Shape { common, label }),
        "note" => return Component::Note(Shape { common, label }),
        "parallelogram" => return Component::Parallelogram(Shape { common, label }),
        "trapezoid" => return Component::Trapezoid(Shape { common, label }),
        "step" => return Component::Step(Shape { common, label }),
        "card" => return Component::Card(decode_card(value, common)),
        "list" => return Component::List(decode_list(value, common)),
        "timeline" => return Component::Timeline(decode_timeline(value, common)),
        "process" => return Component::Process(decode_process(value, common)),
        "folder" => {
            return Component::UmlPackage(UmlPackageShape {
                common,
                name: value.unwrap_or_default().to_owned(),
            });
        }
        _ => {}
    }
    if style.has("triangle") {
        return Component::Triangle(Shape { common, label });
    }
    if style.has("text") {
        return Component::Text(Shape { common, label });
    }
    if style.has("image") {
        return Component::Image(ImageShape {
            common,
            label,
            href: style.get("image").unwrap_or_default().to_owned(),
        });
    }
    if let Some(token) = shape.strip_prefix("mxgraph.aws4.") {
        return Component::Aws(CloudIcon {
            common,
            label,
            service: catalog::aws_service_name(token),
        });
    }
    if let Some(token) = shape.strip_prefix("mxgraph.azure.") {
        return Component::Azure(CloudIcon {
            common,
            label,
            service: catalog::azure_service_name(token),
        });
    }
    if let Some(token) = shape.strip_prefix("mxgraph.gcp2.") {
        return Component::Gcp(CloudIcon {
            common,
            label,
            service: catalog::gcp_service_name(token),
        });
    }
    if let Some(device) = shape.strip_prefix("mxgraph.networks.") {
        let payload = Shape { common, label };
        return match device {
            "router" => Component::NetworkRouter(payload),
            "switch" => Component::NetworkSwitch(payload),
            "firewall" => Component::NetworkFirewall(payload),
            _ => Component::NetworkServer(payload),
        };
    }
    if style.get_bool("rounded") == Some(true) {
        return Component::RoundedRectangle(RoundedShape {
            common,
            label,
            corner_radius: style.get_f64("arcSize"),
        });
    }
    Component::Rectangle(Shape { common, label })
}

fn bold_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^<b>(.*)</b>$").expect("valid regex"))
}

fn font_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^<font[^>]*>(.*)</font>$").expect("valid regex"))
}

fn table_row_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<tr>(.*?)</tr>").expect("valid regex"))
}

fn table_cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<td>(.*?)</td>").expect("valid regex"))
}

fn numbered_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s").expect("valid regex"))
}

fn strip_bold(text: &str) -> Option<&str> {
    bold_regex().captures(text).map(|c| c.get(1).map_or("", |m| m.as_str()))
}

fn decode_uml_member_box(value: Option<&str>, common: NodeCommon) -> Component {
    let mut text = value.unwrap_or_default();
    let interface = text.starts_with("«interface»");
    if interface {
        text = text
            .strip_prefix("«interface»")
            .and_then(|t| t.strip_prefix("<br>"))
            .unwrap_or(text);
    }

    let mut blocks = text.split("<hr>");
    let name_part = blocks.next().unwrap_or_default();
    let name = strip_bold(name_part).unwrap_or(name_part).to_owned();
    let attributes = split_lines(blocks.next().unwrap_or_default());
    let methods = split_lines(blocks.next().unwrap_or_default());

    let payload = UmlClassShape {
        common,
        name,
        attributes,
        methods,
    };
    if interface {
        Component::UmlInterface(payload)
    } else {
        Component::UmlClass(payload)
    }
}

fn split_lines(block: &str) -> Vec<String> {
    if block.is_empty() {
        return Vec::new();
    }
    block.split("<br>").map(str::to_owned).collect()
}

fn decode_card(value: Option<&str>, common: NodeCommon) -> CardShape {
    let text = value.unwrap_or_default();
    let (title_part, subtitle_part) = match text.split_once("<br>") {
        Some((title, rest)) => (title, Some(rest)),
        None => (text, None),
    };
    let title = strip_bold(title_part).unwrap_or(title_part).to_owned();
    let subtitle = subtitle_part.map(|part| {
        font_regex()
            .captures(part)
            .and_then(|c| c.get(1))
            .map_or(part, |m| m.as_str())
            .to_owned()
    });
    CardShape {
        common,
        title,
        subtitle,
    }
}

fn decode_list(value: Option<&str>, common: NodeCommon) -> ListShape {
    let mut label = None;
    let mut items = Vec::new();
    let mut ordered = false;
    for line in value.unwrap_or_default().split("<br>") {
        if line.is_empty() {
            continue;
        }
        if let Some(heading) = strip_bold(line) {
            label = Some(heading.to_owned());
        } else if numbered_item_regex().is_match(line) {
            ordered = true;
            items.push(numbered_item_regex().replace(line, "").into_owned());
        } else {
            items.push(line.strip_prefix("• ").unwrap_or(line).to_owned());
        }
    }
    ListShape {
        common,
        label,
        items,
        ordered,
    }
}

fn decode_timeline(value: Option<&str>, common: NodeCommon) -> TimelineShape {
    let mut label = None;
    let mut events = Vec::new();
    for line in value.unwrap_or_default().split("<br>") {
        if line.is_empty() {
            continue;
        }
        match strip_bold(line) {
            Some(event) => events.push(event.to_owned()),
            None => {
                if label.is_none() {
                    label = Some(line.to_owned());
                }
            }
        }
    }
    TimelineShape {
        common,
        label,
        events,
    }
}

fn decode_table(value: Option<&str>, common: NodeCommon) -> TableShape {
    let text = value.unwrap_or_default();
    let label = text
        .split_once("<table")
        .map(|(head, _)| head)
        .filter(|head| !head.is_empty())
        .and_then(|head| strip_bold(head).map(str::to_owned));
    let rows = table_row_regex()
        .captures_iter(text)
        .map(|row| {
            table_cell_regex()
                .captures_iter(row.get(1).map_or("", |m| m.as_str()))
                .map(|cell| cell.get(1).map_or("", |m| m.as_str()).to_owned())
                .collect()
        })
        .collect();
    TableShape { common, label, rows }
}

fn decode_process(value: Option<&str>, common: NodeCommon) -> ProcessShape {
    let text = value.unwrap_or_default();
    if text.contains(" → ") {
        ProcessShape {
            common,
            label: None,
            steps: text.split(" → ").map(str::to_owned).collect(),
        }
    } else {
        ProcessShape {
            common,
            label: (!text.is_empty()).then(|| text.to_owned()),
            steps: Vec::new(),
        }
    }
}

/// Shared style bag, excluding tokens the kind's base fragment already sets.
fn shape_bag(style: &StyleMap, base: &StyleMap) -> ShapeStyle {
    ShapeStyle {
        fill_color: str_differs(style, base, "fillColor"),
        stroke_color: str_differs(style, base, "strokeColor"),
        stroke_width: num_differs(style, base, "strokeWidth"),
        opacity: num_differs(style, base, "opacity"),
        shadow: bool_differs(style, base, "shadow"),
        dashed: bool_differs(style, base, "dashed"),
    }
}

fn text_bag(style: &StyleMap, base: &StyleMap) -> TextStyle {
    TextStyle {
        font_size: num_differs(style, base, "fontSize"),
        font_family: str_differs(style, base, "fontFamily"),
        font_color: str_differs(style, base, "fontColor"),
        bold: bool_differs(style, base, "fontStyle"),
        align: str_differs(style, base, "align"),
        vertical_align: str_differs(style, base, "verticalAlign"),
    }
}

fn str_differs(style: &StyleMap, base: &StyleMap, key: &str) -> Option<String> {
    let value = style.get(key)?;
    (base.get(key) != Some(value)).then(|| value.to_owned())
}

fn num_differs(style: &StyleMap, base: &StyleMap, key: &str) -> Option<f64> {
    let value = style.get_f64(key)?;
    (base.get_f64(key) != Some(value)).then_some(value)
}

fn bool_differs(style: &StyleMap, base: &StyleMap, key: &str) -> Option<bool> {
    let value = style.get_bool(key)?;
    (base.get_bool(key) != Some(value)).then_some(value)
}
