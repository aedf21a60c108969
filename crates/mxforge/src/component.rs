//! Typed component model: a `kind`-discriminated view over diagram cells.
//!
//! Components are ephemeral projections. They are produced by the parser for
//! analysis and editing and consumed by the converter; the XML document stays
//! the source of truth.

use serde::{Deserialize, Serialize};

/// Shared fill/stroke appearance, composed into every vertex payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashed: Option<bool>,
}

impl ShapeStyle {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Shared font/alignment appearance, composed into every vertex payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<String>,
}

impl TextStyle {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Identity and placement fields every vertex carries. `parent` defaults to
/// the layer cell `"1"` when omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCommon {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(flatten)]
    pub shape_style: ShapeStyle,
    #[serde(flatten)]
    pub text_style: TextStyle,
}

impl NodeCommon {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// The effective parent id, falling back to the default layer.
    pub fn parent_or_layer(&self) -> &str {
        self.parent.as_deref().unwrap_or("1")
    }
}

/// Generic labelled vertex payload used by most basic shapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Shape {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            common: NodeCommon::new(id),
            label: Some(label.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundedShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub href: String,
}

/// Titled container; member ids are derived from `parent` references by
/// [`crate::parse::resolve_child_relationships`], never hand-maintained.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwimlaneShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

/// Cloud-provider icon. `service` is open-ended; unknown names fall back to a
/// synthesized shape token, so icons may be approximate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudIcon {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmlClassShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmlPackageShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    #[serde(default)]
    pub ordered: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessShape {
    #[serde(flatten)]
    pub common: NodeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
}

/// A point in diagram coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Edge routing algorithms the renderer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Routing {
    #[default]
    Straight,
    Orthogonal,
    Curved,
    EntityRelation,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorStyle {
    #[serde(default)]
    pub routing: Routing,
    /// Arrowhead tokens; `None` means the dialect defaults apply
    /// (`endArrow=classic`, `startArrow=none`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_arrow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_arrow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_y: Option<f64>,
}

/// A directed link between two vertices. Not a vertex: geometry is relative
/// and waypoints route the line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorShape {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub style: ConnectorStyle,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waypoints: Vec<Point>,
}

impl ConnectorShape {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            ..Self::default()
        }
    }
}

/// One diagram element, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Component {
    Rectangle(Shape),
    RoundedRectangle(RoundedShape),
    Ellipse(Shape),
    Diamond(Shape),
    Hexagon(Shape),
    Triangle(Shape),
    Cylinder(Shape),
    Parallelogram(Shape),
    Trapezoid(Shape),
    Step(Shape),
    Note(Shape),
    Text(Shape),
    Image(ImageShape),
    Connector(ConnectorShape),
    Swimlane(SwimlaneShape),
    Group(GroupShape),
    Aws(CloudIcon),
    Azure(CloudIcon),
    Gcp(CloudIcon),
    UmlClass(UmlClassShape),
    UmlInterface(UmlClassShape),
    UmlPackage(UmlPackageShape),
    NetworkServer(Shape),
    NetworkRouter(Shape),
    NetworkSwitch(Shape),
    NetworkFirewall(Shape),
    Card(CardShape),
    List(ListShape),
    Timeline(TimelineShape),
    Table(TableShape),
    Process(ProcessShape),
    Callout(Shape),
    Actor(Shape),
    Document(Shape),
    Cloud(Shape),
}

impl Component {
    /// The camelCase discriminator, as used on the wire and in summaries.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Rectangle(_) => "rectangle",
            Self::RoundedRectangle(_) => "roundedRectangle",
            Self::Ellipse(_) => "ellipse",
            Self::Diamond(_) => "diamond",
            Self::Hexagon(_) => "hexagon",
            Self::Triangle(_) => "triangle",
            Self::Cylinder(_) => "cylinder",
            Self::Parallelogram(_) => "parallelogram",
            Self::Trapezoid(_) => "trapezoid",
            Self::Step(_) => "step",
            Self::Note(_) => "note",
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Connector(_) => "connector",
            Self::Swimlane(_) => "swimlane",
            Self::Group(_) => "group",
            Self::Aws(_) => "aws",
            Self::Azure(_) => "azure",
            Self::Gcp(_) => "gcp",
            Self::UmlClass(_) => "umlClass",
            Self::UmlInterface(_) => "umlInterface",
            Self::UmlPackage(_) => "umlPackage",
            Self::NetworkServer(_) => "networkServer",
            Self::NetworkRouter(_) => "networkRouter",
            Self::NetworkSwitch(_) => "networkSwitch",
            Self::NetworkFirewall(_) => "networkFirewall",
            Self::Card(_) => "card",
            Self::List(_) => "list",
            Self::Timeline(_) => "timeline",
            Self::Table(_) => "table",
            Self::Process(_) => "process",
            Self::Callout(_) => "callout",
            Self::Actor(_) => "actor",
            Self::Document(_) => "document",
            Self::Cloud(_) => "cloud",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Connector(c) => &c.id,
            // every non-connector variant carries NodeCommon
            other => other.common().map(|c| c.id.as_str()).unwrap_or_default(),
        }
    }

    pub fn is_connector(&self) -> bool {
        matches!(self, Self::Connector(_))
    }

    /// The shared vertex fields, `None` for connectors.
    pub fn common(&self) -> Option<&NodeCommon> {
        match self {
            Self::Rectangle(s)
            | Self::Ellipse(s)
            | Self::Diamond(s)
            | Self::Hexagon(s)
            | Self::Triangle(s)
            | Self::Cylinder(s)
            | Self::Parallelogram(s)
            | Self::Trapezoid(s)
            | Self::Step(s)
            | Self::Note(s)
            | Self::Text(s)
            | Self::NetworkServer(s)
            | Self::NetworkRouter(s)
            | Self::NetworkSwitch(s)
            | Self::NetworkFirewall(s)
            | Self::Callout(s)
            | Self::Actor(s)
            | Self::Document(s)
            | Self::Cloud(s) => Some(&s.common),
            Self::RoundedRectangle(s) => Some(&s.common),
            Self::Image(s) => Some(&s.common),
            Self::Swimlane(s) => Some(&s.common),
            Self::Group(s) => Some(&s.common),
            Self::Aws(s) | Self::Azure(s) | Self::Gcp(s) => Some(&s.common),
            Self::UmlClass(s) | Self::UmlInterface(s) => Some(&s.common),
            Self::UmlPackage(s) => Some(&s.common),
            Self::Card(s) => Some(&s.common),
            Self::List(s) => Some(&s.common),
            Self::Timeline(s) => Some(&s.common),
            Self::Table(s) => Some(&s.common),
            Self::Process(s) => Some(&s.common),
            Self::Connector(_) => None,
        }
    }

    pub fn common_mut(&mut self) -> Option<&mut NodeCommon> {
        match self {
            Self::Rectangle(s)
            | Self::Ellipse(s)
            | Self::Diamond(s)
            | Self::Hexagon(s)
            | Self::Triangle(s)
            | Self::Cylinder(s)
            | Self::Parallelogram(s)
            | Self::Trapezoid(s)
            | Self::Step(s)
            | Self::Note(s)
            | Self::Text(s)
            | Self::NetworkServer(s)
            | Self::NetworkRouter(s)
            | Self::NetworkSwitch(s)
            | Self::NetworkFirewall(s)
            | Self::Callout(s)
            | Self::Actor(s)
            | Self::Document(s)
            | Self::Cloud(s) => Some(&mut s.common),
            Self::RoundedRectangle(s) => Some(&mut s.common),
            Self::Image(s) => Some(&mut s.common),
            Self::Swimlane(s) => Some(&mut s.common),
            Self::Group(s) => Some(&mut s.common),
            Self::Aws(s) | Self::Azure(s) | Self::Gcp(s) => Some(&mut s.common),
            Self::UmlClass(s) | Self::UmlInterface(s) => Some(&mut s.common),
            Self::UmlPackage(s) => Some(&mut s.common),
            Self::Card(s) => Some(&mut s.common),
            Self::List(s) => Some(&mut s.common),
            Self::Timeline(s) => Some(&mut s.common),
            Self::Table(s) => Some(&mut s.common),
            Self::Process(s) => Some(&mut s.common),
            Self::Connector(_) => None,
        }
    }

    /// Mutable access to the derived member list of container kinds.
    pub fn children_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            Self::Swimlane(s) => Some(&mut s.children),
            Self::Group(s) => Some(&mut s.children),
            _ => None,
        }
    }
}

/// Result of the analyze entry point: the decoded components plus a stable
/// textual summary counting components by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramAnalysis {
    pub components: Vec<Component>,
    pub summary: String,
}
