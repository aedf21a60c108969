use crate::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn canonicalize_completes_truncated_streams() {
    let engine = Engine::new();
    let partial = concat!(
        "<mxGraphModel><root><mxCell id=\"0\" /><mxCell id=\"1\" parent=\"0\" />",
        "<mxCell id=\"box1\" value=\"A\" style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">",
        "<mxGeometry x=\"40\" y=\"40\" width=\"120\" height=\"60\" as=\"geometry\" /></mxCell>",
        "<mxCell id=\"3\">",
    );
    let closed = engine.canonicalize(partial);
    assert!(closed.starts_with("<mxfile"));
    assert!(!closed.contains("id=\"3\""));
    assert!(engine.validate(&closed).is_none());

    let components = engine.xml_to_components(&closed).unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].kind_name(), "rectangle");
    assert_eq!(components[0].id(), "box1");

    let again = engine.canonicalize(&closed);
    assert_eq!(again, closed);
}

#[test]
fn canonicalize_keeps_trailing_cells_with_complete_geometry() {
    let partial = concat!(
        "<mxCell id=\"v1\" style=\"rounded=0;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">",
        "<mxGeometry x=\"0\" y=\"0\" width=\"60\" height=\"30\" as=\"geometry\" />",
    );
    let closed = Engine::new().canonicalize(partial);
    assert!(closed.contains("id=\"v1\""));
    assert!(validate_cell_structure(&closed).is_none());
}

#[test]
fn canonicalize_drops_half_open_tag_fragments() {
    let engine = Engine::new();
    let closed = engine.canonicalize("<mxGraphModel><root><mxCell id=\"0\" /><mxCel");
    assert!(closed.contains("<mxCell id=\"0\" />"));
    assert!(engine.validate(&closed).is_none());
}

#[test]
fn canonicalize_turns_empty_input_into_the_empty_diagram() {
    let engine = Engine::new();
    let closed = engine.canonicalize("");
    assert!(engine.validate(&closed).is_none());
    assert_eq!(
        engine.analyze(&closed).unwrap().summary,
        "Diagram contains no components."
    );
}

#[derive(Debug, Default)]
struct CountingCodec {
    parses: AtomicUsize,
}

impl XmlCodec for CountingCodec {
    fn parse(&self, xml: &str) -> std::result::Result<Element, ParseError> {
        self.parses.fetch_add(1, Ordering::Relaxed);
        QuickXmlCodec.parse(xml)
    }
}

#[test]
fn engine_routes_parsing_through_the_injected_codec() {
    let codec = Arc::new(CountingCodec::default());
    let engine = Engine::with_codec(codec.clone());
    assert!(engine.validate(&empty_diagram()).is_none());
    assert!(engine.xml_to_components(&empty_diagram()).unwrap().is_empty());
    assert_eq!(codec.parses.load(Ordering::Relaxed), 2);
}
