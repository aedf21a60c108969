use super::{Element, XmlCodec};
use crate::entities::unescape_once;
use crate::error::ParseError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::str;

/// Default codec backed by the quick-xml pull reader.
///
/// Attribute checks stay enabled, so duplicated attributes, unquoted values
/// and broken entities surface as [`ParseError`]s instead of being papered
/// over. Whitespace-only text nodes (pretty-printing) are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickXmlCodec;

impl XmlCodec for QuickXmlCodec {
    fn parse(&self, xml: &str) -> Result<Element, ParseError> {
        parse_document(xml)
    }
}

fn parse_document(xml: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let pos = reader.buffer_position();
        match reader.read_event_into(&mut buf) {
            Err(err) => {
                return Err(err_at(xml, reader.buffer_position(), err.to_string()));
            }
            Ok(Event::Start(e)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(err_at(xml, pos, "multiple root elements".into()));
                }
                stack.push(element_from(&e, xml, pos)?);
            }
            Ok(Event::Empty(e)) => {
                let el = element_from(&e, xml, pos)?;
                attach(el, &mut stack, &mut root, xml, pos)?;
            }
            Ok(Event::End(_)) => {
                // quick-xml rejects mismatched end tags before we get here.
                let Some(el) = stack.pop() else {
                    return Err(err_at(xml, pos, "closing tag without opening tag".into()));
                };
                attach(el, &mut stack, &mut root, xml, pos)?;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .decode()
                    .map_err(|err| err_at(xml, pos, err.to_string()))?;
                if text.trim().is_empty() {
                    continue;
                }
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&unescape_once(&text)),
                    None => {
                        return Err(err_at(xml, pos, "text outside root element".into()));
                    }
                }
            }
            Ok(Event::CData(c)) => {
                let text = c
                    .decode()
                    .map_err(|err| err_at(xml, pos, err.to_string()))?;
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&text);
                }
            }
            Ok(Event::GeneralRef(r)) => {
                let name = r
                    .decode()
                    .map_err(|err| err_at(xml, pos, err.to_string()))?;
                let Some(resolved) = resolve_reference(&name) else {
                    return Err(err_at(xml, pos, format!("unknown entity &{name};")));
                };
                if let Some(open) = stack.last_mut() {
                    open.text.push(resolved);
                }
            }
            Ok(Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_)) => {}
            Ok(Event::Eof) => break,
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(err_at(
            xml,
            reader.buffer_position(),
            format!("unclosed element <{}>", open.name),
        ));
    }
    root.ok_or_else(|| ParseError::new("no root element found", 1))
}

fn element_from(e: &BytesStart<'_>, xml: &str, pos: u64) -> Result<Element, ParseError> {
    let name = str::from_utf8(e.name().as_ref())
        .map_err(|err| err_at(xml, pos, err.to_string()))?
        .to_owned();
    let mut el = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err_at(xml, pos, err.to_string()))?;
        let key = str::from_utf8(attr.key.as_ref())
            .map_err(|err| err_at(xml, pos, err.to_string()))?
            .to_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| err_at(xml, pos, err.to_string()))?
            .into_owned();
        el.attrs.insert(key, value);
    }
    Ok(el)
}

fn attach(
    el: Element,
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    xml: &str,
    pos: u64,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
        return Ok(());
    }
    if root.is_some() {
        return Err(err_at(xml, pos, "multiple root elements".into()));
    }
    *root = Some(el);
    Ok(())
}

/// Resolves a general entity reference: the five predefined names plus
/// numeric character references. Anything else is not well-formed XML.
fn resolve_reference(name: &str) -> Option<char> {
    match name {
        "amp" => return Some('&'),
        "lt" => return Some('<'),
        "gt" => return Some('>'),
        "quot" => return Some('"'),
        "apos" => return Some('\''),
        _ => {}
    }
    let digits = name.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

fn err_at(xml: &str, pos: u64, message: String) -> ParseError {
    let cut = (pos as usize).min(xml.len());
    let line = xml.as_bytes()[..cut].iter().filter(|&&b| b == b'\n').count() + 1;
    ParseError::new(message, line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Result<Element, ParseError> {
        QuickXmlCodec.parse(xml)
    }

    #[test]
    fn parses_nested_elements_and_attributes() {
        let tree = parse(
            "<mxGraphModel dx=\"800\">\n  <root>\n    <mxCell id=\"0\" />\n  </root>\n</mxGraphModel>",
        )
        .unwrap();
        assert_eq!(tree.name, "mxGraphModel");
        assert_eq!(tree.attr("dx"), Some("800"));
        let root = tree.child("root").unwrap();
        assert_eq!(root.children_named("mxCell").count(), 1);
    }

    #[test]
    fn attribute_entities_are_unescaped() {
        let tree = parse(r#"<mxCell value="a &lt;b&gt; &amp; c" />"#).unwrap();
        assert_eq!(tree.attr("value"), Some("a <b> & c"));
    }

    #[test]
    fn text_content_entities_resolve() {
        let tree = parse("<object>tom &amp; jerry</object>").unwrap();
        assert_eq!(tree.text, "tom & jerry");
    }

    #[test]
    fn mismatched_end_tag_reports_line() {
        let err = parse("<root>\n  <mxCell id=\"2\">\n  </root>\n</root>").unwrap_err();
        assert!(err.line >= 2, "line was {}", err.line);
    }

    #[test]
    fn unclosed_element_is_an_error() {
        assert!(parse("<root><mxCell id=\"2\">").is_err());
    }

    #[test]
    fn duplicate_attribute_is_an_error() {
        assert!(parse(r#"<mxCell id="a" id="b" />"#).is_err());
    }

    #[test]
    fn bare_ampersand_in_attribute_is_an_error() {
        assert!(parse(r#"<mxCell value="a & b" />"#).is_err());
    }

    #[test]
    fn second_root_element_is_an_error() {
        assert!(parse("<a /><b />").is_err());
    }

    #[test]
    fn roundtrips_through_serialization() {
        let xml = "<root>\n  <mxCell id=\"0\" />\n  <mxCell id=\"1\" parent=\"0\" />\n</root>";
        let tree = parse(xml).unwrap();
        assert_eq!(tree.to_xml(), xml);
    }
}
