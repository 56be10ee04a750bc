//! XHTML fragment parsing.

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use super::{Element, Fragment, Node, push_node};
use crate::error::{Error, Result};
use crate::util::resolve_entity;

pub(super) fn parse_fragment(source: &str) -> Result<Fragment> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut reader = Reader::from_str(source);

    let mut open: Vec<Element> = Vec::new();
    let mut fragment = Fragment::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(Error::invalid_input(format!(
                    "malformed markup at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        };

        match event {
            Event::Start(e) => open.push(element_from_start(&e)?),
            Event::Empty(e) => {
                let element = element_from_start(&e)?;
                attach(&mut open, &mut fragment, Node::Element(element));
            }
            Event::End(_) => {
                // End names are checked by the reader.
                let element = open
                    .pop()
                    .ok_or_else(|| Error::invalid_input("unexpected closing tag"))?;
                attach(&mut open, &mut fragment, Node::Element(element));
            }
            Event::Text(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                attach(&mut open, &mut fragment, Node::Text(text));
            }
            Event::GeneralRef(e) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                let resolved = resolve_entity(&entity).ok_or_else(|| {
                    Error::invalid_input(format!("unknown entity '&{entity};'"))
                })?;
                attach(&mut open, &mut fragment, Node::Text(resolved));
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                attach(&mut open, &mut fragment, Node::Text(text));
            }
            Event::Eof => break,
            // Declarations, doctypes, comments and PIs carry no page content.
            _ => {}
        }
    }

    if let Some(element) = open.last() {
        return Err(Error::invalid_input(format!(
            "unclosed element <{}>",
            element.name
        )));
    }

    Ok(fragment)
}

fn element_from_start(start: &BytesStart) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            Error::invalid_input(format!("malformed attribute on <{}>: {e}", element.name))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&raw).map_err(|e| {
            Error::invalid_input(format!("bad escape in attribute '{key}': {e}"))
        })?;
        element = element.attr(key, value.into_owned());
    }

    Ok(element)
}

fn attach(open: &mut [Element], fragment: &mut Fragment, node: Node) {
    match open.last_mut() {
        Some(parent) => push_node(&mut parent.children, node),
        None => push_node(&mut fragment.nodes, node),
    }
}
