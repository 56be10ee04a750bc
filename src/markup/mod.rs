//! Markup fragments: the unit of content handed to the builder.
//!
//! A [`Fragment`] is an ordered list of nodes (elements and text) that
//! becomes the `<body>` of a page. Fragments are built in code with
//! [`Element`]'s builder methods, parsed from XHTML with
//! [`Fragment::parse`], or derived from plain text with
//! [`Fragment::paragraphs`].
//!
//! ```
//! use epubgen::markup::{Element, Fragment};
//!
//! let heading = Element::new("h1").text("Chapter 1");
//! let para = Element::new("p")
//!     .attr("class", "lead")
//!     .text("It was a ")
//!     .child(Element::new("em").text("dark"))
//!     .text(" night.");
//!
//! let fragment: Fragment = [heading, para].into_iter().collect();
//! assert_eq!(
//!     fragment.to_xml_string().unwrap(),
//!     "<h1>Chapter 1</h1><p class=\"lead\">It was a <em>dark</em> night.</p>"
//! );
//! ```

mod parse;

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Error, Result};
use crate::util::{check_chars, is_xml_name};

/// A markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute. Values are escaped on output.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.push(node);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }

    /// Append a child, merging adjacent text nodes.
    pub fn push(&mut self, node: impl Into<Node>) {
        push_node(&mut self.children, node.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Look up an attribute value by name.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn validate(&self) -> Result<()> {
        if !is_xml_name(&self.name) {
            return Err(Error::invalid_input(format!(
                "'{}' is not a valid element name",
                self.name
            )));
        }
        for (i, (key, value)) in self.attributes.iter().enumerate() {
            if !is_xml_name(key) {
                return Err(Error::invalid_input(format!(
                    "'{key}' is not a valid attribute name on <{}>",
                    self.name
                )));
            }
            if self.attributes[..i].iter().any(|(other, _)| other == key) {
                return Err(Error::invalid_input(format!(
                    "duplicate attribute '{key}' on <{}>",
                    self.name
                )));
            }
            check_chars(value)?;
        }
        self.children.iter().try_for_each(Node::validate)
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            write_nodes(&self.children, writer)?;
            writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        }
        Ok(())
    }
}

impl Node {
    fn validate(&self) -> Result<()> {
        match self {
            Node::Element(element) => element.validate(),
            Node::Text(text) => check_chars(text),
        }
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        match self {
            Node::Element(element) => element.write(writer),
            Node::Text(text) => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
                Ok(())
            }
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

/// An ordered sequence of nodes forming a page body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    nodes: Vec<Node>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse well-formed XHTML markup into a fragment.
    ///
    /// The input may hold several top-level elements and text. XML
    /// declarations, doctypes, comments and processing instructions are
    /// dropped. Malformed markup is reported as [`Error::InvalidInput`].
    pub fn parse(source: &str) -> Result<Self> {
        parse::parse_fragment(source)
    }

    /// Build a fragment of `<p>` elements from plain text.
    ///
    /// Paragraphs are separated by blank lines; lines inside a paragraph
    /// are kept as they are.
    pub fn paragraphs(text: &str) -> Self {
        let mut fragment = Fragment::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    fragment.push(Element::new("p").text(current.join("\n")));
                    current.clear();
                }
            } else {
                current.push(line.trim_end());
            }
        }
        if !current.is_empty() {
            fragment.push(Element::new("p").text(current.join("\n")));
        }

        fragment
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        push_node(&mut self.nodes, node.into());
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check element and attribute names and reject characters XML cannot carry.
    pub fn validate(&self) -> Result<()> {
        self.nodes.iter().try_for_each(Node::validate)
    }

    /// Serialize the fragment on its own, without any surrounding document.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write(&mut writer)?;
        Ok(String::from_utf8(writer.into_inner())?)
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        write_nodes(&self.nodes, writer)
    }
}

impl From<Element> for Fragment {
    fn from(element: Element) -> Self {
        Self {
            nodes: vec![Node::Element(element)],
        }
    }
}

impl<N: Into<Node>> FromIterator<N> for Fragment {
    fn from_iter<I: IntoIterator<Item = N>>(iter: I) -> Self {
        let mut fragment = Fragment::new();
        for node in iter {
            fragment.push(node);
        }
        fragment
    }
}

fn push_node(nodes: &mut Vec<Node>, node: Node) {
    if let Node::Text(text) = &node
        && let Some(Node::Text(last)) = nodes.last_mut()
    {
        last.push_str(text);
        return;
    }
    nodes.push(node);
}

fn write_nodes<W: Write>(nodes: &[Node], writer: &mut Writer<W>) -> Result<()> {
    nodes.iter().try_for_each(|node| node.write(writer))
}
