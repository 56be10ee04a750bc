//! XML generation for the EPUB-internal documents.
//!
//! Every generated document starts with an XML declaration and is UTF-8.
//! Package, navigation and container documents are indented; page
//! documents are written compactly so whitespace inside mixed content is
//! left exactly as the caller built it.

use std::io::Write;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::book::{Direction, Manifest, Metadata, TocEntry};
use crate::error::Result;
use crate::markup::Fragment;
use crate::util::format_timestamp;

/// Directory holding every content document inside the archive.
pub const CONTENT_ROOT: &str = "EPUB/";
pub const CONTAINER_PATH: &str = "META-INF/container.xml";
pub const PACKAGE_PATH: &str = "EPUB/package.opf";

pub const NAV_ID: &str = "toc";
pub const NAV_HREF: &str = "toc.xhtml";
pub const NAV_TITLE: &str = "Table of contents";

pub const STYLESHEET_ID: &str = "stylesheet";
pub const STYLESHEET_HREF: &str = "stylesheet.css";

pub const MIMETYPE: &str = "application/epub+zip";
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";
pub const CSS_MEDIA_TYPE: &str = "text/css";

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const OPS_NS: &str = "http://www.idpf.org/2007/ops";
const OPF_NS: &str = "http://www.idpf.org/2007/opf";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const DCTERMS_NS: &str = "http://purl.org/dc/terms/";

/// ID of the `dc:identifier` element the package points at.
const PUB_IDENTIFIER_ID: &str = "pub-identifier";

/// Container.xml: fixed, points readers at the package document.
pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="EPUB/package.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Settings shared by every XHTML document of a book.
#[derive(Debug, Clone, Copy)]
pub struct DocumentHead<'a> {
    pub language: &'a str,
    pub direction: Direction,
    /// Href of the book stylesheet, when the book has one.
    pub stylesheet: Option<&'a str>,
}

/// Wrap a page body in a complete XHTML document.
pub fn page_document(head: DocumentHead<'_>, title: &str, body: &Fragment) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_declaration(&mut writer)?;
    writer.get_mut().write_all(b"\n")?;

    write_html_start(&mut writer, head, false)?;
    write_head(&mut writer, head, title)?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    body.write(&mut writer)?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;

    writer.write_event(Event::End(BytesEnd::new("html")))?;
    finish(writer)
}

/// Generate the navigation document from the flat table of contents.
pub fn nav_document(head: DocumentHead<'_>, toc: &[TocEntry]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_declaration(&mut writer)?;

    write_html_start(&mut writer, head, true)?;
    write_head(&mut writer, head, NAV_TITLE)?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    write_text_element(&mut writer, "h1", &[], NAV_TITLE)?;

    let nav = BytesStart::new("nav").with_attributes([
        ("epub:type", "toc"),
        ("id", NAV_ID),
        ("role", "doc-toc"),
    ]);
    writer.write_event(Event::Start(nav))?;

    if toc.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new("ol")))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new("ol")))?;
        for entry in toc {
            writer.write_event(Event::Start(BytesStart::new("li")))?;
            write_text_element(&mut writer, "a", &[("href", entry.href.as_str())], &entry.label)?;
            writer.write_event(Event::End(BytesEnd::new("li")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("ol")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("nav")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("html")))?;
    finish(writer)
}

/// Generate the package document (metadata, manifest, spine).
pub fn package_document(
    metadata: &Metadata,
    modified: &DateTime<Utc>,
    manifest: &Manifest,
    spine: &[String],
    direction: Direction,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_declaration(&mut writer)?;

    let package = BytesStart::new("package").with_attributes([
        ("xmlns", OPF_NS),
        ("version", "3.0"),
        ("xmlns:dc", DC_NS),
        ("xmlns:dcterms", DCTERMS_NS),
        ("unique-identifier", PUB_IDENTIFIER_ID),
    ]);
    writer.write_event(Event::Start(package))?;

    // Metadata
    writer.write_event(Event::Start(BytesStart::new("metadata")))?;
    write_text_element(
        &mut writer,
        "dc:identifier",
        &[("id", PUB_IDENTIFIER_ID)],
        &metadata.identifier,
    )?;
    write_text_element(&mut writer, "dc:title", &[], &metadata.title)?;
    if !metadata.author.is_empty() {
        write_text_element(&mut writer, "dc:creator", &[], &metadata.author)?;
    }
    let language = if metadata.language.is_empty() {
        "en"
    } else {
        &metadata.language
    };
    write_text_element(&mut writer, "dc:language", &[], language)?;
    write_text_element(&mut writer, "dc:date", &[], &format_timestamp(&metadata.created))?;
    write_text_element(
        &mut writer,
        "meta",
        &[("property", "dcterms:modified")],
        &format_timestamp(modified),
    )?;
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;

    // Manifest
    writer.write_event(Event::Start(BytesStart::new("manifest")))?;
    for item in manifest.iter() {
        let mut start = BytesStart::new("item").with_attributes([
            ("id", item.id.as_str()),
            ("href", item.href.as_str()),
            ("media-type", item.media_type.as_str()),
        ]);
        if let Some(property) = item.properties {
            start.push_attribute(("properties", property.as_str()));
        }
        writer.write_event(Event::Empty(start))?;
    }
    writer.write_event(Event::End(BytesEnd::new("manifest")))?;

    // Spine
    let mut spine_start = BytesStart::new("spine");
    if direction == Direction::Rtl {
        spine_start.push_attribute(("page-progression-direction", "rtl"));
    }
    if spine.is_empty() {
        writer.write_event(Event::Empty(spine_start))?;
    } else {
        writer.write_event(Event::Start(spine_start))?;
        for idref in spine {
            let itemref = BytesStart::new("itemref").with_attributes([("idref", idref.as_str())]);
            writer.write_event(Event::Empty(itemref))?;
        }
        writer.write_event(Event::End(BytesEnd::new("spine")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("package")))?;
    finish(writer)
}

fn write_declaration<W: Write>(writer: &mut Writer<W>) -> Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(())
}

fn write_html_start<W: Write>(
    writer: &mut Writer<W>,
    head: DocumentHead<'_>,
    with_ops_namespace: bool,
) -> Result<()> {
    let mut html = BytesStart::new("html");
    html.push_attribute(("xmlns", XHTML_NS));
    if with_ops_namespace {
        html.push_attribute(("xmlns:epub", OPS_NS));
    }
    if !head.language.is_empty() {
        html.push_attribute(("lang", head.language));
        html.push_attribute(("xml:lang", head.language));
    }
    html.push_attribute(("dir", head.direction.as_str()));
    writer.write_event(Event::Start(html))?;
    Ok(())
}

fn write_head<W: Write>(writer: &mut Writer<W>, head: DocumentHead<'_>, title: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("head")))?;
    write_text_element(writer, "title", &[], title)?;
    if let Some(href) = head.stylesheet {
        let link = BytesStart::new("link").with_attributes([
            ("rel", "stylesheet"),
            ("type", CSS_MEDIA_TYPE),
            ("href", href),
        ]);
        writer.write_event(Event::Empty(link))?;
    }
    writer.write_event(Event::End(BytesEnd::new("head")))?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(String::from_utf8(bytes)?)
}
