//! EPUB reading utilities (container.xml, package document, navigation document).
//!
//! Only what is needed to inspect a built book: resolve the package, list
//! its metadata, manifest and spine, and read back the table of contents.

use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use super::writer::CONTAINER_PATH;
use crate::book::{Direction, TocEntry};
use crate::error::{Error, Result};
use crate::util::{resolve_entity, strip_bom};

/// A manifest item as found in a package document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct PackageItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// Parsed package document.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct PackageInfo {
    /// Archive path of the package document.
    pub path: String,
    pub identifier: String,
    pub title: String,
    pub author: Option<String>,
    pub language: String,
    pub date: Option<String>,
    pub modified: Option<String>,
    pub manifest: Vec<PackageItem>,
    /// Spine `idref`s in reading order.
    pub spine: Vec<String>,
    pub rtl: bool,
}

impl PackageInfo {
    pub fn item(&self, id: &str) -> Option<&PackageItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// The manifest item carrying the `nav` property.
    pub fn nav_item(&self) -> Option<&PackageItem> {
        self.manifest.iter().find(|item| has_property(item, "nav"))
    }

    pub fn direction(&self) -> Direction {
        if self.rtl { Direction::Rtl } else { Direction::Ltr }
    }

    /// Archive path of a manifest href (hrefs are relative to the package).
    pub fn archive_path(&self, href: &str) -> String {
        match self.path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{href}"),
            None => href.to_string(),
        }
    }
}

fn has_property(item: &PackageItem, property: &str) -> bool {
    item.properties
        .as_deref()
        .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == property))
}

/// Open an EPUB and parse its package document.
pub fn read_package<R: Read + Seek>(reader: R) -> Result<PackageInfo> {
    let mut archive = ZipArchive::new(reader)?;
    load_package(&mut archive)
}

/// Open an EPUB and read back its navigation document's entries.
pub fn read_toc<R: Read + Seek>(reader: R) -> Result<Vec<TocEntry>> {
    let mut archive = ZipArchive::new(reader)?;
    let package = load_package(&mut archive)?;

    let nav = package
        .nav_item()
        .ok_or_else(|| Error::InvalidEpub("package has no navigation document".to_string()))?;
    let content = read_entry(&mut archive, &package.archive_path(&nav.href))?;
    parse_nav(&String::from_utf8(strip_bom(&content).to_vec())?)
}

/// List archive entry names in their stored order.
pub fn entry_names<R: Read + Seek>(reader: R) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}

fn load_package<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<PackageInfo> {
    let container = read_entry(archive, CONTAINER_PATH)?;
    let path = parse_container_xml(&container)?;

    let opf = read_entry(archive, &path)?;
    let mut package = parse_package(&String::from_utf8(strip_bom(&opf).to_vec())?)?;
    package.path = path;
    Ok(package)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| Error::InvalidEpub(format!("missing {name}")))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Parse META-INF/container.xml to find the package document path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())?;

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "no rootfile found in container.xml".to_string(),
    ))
}

/// Parse a package document.
pub fn parse_package(content: &str) -> Result<PackageInfo> {
    let mut reader = Reader::from_str(content);

    let mut package = PackageInfo::default();
    let mut in_metadata = false;
    let mut current: Option<Vec<u8>> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"metadata" => in_metadata = true,
                    b"spine" => package.rtl = is_rtl_spine(&e)?,
                    _ if in_metadata => {
                        let is_modified = local == b"meta"
                            && attribute(&e, b"property")?.as_deref() == Some("dcterms:modified");
                        if is_modified {
                            current = Some(b"modified".to_vec());
                        } else {
                            current = Some(local.to_vec());
                        }
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => package.manifest.push(PackageItem {
                        id: attribute(&e, b"id")?.unwrap_or_default(),
                        href: attribute(&e, b"href")?.unwrap_or_default(),
                        media_type: attribute(&e, b"media-type")?.unwrap_or_default(),
                        properties: attribute(&e, b"properties")?,
                    }),
                    b"itemref" => {
                        if let Some(idref) = attribute(&e, b"idref")? {
                            package.spine.push(idref);
                        }
                    }
                    b"spine" => package.rtl = is_rtl_spine(&e)?,
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"metadata" {
                    in_metadata = false;
                }
                if let Some(element) = current.take() {
                    let value = text.trim().to_string();
                    match element.as_slice() {
                        b"identifier" if package.identifier.is_empty() => package.identifier = value,
                        b"title" if package.title.is_empty() => package.title = value,
                        b"creator" if package.author.is_none() => package.author = Some(value),
                        b"language" if package.language.is_empty() => package.language = value,
                        b"date" => package.date = Some(value),
                        b"modified" => package.modified = Some(value),
                        _ => {}
                    }
                    text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(package)
}

/// Parse the `<a>` entries of a navigation document's TOC `nav`.
pub fn parse_nav(content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);

    let mut entries = Vec::new();
    let mut in_toc = false;
    let mut nav_depth = 0usize;
    let mut link: Option<(String, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"nav" => {
                        nav_depth += 1;
                        if attribute(&e, b"epub:type")?.as_deref() == Some("toc") {
                            in_toc = true;
                        }
                    }
                    b"a" if in_toc => {
                        let href = attribute(&e, b"href")?.unwrap_or_default();
                        link = Some((href, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let Some((_, label)) = link.as_mut() {
                    label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some((_, label)) = link.as_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    label.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"a" => {
                        if let Some((href, label)) = link.take() {
                            entries.push(TocEntry::new(label.trim(), href));
                        }
                    }
                    b"nav" => {
                        nav_depth = nav_depth.saturating_sub(1);
                        if nav_depth == 0 {
                            in_toc = false;
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn is_rtl_spine(start: &BytesStart) -> Result<bool> {
    Ok(attribute(start, b"page-progression-direction")?.as_deref() == Some("rtl"))
}

/// Read and unescape one attribute value.
fn attribute(start: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::InvalidEpub(format!("malformed attribute: {e}")))?;
        if attr.key.as_ref() == key {
            let raw = String::from_utf8(attr.value.to_vec())?;
            let value = quick_xml::escape::unescape(&raw)
                .map_err(|e| Error::InvalidEpub(format!("bad attribute value: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::writer::CONTAINER_XML;

    #[test]
    fn test_parse_container_xml() {
        assert_eq!(
            parse_container_xml(CONTAINER_XML.as_bytes()).unwrap(),
            "EPUB/package.opf"
        );
        assert!(matches!(
            parse_container_xml(b"<container/>"),
            Err(Error::InvalidEpub(_))
        ));
    }

    #[test]
    fn test_parse_package() {
        let opf = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="pub-identifier">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="pub-identifier">id-1</dc:identifier>
    <dc:title>Fish &amp; Chips</dc:title>
    <dc:creator>Someone</dc:creator>
    <dc:language>ja</dc:language>
    <dc:date>2024-01-01T00:00:00Z</dc:date>
    <meta property="dcterms:modified">2024-01-02T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="toc" href="toc.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="page0" href="page0.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine page-progression-direction="rtl">
    <itemref idref="page0"/>
  </spine>
</package>"#;

        let package = parse_package(opf).unwrap();
        assert_eq!(package.identifier, "id-1");
        assert_eq!(package.title, "Fish & Chips");
        assert_eq!(package.author.as_deref(), Some("Someone"));
        assert_eq!(package.language, "ja");
        assert_eq!(package.date.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(package.modified.as_deref(), Some("2024-01-02T00:00:00Z"));
        assert_eq!(package.manifest.len(), 2);
        assert_eq!(package.nav_item().unwrap().id, "toc");
        assert_eq!(package.spine, ["page0"]);
        assert_eq!(package.direction(), Direction::Rtl);
    }

    #[test]
    fn test_malformed_attribute_is_an_error() {
        let opf = r#"<package><manifest><item id="a" id="b" href="x.xhtml"/></manifest></package>"#;
        assert!(matches!(parse_package(opf), Err(Error::InvalidEpub(_))));

        let container = br#"<container><rootfiles><rootfile full-path=EPUB/package.opf/></rootfiles></container>"#;
        assert!(matches!(
            parse_container_xml(container),
            Err(Error::InvalidEpub(_))
        ));
    }

    #[test]
    fn test_archive_path() {
        let package = PackageInfo {
            path: "EPUB/package.opf".to_string(),
            ..Default::default()
        };
        assert_eq!(package.archive_path("page0.xhtml"), "EPUB/page0.xhtml");

        let root = PackageInfo {
            path: "content.opf".to_string(),
            ..Default::default()
        };
        assert_eq!(root.archive_path("page0.xhtml"), "page0.xhtml");
    }

    #[test]
    fn test_parse_nav() {
        let nav = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="page9.xhtml">Ignored</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <ol>
      <li><a href="page0.xhtml">First &amp; foremost</a></li>
      <li><a href="page2.xhtml">Second chapter</a></li>
    </ol>
  </nav>
</body>
</html>"#;

        let toc = parse_nav(nav).unwrap();
        assert_eq!(
            toc,
            [
                TocEntry::new("First & foremost", "page0.xhtml"),
                TocEntry::new("Second chapter", "page2.xhtml"),
            ]
        );
    }
}
