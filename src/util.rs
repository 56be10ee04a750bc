//! Small helpers shared by the builder and the package reader.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

// ============================================================================
// Image Formats
// ============================================================================

/// Image formats that can be embedded in a book.
///
/// Detection is done via file extension only; the bytes are stored verbatim
/// and never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    /// SVG image (vector)
    Svg,
    WebP,
}

impl ImageFormat {
    /// Detect the format from the extension of an archive path.
    ///
    /// Matching is case-insensitive. Returns `None` for anything that is not
    /// a core EPUB image type.
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file_name.rsplit_once('.')?;

        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "svg" => Some(ImageFormat::Svg),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Get the MIME type string for this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Raster formats are already compressed and are stored without deflate.
    pub fn is_compressed(self) -> bool {
        !matches!(self, ImageFormat::Svg)
    }
}

// ============================================================================
// Names and Paths
// ============================================================================

/// Check whether `name` can be used as an XML name (element, attribute or ID).
///
/// ASCII subset of the XML `Name` production, plus any non-ASCII character.
/// Colons are allowed so prefixed names like `epub:type` pass.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    let is_start = |c: char| c.is_ascii_alphabetic() || c == '_' || c == ':' || !c.is_ascii();
    if !is_start(first) {
        return false;
    }

    chars.all(|c| is_start(c) || c.is_ascii_digit() || c == '-' || c == '.')
}

/// Check whether `id` can be used as a manifest ID (an XML name without colons).
pub fn is_manifest_id(id: &str) -> bool {
    is_xml_name(id) && !id.contains(':')
}

/// Reject characters outside the XML 1.0 `Char` production.
pub fn check_chars(text: &str) -> Result<()> {
    let invalid = |c: char| {
        ((c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r'))
            || matches!(c, '\u{fffe}' | '\u{ffff}')
    };
    match text.chars().find(|&c| invalid(c)) {
        Some(c) => Err(Error::invalid_input(format!(
            "character U+{:04X} cannot appear in XML content",
            c as u32
        ))),
        None => Ok(()),
    }
}

/// Validate a caller-supplied path relative to the content root.
///
/// Rejects empty, absolute and backslash paths, and any `.` or `..`
/// segment, so the stored entry can never escape `EPUB/`.
pub fn validate_content_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::invalid_input("resource path is empty"));
    }
    if path.starts_with('/') {
        return Err(Error::invalid_input(format!(
            "resource path '{path}' must be relative"
        )));
    }
    if path.contains('\\') {
        return Err(Error::invalid_input(format!(
            "resource path '{path}' must use '/' separators"
        )));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(Error::invalid_input(format!(
            "resource path '{path}' has an empty, '.' or '..' segment"
        )));
    }
    Ok(())
}

/// Strip a UTF-8 byte order mark, if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Resolve an entity reference body (`amp`, `#33`, `#x263A`, ...).
///
/// Covers the XML predefined entities, character references and `nbsp`,
/// which XHTML content commonly uses without a DTD.
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}

// ============================================================================
// Date Utilities
// ============================================================================

/// Format a timestamp the way EPUB 3 wants `dcterms:modified`:
/// `CCYY-MM-DDThh:mm:ssZ` in UTC, no fractional seconds.
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Tests
// ============================================================================
