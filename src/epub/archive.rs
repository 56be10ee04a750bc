//! ZIP packaging of the accumulated archive entries.

use std::io::{Seek, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::writer::MIMETYPE;
use crate::error::{Error, Result};

/// Content of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// UTF-8 text (XML documents, CSS).
    Text(String),
    /// Raw bytes, written verbatim.
    Binary(Vec<u8>),
}

impl Content {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(data) => data,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// A file that will land in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub content: Content,
    /// Store without compression (mimetype, already-compressed images).
    pub stored: bool,
}

impl Entry {
    pub fn text(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Content::Text(text.into()),
            stored: false,
        }
    }

    pub fn binary(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content: Content::Binary(data),
            stored: false,
        }
    }

    pub fn stored(mut self) -> Self {
        self.stored = true;
        self
    }
}

/// Write entries to `path` as a ZIP archive.
///
/// The archive is assembled in a temporary file next to the destination
/// and renamed over it only once complete, so a failed build never leaves
/// a partial file at `path`.
pub fn write_archive_file(entries: &[Entry], path: &Path, compression_level: i64) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    write_archive(entries, temp.as_file_mut(), compression_level)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    debug!(path = %path.display(), "archive persisted");
    Ok(())
}

/// Write entries to any [`Write`] + [`Seek`] destination, in order.
///
/// The first entry must be the `mimetype` file; it is always written
/// uncompressed regardless of its `stored` flag.
pub fn write_archive<W: Write + Seek>(entries: &[Entry], writer: W, compression_level: i64) -> Result<W> {
    match entries.first() {
        Some(first) if first.path == "mimetype" && first.content.as_bytes() == MIMETYPE.as_bytes() => {}
        _ => {
            return Err(Error::InvalidEpub(
                "the first archive entry must be the mimetype file".to_string(),
            ));
        }
    }

    let mut zip = ZipWriter::new(writer);

    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level));

    for (i, entry) in entries.iter().enumerate() {
        let options = if i == 0 || entry.stored { stored } else { deflated };
        zip.start_file(entry.path.as_str(), options)?;
        zip.write_all(entry.content.as_bytes())?;
    }

    Ok(zip.finish()?)
}
