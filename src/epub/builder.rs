//! The EPUB builder: accumulates pages and resources, then packages them.

use std::io::{Seek, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::archive::{self, Entry};
use super::writer::{
    self, CONTAINER_PATH, CONTAINER_XML, CONTENT_ROOT, CSS_MEDIA_TYPE, DocumentHead, MIMETYPE,
    NAV_HREF, NAV_ID, PACKAGE_PATH, STYLESHEET_HREF, STYLESHEET_ID,
    XHTML_MEDIA_TYPE,
};
use crate::book::{Direction, Manifest, ManifestItem, ManifestProperty, Metadata, TocEntry};
use crate::error::{Error, Result};
use crate::markup::Fragment;
use crate::util::{ImageFormat, check_chars, is_manifest_id, validate_content_path};

/// Default deflate level for text entries.
const DEFAULT_COMPRESSION_LEVEL: i64 = 6;

/// Configuration for a book build.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// CSS attached to the book and linked from every page.
    pub stylesheet: Option<String>,
    /// Reading direction of the whole book.
    pub direction: Direction,
    /// Deflate level for text entries (0-9, default 6).
    pub compression_level: Option<i64>,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheet = Some(css.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level);
        self
    }
}

/// Builds one EPUB archive.
///
/// Pages, images and table of contents entries are added in order; the
/// navigation and package documents are derived when the builder is
/// consumed by [`finalize`](Self::finalize).
///
/// # Example
///
/// ```no_run
/// use epubgen::{EpubBuilder, Metadata};
/// use epubgen::markup::Element;
///
/// let metadata = Metadata::new("My Book")
///     .with_author("Me")
///     .with_language("en")
///     .with_identifier("urn:uuid:8d2f6c1e-0000-4000-8000-000000000001");
///
/// let mut book = EpubBuilder::new(metadata);
/// book.add_page(Element::new("p").text("Once upon a time"), Some("Chapter 1"))?;
/// book.finalize("my-book.epub")?;
/// # Ok::<(), epubgen::Error>(())
/// ```
#[derive(Debug)]
pub struct EpubBuilder {
    metadata: Metadata,
    config: BuildConfig,
    manifest: Manifest,
    spine: Vec<String>,
    toc: Vec<TocEntry>,
    page_counter: usize,
    entries: Vec<Entry>,
    cover_image: Option<String>,
}

impl EpubBuilder {
    /// Create a builder with the default configuration.
    pub fn new(metadata: Metadata) -> Self {
        Self::with_config(metadata, BuildConfig::default())
    }

    /// Create a builder with custom settings.
    pub fn with_config(metadata: Metadata, config: BuildConfig) -> Self {
        let mut manifest = Manifest::new();
        manifest.push(
            ManifestItem::new(NAV_ID, NAV_HREF, XHTML_MEDIA_TYPE).with_property(ManifestProperty::Nav),
        );

        let mut entries = vec![
            Entry::text("mimetype", MIMETYPE).stored(),
            Entry::text(CONTAINER_PATH, CONTAINER_XML),
        ];

        if let Some(css) = &config.stylesheet {
            manifest.push(ManifestItem::new(STYLESHEET_ID, STYLESHEET_HREF, CSS_MEDIA_TYPE));
            entries.push(Entry::text(content_path(STYLESHEET_HREF), css.as_str()));
        }

        Self {
            metadata,
            config,
            manifest,
            spine: Vec::new(),
            toc: Vec::new(),
            page_counter: 0,
            entries,
            cover_image: None,
        }
    }

    /// Add a page to the end of the reading order.
    ///
    /// The fragment becomes the page's `<body>`. With a `toc_label`, the page
    /// also gets a table of contents entry. Returns the page's manifest ID.
    pub fn add_page(&mut self, content: impl Into<Fragment>, toc_label: Option<&str>) -> Result<String> {
        let content = content.into();
        content.validate()?;
        if let Some(label) = toc_label {
            check_chars(label)?;
        }

        let id = format!("page{}", self.page_counter);
        let href = format!("{id}.xhtml");
        self.manifest.check_free(&id, &href)?;

        let document = writer::page_document(self.document_head(), toc_label.unwrap_or(&id), &content)?;

        self.manifest
            .insert(ManifestItem::new(id.as_str(), href.as_str(), XHTML_MEDIA_TYPE))?;
        self.entries.push(Entry::text(content_path(&href), document));
        self.spine.push(id.clone());
        if let Some(label) = toc_label {
            self.toc.push(TocEntry::new(label, href.as_str()));
        }
        self.page_counter += 1;

        debug!(page = %id, toc_label, "added page");
        Ok(id)
    }

    /// Add a table of contents entry pointing at the most recently added page.
    pub fn add_marker(&mut self, label: impl Into<String>) -> Result<()> {
        let Some(last) = self.page_counter.checked_sub(1) else {
            return Err(Error::invalid_input(
                "a content marker needs a page to point at",
            ));
        };
        let label = label.into();
        check_chars(&label)?;

        let entry = TocEntry::new(label, format!("page{last}.xhtml"));
        debug!(label = %entry.label, href = %entry.href, "added content marker");
        self.toc.push(entry);
        Ok(())
    }

    /// Embed an image under `path` (relative to the content directory).
    ///
    /// The media type follows the path's extension. Images are listed in the
    /// manifest but never in the reading order.
    pub fn add_image(&mut self, id: &str, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        self.insert_image(id, path, data.into(), None)
    }

    /// Embed the cover image. A book has at most one.
    pub fn add_cover_image(&mut self, id: &str, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        if let Some(existing) = &self.cover_image {
            return Err(Error::invalid_input(format!(
                "cover image already set to '{existing}'"
            )));
        }
        self.insert_image(id, path, data.into(), Some(ManifestProperty::CoverImage))?;
        self.cover_image = Some(id.to_string());
        Ok(())
    }

    fn insert_image(
        &mut self,
        id: &str,
        path: &str,
        data: Vec<u8>,
        property: Option<ManifestProperty>,
    ) -> Result<()> {
        if !is_manifest_id(id) {
            return Err(Error::invalid_input(format!(
                "'{id}' is not a valid manifest id"
            )));
        }
        validate_content_path(path)?;
        let format = ImageFormat::from_path(path).ok_or_else(|| {
            Error::invalid_input(format!("unsupported image type for '{path}'"))
        })?;

        let mut item = ManifestItem::new(id, path, format.mime_type());
        item.properties = property;
        self.manifest.insert(item)?;

        let mut entry = Entry::binary(content_path(path), data);
        if format.is_compressed() {
            entry = entry.stored();
        }
        debug!(id, path, bytes = entry.content.len(), "added image");
        self.entries.push(entry);
        Ok(())
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Manifest IDs of the pages, in reading order.
    pub fn spine(&self) -> &[String] {
        &self.spine
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    /// Entries added so far; navigation and package documents are not
    /// included until the book is finalized.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn page_count(&self) -> usize {
        self.page_counter
    }

    /// Write the finished book to `path`.
    ///
    /// Consumes the builder. The archive appears at `path` only if every
    /// step succeeds.
    pub fn finalize(self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let level = self.compression_level();
        let entries = self.into_entries(Utc::now())?;
        archive::write_archive_file(&entries, path, level)?;

        info!(path = %path.display(), entries = entries.len(), "wrote EPUB");
        Ok(())
    }

    /// Write the finished book to any [`Write`] + [`Seek`] destination.
    ///
    /// Useful for writing to memory buffers.
    pub fn finalize_to_writer<W: Write + Seek>(self, writer: W) -> Result<W> {
        let level = self.compression_level();
        let entries = self.into_entries(Utc::now())?;
        let writer = archive::write_archive(&entries, writer, level)?;

        info!(entries = entries.len(), "wrote EPUB");
        Ok(writer)
    }

    /// Produce the complete, ordered entry list: everything added so far,
    /// then the navigation document, then the package document.
    pub fn into_entries(mut self, modified: DateTime<Utc>) -> Result<Vec<Entry>> {
        if self.spine.is_empty() {
            return Err(Error::invalid_input("a book needs at least one page"));
        }
        let metadata = &self.metadata;
        for (field, value) in [
            ("title", &metadata.title),
            ("author", &metadata.author),
            ("language", &metadata.language),
            ("identifier", &metadata.identifier),
        ] {
            if let Err(Error::InvalidInput(reason)) = check_chars(value) {
                return Err(Error::invalid_input(format!("metadata {field}: {reason}")));
            }
        }

        let nav = writer::nav_document(self.document_head(), &self.toc)?;
        let package = writer::package_document(
            &self.metadata,
            &modified,
            &self.manifest,
            &self.spine,
            self.config.direction,
        )?;

        self.entries.push(Entry::text(content_path(NAV_HREF), nav));
        self.entries.push(Entry::text(PACKAGE_PATH, package));
        Ok(self.entries)
    }

    fn document_head(&self) -> DocumentHead<'_> {
        DocumentHead {
            language: &self.metadata.language,
            direction: self.config.direction,
            stylesheet: self.config.stylesheet.as_ref().map(|_| STYLESHEET_HREF),
        }
    }

    fn compression_level(&self) -> i64 {
        self.config
            .compression_level
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL)
    }
}

fn content_path(href: &str) -> String {
    format!("{CONTENT_ROOT}{href}")
}
