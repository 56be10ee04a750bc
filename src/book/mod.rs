use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Book metadata (Dublin Core subset written to the package document).
///
/// The creation timestamp is fixed when the metadata is built. The
/// modification timestamp is taken when the book is finalized.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub language: String,
    /// Public identifier, used as the package's unique identifier.
    pub identifier: String,
    pub created: DateTime<Utc>,
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: String::new(),
            language: String::new(),
            identifier: String::new(),
            created: Utc::now(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Override the creation timestamp (useful for reproducible builds).
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }
}

/// Reading direction of the whole book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    /// Value of the `dir` attribute on content documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// A table of contents entry. The book's TOC is flat.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TocEntry {
    pub label: String,
    pub href: String,
}

impl TocEntry {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
        }
    }
}

/// Recognized values of a manifest item's `properties` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestProperty {
    /// The EPUB navigation document.
    Nav,
    CoverImage,
}

impl ManifestProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestProperty::Nav => "nav",
            ManifestProperty::CoverImage => "cover-image",
        }
    }
}

/// A file listed in the package manifest. `href` is relative to the
/// package document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<ManifestProperty>,
}

impl ManifestItem {
    pub fn new(id: impl Into<String>, href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
            properties: None,
        }
    }

    pub fn with_property(mut self, property: ManifestProperty) -> Self {
        self.properties = Some(property);
        self
    }
}

/// Ordered manifest with unique IDs and unique hrefs.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    items: Vec<ManifestItem>,
    ids: HashSet<String>,
    hrefs: HashSet<String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `id` and `href` are both still free.
    pub fn check_free(&self, id: &str, href: &str) -> Result<()> {
        if self.ids.contains(id) {
            return Err(Error::invalid_input(format!(
                "manifest id '{id}' is already in use"
            )));
        }
        if self.hrefs.contains(href) {
            return Err(Error::invalid_input(format!(
                "manifest href '{href}' is already in use"
            )));
        }
        Ok(())
    }

    /// Append an item, rejecting duplicate IDs or hrefs.
    pub fn insert(&mut self, item: ManifestItem) -> Result<()> {
        self.check_free(&item.id, &item.href)?;
        self.ids.insert(item.id.clone());
        self.hrefs.insert(item.href.clone());
        self.items.push(item);
        Ok(())
    }

    /// Append an item whose ID and href are known to be free.
    pub(crate) fn push(&mut self, item: ManifestItem) {
        debug_assert!(self.check_free(&item.id, &item.href).is_ok());
        self.ids.insert(item.id.clone());
        self.hrefs.insert(item.href.clone());
        self.items.push(item);
    }

    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn contains_href(&self, href: &str) -> bool {
        self.hrefs.contains(href)
    }

    pub fn items(&self) -> &[ManifestItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.iter()
    }
}
