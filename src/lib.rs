//! # epubgen
//!
//! A small library for building EPUB 3 books from markup fragments.
//!
//! ## Features
//!
//! - Pages from element trees, parsed XHTML or plain text
//! - Embedded images, an optional stylesheet and a cover image
//! - Table of contents entries per page or as standalone markers
//! - Left-to-right and right-to-left books
//! - Atomic output: a failed build never leaves a partial file behind
//!
//! ## Quick Start
//!
//! ```no_run
//! use epubgen::{BuildConfig, Direction, EpubBuilder, Metadata};
//! use epubgen::markup::{Element, Fragment};
//!
//! let metadata = Metadata::new("Test")
//!     .with_author("author-test")
//!     .with_language("en")
//!     .with_identifier("urn:uuid:0b3c5d4e-1111-4222-8333-944455556666");
//! let config = BuildConfig::new()
//!     .with_stylesheet("p { text-indent: 1em; }")
//!     .with_direction(Direction::Ltr);
//!
//! let mut book = EpubBuilder::with_config(metadata, config);
//! book.add_page(Element::new("h1").text("Chapter 1"), Some("First chapter"))?;
//! book.add_page(Fragment::paragraphs("Some text.\n\nMore text."), None)?;
//! book.add_image("fig1", "images/fig1.png", std::fs::read("fig1.png")?)?;
//! book.finalize("test.epub")?;
//! # Ok::<(), epubgen::Error>(())
//! ```
//!
//! ## Reading a Book Back
//!
//! ```no_run
//! use std::fs::File;
//!
//! let package = epubgen::read_package(File::open("test.epub")?)?;
//! println!("{} pages", package.spine.len());
//! # Ok::<(), epubgen::Error>(())
//! ```

pub mod book;
pub mod epub;
pub mod error;
pub mod markup;
pub(crate) mod util;

pub use book::{Direction, Manifest, ManifestItem, ManifestProperty, Metadata, TocEntry};
pub use epub::{BuildConfig, EpubBuilder, PackageInfo, entry_names, read_package, read_toc};
pub use error::{Error, Result};
