use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read};

use epubgen::markup::{Element, Fragment};
use epubgen::{
    BuildConfig, Direction, EpubBuilder, Error, Metadata, TocEntry, entry_names, read_package,
    read_toc,
};
use tempfile::TempDir;
use zip::{CompressionMethod, ZipArchive};

fn test_metadata() -> Metadata {
    Metadata::new("Test")
        .with_author("author-test")
        .with_language("en")
        .with_identifier("test-id-12345")
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut file = archive.by_name(name).expect("entry should exist");
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

fn build_in_memory(book: EpubBuilder) -> Cursor<Vec<u8>> {
    let mut cursor = book.finalize_to_writer(Cursor::new(Vec::new())).unwrap();
    cursor.set_position(0);
    cursor
}

#[test]
fn test_three_page_scenario() {
    let mut book = EpubBuilder::new(test_metadata());

    let first = Element::new("p").text(format!("first-page{}", "hello ".repeat(10_000)));
    book.add_page(first, Some("First chapter")).unwrap();
    book.add_page(Element::new("p").text("second-page"), None)
        .unwrap();
    let third = Element::new("p").text(format!("third-page{}", "good morning ! ".repeat(1_000)));
    book.add_page(third, Some("Second chapter")).unwrap();

    assert_eq!(book.spine(), ["page0", "page1", "page2"]);
    assert_eq!(
        book.toc(),
        [
            TocEntry::new("First chapter", "page0.xhtml"),
            TocEntry::new("Second chapter", "page2.xhtml"),
        ]
    );

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.epub");
    book.finalize(&path).expect("Failed to write EPUB");

    let names = entry_names(File::open(&path).unwrap()).unwrap();
    assert_eq!(
        names,
        [
            "mimetype",
            "META-INF/container.xml",
            "EPUB/page0.xhtml",
            "EPUB/page1.xhtml",
            "EPUB/page2.xhtml",
            "EPUB/toc.xhtml",
            "EPUB/package.opf",
        ]
    );

    let package = read_package(File::open(&path).unwrap()).unwrap();
    assert_eq!(package.path, "EPUB/package.opf");
    assert_eq!(package.title, "Test");
    assert_eq!(package.author.as_deref(), Some("author-test"));
    assert_eq!(package.language, "en");
    assert_eq!(package.identifier, "test-id-12345");
    assert_eq!(package.spine, ["page0", "page1", "page2"]);

    let page_ids: Vec<_> = package
        .manifest
        .iter()
        .filter(|item| item.id.starts_with("page"))
        .map(|item| item.id.as_str())
        .collect();
    assert_eq!(page_ids, ["page0", "page1", "page2"]);

    let toc = read_toc(File::open(&path).unwrap()).unwrap();
    assert_eq!(
        toc,
        [
            TocEntry::new("First chapter", "page0.xhtml"),
            TocEntry::new("Second chapter", "page2.xhtml"),
        ]
    );
}

#[test]
fn test_mimetype_first_and_uncompressed() {
    let mut book = EpubBuilder::new(test_metadata());
    book.add_page(Element::new("p").text("only page"), None).unwrap();

    let mut archive = ZipArchive::new(build_in_memory(book)).unwrap();

    let mut mimetype = archive.by_index(0).unwrap();
    assert_eq!(mimetype.name(), "mimetype");
    assert_eq!(mimetype.compression(), CompressionMethod::Stored);
    let mut content = String::new();
    mimetype.read_to_string(&mut content).unwrap();
    assert_eq!(content, "application/epub+zip");
    drop(mimetype);

    assert_eq!(archive.by_index(1).unwrap().name(), "META-INF/container.xml");

    let container = read_entry(&mut archive, "META-INF/container.xml");
    assert!(container.contains("full-path=\"EPUB/package.opf\""));
    assert!(container.contains("media-type=\"application/oebps-package+xml\""));
}

#[test]
fn test_manifest_matches_stored_entries() {
    let config = BuildConfig::new().with_stylesheet("body { margin: 0; }");
    let mut book = EpubBuilder::with_config(test_metadata(), config);
    book.add_cover_image("cover", "images/cover.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0])
        .unwrap();
    book.add_page(
        Element::new("div")
            .child(Element::new("img").attr("src", "images/cover.jpg").attr("alt", "Cover")),
        Some("Cover"),
    )
    .unwrap();
    book.add_image("fig", "images/fig.png", vec![0x89, b'P', b'N', b'G'])
        .unwrap();
    book.add_page(Fragment::paragraphs("One.\n\nTwo."), None).unwrap();

    let cursor = build_in_memory(book);
    let names = entry_names(cursor.clone()).unwrap();
    let package = read_package(cursor).unwrap();

    // Every manifest href is stored; every stored content file is in the manifest.
    let manifest_paths: HashSet<String> = package
        .manifest
        .iter()
        .map(|item| package.archive_path(&item.href))
        .collect();
    let stored: HashSet<String> = names
        .iter()
        .filter(|name| name.starts_with("EPUB/") && name.as_str() != "EPUB/package.opf")
        .cloned()
        .collect();
    assert_eq!(manifest_paths, stored);
    assert_eq!(manifest_paths.len(), package.manifest.len());

    let media_types: Vec<_> = package
        .manifest
        .iter()
        .map(|item| (item.id.as_str(), item.media_type.as_str()))
        .collect();
    assert_eq!(
        media_types,
        [
            ("toc", "application/xhtml+xml"),
            ("stylesheet", "text/css"),
            ("cover", "image/jpeg"),
            ("page0", "application/xhtml+xml"),
            ("fig", "image/png"),
            ("page1", "application/xhtml+xml"),
        ]
    );
    assert_eq!(package.item("cover").unwrap().properties.as_deref(), Some("cover-image"));
    assert_eq!(package.nav_item().unwrap().href, "toc.xhtml");

    // Images never reach the reading order.
    assert_eq!(package.spine, ["page0", "page1"]);

    assert_eq!(names.last().map(String::as_str), Some("EPUB/package.opf"));
    assert_eq!(names[names.len() - 2], "EPUB/toc.xhtml");
}

#[test]
fn test_images_stored_verbatim() {
    let data: Vec<u8> = (0..=255).collect();
    let mut book = EpubBuilder::new(test_metadata());
    book.add_image("raw", "raw.png", data.clone()).unwrap();
    book.add_page(Element::new("p").text("x"), None).unwrap();

    let mut archive = ZipArchive::new(build_in_memory(book)).unwrap();
    let mut file = archive.by_name("EPUB/raw.png").unwrap();
    let mut stored = Vec::new();
    file.read_to_end(&mut stored).unwrap();
    assert_eq!(stored, data);
}

#[test]
fn test_rtl_book() {
    let config = BuildConfig::new().with_direction(Direction::Rtl);
    let mut book = EpubBuilder::with_config(Metadata::new("كتاب").with_language("ar"), config);
    book.add_page(Element::new("p").text("مرحبا"), Some("الفصل الأول")).unwrap();
    book.add_page(Element::new("p").text("وداعا"), None).unwrap();

    let cursor = build_in_memory(book);
    let package = read_package(cursor.clone()).unwrap();
    assert_eq!(package.direction(), Direction::Rtl);
    assert_eq!(package.title, "كتاب");

    let mut archive = ZipArchive::new(cursor).unwrap();
    for page in ["EPUB/page0.xhtml", "EPUB/page1.xhtml"] {
        let content = read_entry(&mut archive, page);
        assert!(content.contains("dir=\"rtl\""), "{page} should be rtl");
        assert!(content.contains("xml:lang=\"ar\""));
    }
}

#[test]
fn test_ltr_book_is_default() {
    let mut book = EpubBuilder::new(test_metadata());
    book.add_page(Element::new("p").text("x"), None).unwrap();

    let cursor = build_in_memory(book);
    let package = read_package(cursor.clone()).unwrap();
    assert_eq!(package.direction(), Direction::Ltr);

    let mut archive = ZipArchive::new(cursor).unwrap();
    let opf = read_entry(&mut archive, "EPUB/package.opf");
    assert!(!opf.contains("page-progression-direction"));
    assert!(read_entry(&mut archive, "EPUB/page0.xhtml").contains("dir=\"ltr\""));
}

#[test]
fn test_timestamps() {
    let mut book = EpubBuilder::new(test_metadata());
    book.add_page(Element::new("p").text("x"), None).unwrap();

    let package = read_package(build_in_memory(book)).unwrap();
    let date = package.date.expect("creation date");
    let modified = package.modified.expect("modification date");

    // CCYY-MM-DDThh:mm:ssZ
    for stamp in [&date, &modified] {
        assert_eq!(stamp.len(), 20, "{stamp}");
        assert!(stamp.ends_with('Z'));
        assert_eq!(&stamp[10..11], "T");
    }
    assert!(modified >= date);
}

#[test]
fn test_parsed_markup_page() {
    let fragment = Fragment::parse(
        "<h1>Chapter &amp; Verse</h1>\n<p class=\"x\">Some <strong>bold</strong> text.</p>",
    )
    .unwrap();

    let mut book = EpubBuilder::new(test_metadata());
    book.add_page(fragment, Some("Chapter & Verse")).unwrap();

    let cursor = build_in_memory(book);
    let toc = read_toc(cursor.clone()).unwrap();
    assert_eq!(toc, [TocEntry::new("Chapter & Verse", "page0.xhtml")]);

    let mut archive = ZipArchive::new(cursor).unwrap();
    let page = read_entry(&mut archive, "EPUB/page0.xhtml");
    assert!(page.contains(
        "<body><h1>Chapter &amp; Verse</h1>\n<p class=\"x\">Some <strong>bold</strong> text.</p></body>"
    ));
}

#[test]
fn test_markers_label_the_page_just_added() {
    let mut book = EpubBuilder::new(test_metadata());

    let first = Element::new("p").text(format!("first-page{}", "hello ".repeat(10_000)));
    book.add_page(first, None).unwrap();
    book.add_marker("First chapter").unwrap();
    book.add_page(Element::new("p").text("second-page"), None)
        .unwrap();
    let third = Element::new("p").text(format!("third-page{}", "good morning ! ".repeat(1_000)));
    book.add_page(third, None).unwrap();
    book.add_marker("Second chapter").unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.epub");
    book.finalize(&path).unwrap();

    let toc = read_toc(File::open(&path).unwrap()).unwrap();
    assert_eq!(
        toc,
        [
            TocEntry::new("First chapter", "page0.xhtml"),
            TocEntry::new("Second chapter", "page2.xhtml"),
        ]
    );

    let package = read_package(File::open(&path).unwrap()).unwrap();
    assert_eq!(package.spine, ["page0", "page1", "page2"]);
    assert_eq!(entry_names(File::open(&path).unwrap()).unwrap().len(), 7);
}

#[test]
fn test_control_char_label_is_rejected() {
    let mut book = EpubBuilder::new(test_metadata());
    let result = book.add_page(Element::new("p").text("x"), Some("bad\u{1}label"));
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    book.add_page(Element::new("p").text("x"), Some("good label")).unwrap();
    let cursor = build_in_memory(book);
    assert_eq!(read_toc(cursor).unwrap(), [TocEntry::new("good label", "page0.xhtml")]);
}

#[test]
fn test_failed_finalize_leaves_no_file() {
    let mut book = EpubBuilder::new(test_metadata().with_author("author\u{1}"));
    book.add_page(Element::new("p").text("x"), None).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.epub");
    let result = book.finalize(&path);

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_unwritable_destination() {
    let mut book = EpubBuilder::new(test_metadata());
    book.add_page(Element::new("p").text("x"), None).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("book.epub");
    assert!(matches!(book.finalize(&path), Err(Error::Io(_))));
    assert!(!path.exists());
}
