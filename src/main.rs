//! epubgen - build EPUB books from text and XHTML files

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use epubgen::markup::Fragment;
use epubgen::{BuildConfig, Direction, EpubBuilder, Metadata, read_package, read_toc};

#[derive(Parser)]
#[command(name = "epubgen")]
#[command(version, about = "Build EPUB books from text and XHTML files", long_about = None)]
#[command(after_help = "EXAMPLES:
    epubgen build -o book.epub --title Test --author Me --language en --id urn:isbn:1 \\
        intro.txt=Introduction ch1.xhtml=\"Chapter 1\" ch1-notes.txt
    epubgen info book.epub")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Build an EPUB from page files
    Build(BuildArgs),
    /// Show the metadata, manifest and reading order of an EPUB
    Info {
        /// EPUB file to inspect
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Output file
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    #[arg(long)]
    title: String,

    #[arg(long)]
    author: String,

    /// Language code, e.g. "en"
    #[arg(long, default_value = "en")]
    language: String,

    /// Public identifier of the book
    #[arg(long)]
    id: String,

    /// Stylesheet linked from every page
    #[arg(long, value_name = "FILE")]
    css: Option<PathBuf>,

    /// Right-to-left reading direction
    #[arg(long)]
    rtl: bool,

    /// Embed an image as ID=FILE (stored under the file's name)
    #[arg(long = "image", value_name = "ID=FILE")]
    images: Vec<String>,

    /// Embed the cover image as ID=FILE
    #[arg(long, value_name = "ID=FILE")]
    cover: Option<String>,

    /// Page files in reading order, optionally FILE=Label to add a TOC entry.
    /// .xhtml/.html/.xml files are parsed as markup, anything else as plain text.
    #[arg(value_name = "PAGE", required = true)]
    pages: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Build(args) => build(args),
        Command::Info { input, json } => show_info(&input, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(args: BuildArgs) -> Result<(), String> {
    let metadata = Metadata::new(args.title)
        .with_author(args.author)
        .with_language(args.language)
        .with_identifier(args.id);

    let mut config = BuildConfig::new();
    if let Some(css_path) = &args.css {
        config = config.with_stylesheet(read_text(css_path)?);
    }
    if args.rtl {
        config = config.with_direction(Direction::Rtl);
    }

    let mut book = EpubBuilder::with_config(metadata, config);

    if let Some(arg) = &args.cover {
        let (id, file) = split_pair(arg)?;
        let (name, data) = read_image(file)?;
        book.add_cover_image(id, &name, data).map_err(|e| e.to_string())?;
    }
    for arg in &args.images {
        let (id, file) = split_pair(arg)?;
        let (name, data) = read_image(file)?;
        book.add_image(id, &name, data).map_err(|e| e.to_string())?;
    }

    for arg in &args.pages {
        let (file, label) = match arg.split_once('=') {
            Some((file, label)) => (file, Some(label)),
            None => (arg.as_str(), None),
        };
        let path = Path::new(file);
        let fragment = load_page(path)?;
        let id = book
            .add_page(fragment, label)
            .map_err(|e| format!("{}: {e}", path.display()))?;
        debug!(file, page = %id, "page loaded");
    }

    let pages = book.page_count();
    book.finalize(&args.output).map_err(|e| e.to_string())?;
    info!(output = %args.output.display(), pages, "book built");
    Ok(())
}

fn show_info(path: &Path, json: bool) -> Result<(), String> {
    let package = read_package(File::open(path).map_err(|e| e.to_string())?)
        .map_err(|e| e.to_string())?;
    let toc = read_toc(File::open(path).map_err(|e| e.to_string())?).map_err(|e| e.to_string())?;

    if json {
        let toc_json: Vec<_> = toc
            .iter()
            .map(|entry| serde_json::json!({ "label": entry.label, "href": entry.href }))
            .collect();
        let output = serde_json::json!({ "package": package, "toc": toc_json });
        let text = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    println!("File: {}", path.display());
    println!("Title: {}", package.title);
    if let Some(ref author) = package.author {
        println!("Author: {author}");
    }
    println!("Language: {}", package.language);
    println!("Identifier: {}", package.identifier);
    if let Some(ref modified) = package.modified {
        println!("Modified: {modified}");
    }
    println!("Direction: {}", package.direction().as_str());
    println!("Pages: {}", package.spine.len());
    println!("Manifest items: {}", package.manifest.len());
    for item in &package.manifest {
        println!("  {} -> {} ({})", item.id, item.href, item.media_type);
    }
    println!("TOC entries: {}", toc.len());
    for entry in &toc {
        println!("  - {} -> {}", entry.label, entry.href);
    }

    Ok(())
}

fn load_page(path: &Path) -> Result<Fragment, String> {
    let text = read_text(path)?;
    let is_markup = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "xhtml" | "html" | "htm" | "xml"));

    if is_markup {
        Fragment::parse(&text).map_err(|e| format!("{}: {e}", path.display()))
    } else {
        Ok(Fragment::paragraphs(&text))
    }
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))
}

/// Read an image file; it is stored in the book under its file name.
fn read_image(file: &str) -> Result<(String, Vec<u8>), String> {
    let path = Path::new(file);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("{file}: not a file name"))?
        .to_string();
    let data = std::fs::read(path).map_err(|e| format!("{file}: {e}"))?;
    Ok((name, data))
}

fn split_pair(arg: &str) -> Result<(&str, &str), String> {
    arg.split_once('=')
        .filter(|(id, file)| !id.is_empty() && !file.is_empty())
        .ok_or_else(|| format!("expected ID=FILE, got '{arg}'"))
}
