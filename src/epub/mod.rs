mod archive;
mod builder;
pub mod parser;
pub mod writer;

pub use archive::{Content, Entry, write_archive, write_archive_file};
pub use builder::{BuildConfig, EpubBuilder};
pub use parser::{PackageInfo, PackageItem, entry_names, read_package, read_toc};
