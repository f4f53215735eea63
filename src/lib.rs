//! EPUB inspector
//!
//! A small library and command line tool that opens EPUB eBook files and
//! reports their basic metadata: title, author, language and whether a cover
//! image is declared.
//!
//! The library is split in three layers:
//!
//! - [epub]: a read-only model of the container and package document, with
//!   Dublin Core metadata and a typed manifest. EPUB 2 and EPUB 3 are both
//!   supported.
//! - [inspector]: wraps one file and turns the model into a [BookRecord],
//!   degrading missing metadata to absence instead of failing.
//! - [scanner]: enumerates the books in a directory and prints the report.
//!
//! ## Quick Start
//!
//! ```rust, ignore
//! # use epub_inspector::inspector::Inspector;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let record = Inspector::inspect("sample_books/book1.epub")?;
//!
//! println!("{}", record);
//! println!("Title: {:?}", record.title);
//! # Ok(())
//! # }
//! ```
//!
//! Scanning a whole directory writes the same report the binary prints:
//!
//! ```rust, ignore
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut out = Vec::new();
//! let summary = epub_inspector::scanner::run("sample_books", "epub", &mut out)?;
//! println!("{} loaded, {} failed", summary.loaded, summary.failed);
//! # Ok(())
//! # }
//! ```

pub(crate) mod utils;

pub mod cli;
pub mod epub;
pub mod error;
pub mod inspector;
pub mod scanner;
pub mod types;

#[cfg(test)]
mod test_support;

pub use inspector::{BookRecord, InspectionOutcome, Inspector};
