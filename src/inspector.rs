//! Inspector
//!
//! Wraps a single EPUB file and answers the handful of metadata questions the
//! reporter needs. Loading is the only operation that can fail; every query
//! afterwards degrades to "absent" instead of raising an error, because
//! metadata in real-world books is frequently incomplete.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{epub::EpubDoc, error::LoadFailure, types::Namespace};

/// Rendering used for metadata that the book does not declare
pub const NOT_FOUND: &str = "Not found";

/// The result of inspecting one file
pub type InspectionOutcome = Result<BookRecord, LoadFailure>;

/// Display fields extracted from one successfully loaded book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    /// Base name of the source path, never empty
    pub filename: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub has_cover: bool,
}

impl BookRecord {
    pub fn title_or_sentinel(&self) -> &str {
        self.title.as_deref().unwrap_or(NOT_FOUND)
    }

    pub fn author_or_sentinel(&self) -> &str {
        self.author.as_deref().unwrap_or(NOT_FOUND)
    }

    pub fn language_or_sentinel(&self) -> &str {
        self.language.as_deref().unwrap_or(NOT_FOUND)
    }

    pub fn cover_label(&self) -> &'static str {
        if self.has_cover { "Yes" } else { "No" }
    }
}

/// Renders the five report lines of a record, without the trailing divider
impl fmt::Display for BookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File: {}", self.filename)?;
        writeln!(f, "Title: {}", self.title_or_sentinel())?;
        writeln!(f, "Author: {}", self.author_or_sentinel())?;
        writeln!(f, "Language: {}", self.language_or_sentinel())?;
        write!(f, "Has cover: {}", self.cover_label())
    }
}

/// Returns the base name of `path`
///
/// Paths without a final component (`/`, `..`) fall back to the whole path so
/// the name is never empty.
pub fn file_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) if !name.is_empty() => name.to_string_lossy().into_owned(),
        _ => {
            let whole = path.to_string_lossy().into_owned();
            if whole.is_empty() { ".".to_string() } else { whole }
        }
    }
}

/// One e-book file and, once loaded, its parsed document
#[derive(Debug)]
pub struct Inspector {
    path: PathBuf,
    book: Option<EpubDoc>,
}

impl Inspector {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            book: None,
        }
    }

    /// Loads the file at `path` and returns its display fields
    pub fn inspect<P: Into<PathBuf>>(path: P) -> InspectionOutcome {
        Self::new(path).load()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.book.is_some()
    }

    /// Opens the file and builds its [BookRecord]
    ///
    /// Any structural problem is returned as a [LoadFailure] naming the file.
    /// A failed load discards whatever was loaded before, so the queries
    /// below never answer from a stale document.
    pub fn load(&mut self) -> InspectionOutcome {
        let filename = file_name(&self.path);
        debug!("inspecting {}", self.path.display());

        match EpubDoc::open(&self.path) {
            Ok(book) => {
                self.book = Some(book);
                Ok(BookRecord {
                    filename,
                    title: self.get_metadata("title"),
                    author: self.get_metadata("creator"),
                    language: self.get_metadata("language"),
                    has_cover: self.has_cover_image(),
                })
            }
            Err(source) => {
                self.book = None;
                Err(LoadFailure { filename, source })
            }
        }
    }

    /// The first Dublin Core value of `field`
    ///
    /// Returns `None` when the field is absent or nothing is loaded. When a
    /// field has several values (e.g. co-authors) only the first is returned.
    pub fn get_metadata(&self, field: &str) -> Option<String> {
        self.book
            .as_ref()?
            .get_metadata_value(Namespace::Dc, field)
            .first()
            .map(|value| value.to_string())
    }

    /// Like [Inspector::get_metadata], rendering absence as [NOT_FOUND]
    pub fn get_metadata_or_sentinel(&self, field: &str) -> String {
        self.get_metadata(field)
            .unwrap_or_else(|| NOT_FOUND.to_string())
    }

    /// Whether any manifest item is the cover image
    pub fn has_cover_image(&self) -> bool {
        self.book
            .as_ref()
            .is_some_and(|book| book.cover_item().is_some())
    }
}
