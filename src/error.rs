//! Error Type Definition Module
//!
//! This module defines the errors raised while opening an EPUB container and
//! while scanning a directory for books. Structural problems found by the
//! document model are collected in [EpubError]; the inspector wraps them in a
//! [LoadFailure] that names the offending file, and the scanner reports
//! directory-level problems as [ScanError].
//!
//! Missing metadata is never an error. It is represented as `None` and only
//! rendered as a sentinel when printed.

use std::path::PathBuf;

use thiserror::Error;

/// Types of errors that can occur while loading an EPUB document
///
/// Every variant describes a structural problem that prevents the package
/// document from being read. Once any of these is raised the document is
/// considered unusable as a whole; there is no partially loaded state.
#[derive(Debug, Error)]
pub enum EpubError {
    /// ZIP archive related errors
    ///
    /// Raised when the file is not a ZIP container, is truncated, or when a
    /// required entry such as `META-INF/container.xml` is absent.
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    /// Data Decoding Error - Null data
    ///
    /// This error occurs when trying to decode or parse an empty stream.
    #[error("Decode error: The data is empty.")]
    EmptyDataError,

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// Missing required attribute error
    ///
    /// Triggered when an XML element of the container or package document
    /// lacks an attribute the format requires, e.g. `rootfile@full-path`.
    #[error(
        "Missing required attribute: The \"{attribute}\" attribute is a must attribute for the \"{tag}\" element."
    )]
    MissingRequiredAttribute { tag: String, attribute: String },

    /// Non-canonical file structure error
    ///
    /// This error is triggered when a required XML element is missing
    /// from the container or package document.
    #[error("Non-canonical file: The \"{tag}\" elements was not found.")]
    NonCanonicalFile { tag: String },

    /// Relative link leak error
    ///
    /// A manifest href climbs above the root of the container.
    #[error("Relative link leakage: Path \"{path}\" is out of container range.")]
    RelativeLinkLeakage { path: String },

    /// UTF-8 decoding error
    #[error("Decode error: {source}")]
    Utf8DecodeError { source: std::string::FromUtf8Error },

    /// UTF-16 decoding error
    #[error("Decode error: {source}")]
    Utf16DecodeError { source: std::string::FromUtf16Error },

    /// QuickXml error
    ///
    /// This error occurs when the package or container document is not
    /// well-formed XML.
    #[error("QuickXml error: {source}")]
    QuickXmlError { source: quick_xml::Error },
}

impl From<zip::result::ZipError> for EpubError {
    fn from(value: zip::result::ZipError) -> Self {
        EpubError::ArchiveError { source: value }
    }
}

impl From<quick_xml::Error> for EpubError {
    fn from(value: quick_xml::Error) -> Self {
        EpubError::QuickXmlError { source: value }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

impl From<std::string::FromUtf8Error> for EpubError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        EpubError::Utf8DecodeError { source: value }
    }
}

impl From<std::string::FromUtf16Error> for EpubError {
    fn from(value: std::string::FromUtf16Error) -> Self {
        EpubError::Utf16DecodeError { source: value }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::MissingRequiredAttribute {
                    tag: l_tag,
                    attribute: l_attribute,
                },
                Self::MissingRequiredAttribute {
                    tag: r_tag,
                    attribute: r_attribute,
                },
            ) => l_tag == r_tag && l_attribute == r_attribute,
            (Self::NonCanonicalFile { tag: l_tag }, Self::NonCanonicalFile { tag: r_tag }) => {
                l_tag == r_tag
            }
            (
                Self::RelativeLinkLeakage { path: l_path },
                Self::RelativeLinkLeakage { path: r_path },
            ) => l_path == r_path,
            (
                Self::Utf8DecodeError { source: l_source },
                Self::Utf8DecodeError { source: r_source },
            ) => l_source == r_source,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// A book that could not be loaded
///
/// Carries the base name of the file together with the structural error
/// reported by the document model. The display form is the exact line the
/// reporter prints for the file.
#[derive(Debug, Error)]
#[error("Error loading {filename}: {source}")]
pub struct LoadFailure {
    /// Base name of the file that failed to load
    pub filename: String,

    #[source]
    pub source: EpubError,
}

/// Errors raised while enumerating the book directory
///
/// These concern the directory itself. Failures of individual books are
/// reported as [LoadFailure] and never surface here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Not a directory: \"{}\" does not exist or is not a directory.", path.display())]
    NotADirectory { path: PathBuf },

    #[error("IO error while reading \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The report could not be written, e.g. stdout was closed
    #[error("Failed to write report: {source}")]
    Output { source: std::io::Error },
}
