//! Scanner / Reporter
//!
//! Discovers candidate books directly inside one directory and prints a short
//! report for each of them. Files are processed strictly one after another,
//! and a book that fails to load only produces an error line; it never stops
//! the scan.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::{info, warn};
use walkdir::WalkDir;

use crate::{error::ScanError, inspector::Inspector};

/// Width of the divider printed after each book
pub const DIVIDER_WIDTH: usize = 50;

/// Counts of the outcomes of one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub loaded: usize,
    pub failed: usize,
}

impl ScanSummary {
    /// Number of report lines written for these outcomes
    pub fn report_lines(&self) -> usize {
        self.loaded * 6 + self.failed
    }
}

/// A restartable sequence of book files in one directory
///
/// Each call to [EpubFiles::iter] walks the directory afresh. Entries are
/// yielded in lexicographic order of their file names; subdirectories are not
/// descended into.
#[derive(Debug, Clone)]
pub struct EpubFiles {
    dir: PathBuf,
    extension: String,
}

impl EpubFiles {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn iter(&self) -> EpubFilesIter {
        let walker = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter();

        EpubFilesIter {
            walker,
            extension: self.extension.clone(),
        }
    }
}

impl<'a> IntoIterator for &'a EpubFiles {
    type Item = PathBuf;
    type IntoIter = EpubFilesIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy walk over one directory, see [EpubFiles]
pub struct EpubFilesIter {
    walker: walkdir::IntoIter,
    extension: String,
}

impl Iterator for EpubFilesIter {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable directory entry: {}", err);
                    continue;
                }
            };

            // Dangling symlinks are kept and fail at load time
            let candidate = entry.file_type().is_file()
                || (entry.path_is_symlink() && !entry.path().is_dir());
            if candidate && has_extension(entry.path(), &self.extension) {
                return Some(entry.into_path());
            }
        }
    }
}

/// Checks the extension of `path` against `extension`, ignoring ASCII case
fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_string()
}

fn ensure_dir(dir: &Path) -> Result<(), ScanError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(ScanError::NotADirectory {
            path: dir.to_path_buf(),
        })
    }
}

/// Lists the files in `dir` whose extension matches `extension`
///
/// The extension may be given with or without its leading dot.
pub fn enumerate<P: AsRef<Path>>(dir: P, extension: &str) -> Result<EpubFiles, ScanError> {
    let dir = dir.as_ref();
    ensure_dir(dir)?;

    Ok(EpubFiles {
        dir: dir.to_path_buf(),
        extension: normalize_extension(extension),
    })
}

/// Whether `dir` has no entries at all, of any kind
pub fn is_empty_dir<P: AsRef<Path>>(dir: P) -> Result<bool, ScanError> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    Ok(entries.next().is_none())
}

/// Scans `dir` and writes the report to `out`
///
/// An empty directory produces a single instructional line. Otherwise each
/// matching file produces either its five display lines and a divider, or a
/// single `Error loading ...` line.
pub fn run<P: AsRef<Path>, W: Write>(
    dir: P,
    extension: &str,
    out: &mut W,
) -> Result<ScanSummary, ScanError> {
    let dir = dir.as_ref();
    let files = enumerate(dir, extension)?;
    let mut summary = ScanSummary::default();

    if is_empty_dir(dir)? {
        writeln!(
            out,
            "Please add some {} files to the {} directory",
            files.extension,
            dir.display()
        )
        .map_err(|source| ScanError::Output { source })?;
        return Ok(summary);
    }

    info!("Analyzing {} files in {}", files.extension, dir.display());

    for path in &files {
        match Inspector::inspect(&path) {
            Ok(record) => {
                writeln!(out, "{}", record)
                    .and_then(|_| writeln!(out, "{}", "-".repeat(DIVIDER_WIDTH)))
                    .map_err(|source| ScanError::Output { source })?;
                summary.loaded += 1;
            }
            Err(failure) => {
                warn!("{}", failure);
                writeln!(out, "{}", failure).map_err(|source| ScanError::Output { source })?;
                summary.failed += 1;
            }
        }
    }

    info!(
        "Finished {}: {} loaded, {} failed",
        dir.display(),
        summary.loaded,
        summary.failed
    );

    Ok(summary)
}

/// [run] against the locked standard output
pub fn run_to_stdout<P: AsRef<Path>>(dir: P, extension: &str) -> Result<ScanSummary, ScanError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = run(dir, extension, &mut out)?;
    out.flush().map_err(|source| ScanError::Output { source })?;

    Ok(summary)
}
