//! Command line interface of the `epub-inspector` binary

use std::path::PathBuf;

use clap::Parser;

/// Directory scanned when none is given on the command line
pub const DEFAULT_DIR: &str = "sample_books";

/// Print title, author, language and cover presence of every EPUB in a directory
#[derive(Parser, Debug)]
#[command(name = "epub-inspector", version, about)]
pub struct Cli {
    /// Directory holding the books; only its direct children are inspected
    #[arg(default_value = DEFAULT_DIR)]
    pub dir: PathBuf,

    /// File extension of the books, with or without the leading dot
    #[arg(long, default_value = "epub")]
    pub extension: String,

    /// Verbosity level, repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default log filter for the chosen verbosity, used unless `RUST_LOG` is set
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
