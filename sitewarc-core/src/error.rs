use sitewarc_scanner::ScanError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write record for {url}: {source}")]
    Write {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid index line: {0}")]
    InvalidIndexLine(String),

    #[error("Invalid crawl metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
