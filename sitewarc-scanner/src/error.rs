use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
