use std::path::PathBuf;
use thiserror::Error;

/// Structural failures while walking an XML document.
///
/// Value-level problems (bad URL, date or duration) never show up here,
/// they are logged and the affected field stays unset.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid text encoding: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("Unexpected end of document, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("Expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("Unexpected text content inside <{element}>")]
    UnexpectedText { element: String },

    #[error("Element <{element}> must only contain text, found <{child}>")]
    NestedElement { element: String, child: String },
}

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] ParseError),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Document has no <channel> element")]
    MissingChannel,
}

/// Errors that can occur during metadata operations
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read metadata file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write metadata file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse metadata JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}
