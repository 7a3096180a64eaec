//! Error types for folio operations.

use thiserror::Error;

/// Errors that can occur while opening a book or navigating it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed CFI: {0}")]
    MalformedCfi(String),

    #[error("Unresolvable CFI: {0}")]
    UnresolvableCfi(String),

    #[error("No book has been opened")]
    MissingBook,

    #[error("Invalid navigation target: {0}")]
    InvalidTarget(String),
}

pub type Result<T> = std::result::Result<T, Error>;
