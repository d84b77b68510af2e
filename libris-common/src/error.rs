//! Error type shared by the libris crates

use std::fmt::Display;
use thiserror::Error;

/// Result alias used throughout libris
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Library database failure, including foreign-key and CHECK violations
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure creating the library folder or reading a model
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable config file or a resolver setting out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Book id with no registered file
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected caller value: a blank manual entry, a custom field named
    /// after a dedicated one, a duplicate book, an unknown source name
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored row that no longer decodes (bad UUID or timestamp, unreadable
    /// genre JSON); also JSON encoding and logging setup failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// `NotFound` for a book id with no registered file
    pub fn unknown_book(book_id: impl Display) -> Self {
        Error::NotFound(format!("Book {}", book_id))
    }
}
