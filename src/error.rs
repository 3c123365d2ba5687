//! Error types for the MPQ library.
//!
//! Errors are layered: low-level parsers (header, tables, crypto, compression)
//! each define their own `thiserror` enum, and [`Error`] composes them with
//! `#[from]`. Every variant maps to one of the coarse [`ErrorKind`] buckets
//! so callers that only care about the broad failure class don't need to
//! match on the full enum.

use std::io;
use std::path::PathBuf;
use thiserror::Error as ThisError;

use crate::compression::CompressionError;
use crate::crypto::CryptoError;
use crate::header::HeaderError;
use crate::tables::TableError;

/// Coarse error classification, independent of which layer raised the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Archive could not be opened.
    Open,
    /// Archive could not be closed cleanly.
    Close,
    /// A seek operation failed or landed out of bounds.
    Seek,
    /// A read operation failed or returned short.
    Read,
    /// The archive or a member's data does not match the expected format.
    Format,
    /// An allocation-sized quantity in the archive is unreasonable.
    Malloc,
    /// Decryption failed, or no valid key could be recovered.
    Decrypt,
    /// Decompression failed.
    Unpack,
    /// A size field in the archive is inconsistent.
    Size,
    /// The requested member does not exist in the archive.
    Exist,
    /// The crypt table singleton was used before `init()` or after `shutdown()`.
    NotInitialized,
    /// The archive uses a feature this crate does not implement.
    Unsupported,
}

/// Primary error type for MPQ operations.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Header could not be located or parsed.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// Hash or block table could not be read.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Crypt table or key-recovery failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Decompression failure.
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// No member with this name (and locale) exists in the archive.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The archive's hash/block tables are inconsistent or malformed.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// `Archive::open` failed for the given path.
    #[error("failed to open archive at {0}")]
    ArchiveOpen(PathBuf),

    /// The crypt table singleton was used outside an `init()`/`shutdown()` pair.
    #[error("crypt table not initialized")]
    NotInitialized,

    /// Archive uses a feature outside this crate's scope (v3/v4 HET/BET,
    /// FIX_KEY adjustment, unknown compression mask bits, and so on).
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Classify this error into a coarse [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => ErrorKind::Open,
                io::ErrorKind::UnexpectedEof => ErrorKind::Read,
                _ => ErrorKind::Read,
            },
            Error::Header(e) => e.kind(),
            Error::Table(e) => e.kind(),
            Error::Crypto(e) => e.kind(),
            Error::Compression(e) => e.kind(),
            Error::FileNotFound(_) => ErrorKind::Exist,
            Error::InvalidArchive(_) => ErrorKind::Format,
            Error::ArchiveOpen(_) => ErrorKind::Open,
            Error::NotInitialized => ErrorKind::NotInitialized,
            Error::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Shorthand for constructing a format error from a displayable value.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Error::InvalidArchive(msg.into())
    }
}

/// Result type for MPQ operations.
pub type Result<T> = std::result::Result<T, Error>;
