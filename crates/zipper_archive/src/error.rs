//! Error types that can be emitted from this library

use std::collections::TryReserveError;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Growing an in-memory buffer failed
    #[error("unable to grow buffer")]
    Allocation(#[from] TryReserveError),

    /// file is an invalid zip archive: {0}
    #[error("file is an invalid zip archive: {0}")]
    InvalidArchive(&'static str),

    /// entry uses unsupported compression method {0}
    #[error("entry uses unsupported compression method {0}")]
    UnsupportedCompression(u16),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// entry name must not be empty
    #[error("entry name must not be empty")]
    EmptyName,

    /// buffer must not be empty
    #[error("buffer must not be empty")]
    EmptyBuffer,

    /// an entry is already open for writing
    #[error("an entry is already open for writing")]
    EntryAlreadyOpen,

    /// no entry has been opened
    #[error("no entry has been opened")]
    NoEntryOpen,

    /// the archive cursor is past the last entry
    #[error("the archive cursor is past the last entry")]
    NoCurrentEntry,

    /// entry outgrew 32-bit sizes without large framing
    #[error("entry {0} outgrew 32-bit sizes without large framing")]
    EntryTooLarge(String),

    /// entry name escapes the destination directory
    #[error("entry name {0} escapes the destination directory")]
    UnsafeEntryName(String),

    /// refusing to overwrite an existing file
    #[error("refusing to overwrite {}", .0.display())]
    AlreadyExists(PathBuf),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
