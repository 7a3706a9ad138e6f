//! Error types for `cabinet-lib`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for request validation and archive creation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Request Errors ====================
    /// A required request field was left empty.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// The archive name would place the archive outside the target directory.
    #[error("archive name {0:?} must be a plain file name")]
    InvalidArchiveName(String),

    /// Unknown compression level string.
    #[error("unknown compression level {0:?} (expected none, fast or max)")]
    UnknownCompression(String),

    // ==================== Task Errors ====================
    /// Another archive operation holds the in-flight slot.
    #[error("another archive operation is already in progress")]
    Busy,

    /// The source path is missing or is not a directory.
    #[error("source directory {} does not exist or is not a directory", .0.display())]
    SourceNotDirectory(PathBuf),

    /// The destination file could not be created or truncated.
    #[error("{source}")]
    CreateDestination {
        /// Destination that was being created.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The blocking pack worker panicked or was aborted.
    #[error("archiver worker failed: {0}")]
    Worker(String),

    // ==================== Pack Errors ====================
    /// IO error while reading sources or writing the cabinet.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal failed.
    #[error("traversal error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A skip pattern is not a valid glob.
    #[error("invalid skip pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Parser error from `glob`.
        source: glob::PatternError,
    },

    /// No files were left to pack after traversal and filtering.
    #[error("no files to archive in {}", .0.display())]
    NoFiles(PathBuf),

    /// A single file does not fit in one cabinet folder.
    #[error("{} is {size} bytes, larger than a cabinet folder can hold", .path.display())]
    FileTooLarge {
        /// The file that is too large.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
    },

    /// More files than a single cabinet can index.
    #[error("{0} files exceed the cabinet file count limit")]
    TooManyFiles(usize),

    /// Packing was cancelled before it finished.
    #[error("archiving was cancelled")]
    Cancelled,
}

/// Result type for `cabinet-lib` operations.
pub type Result<T> = std::result::Result<T, Error>;
