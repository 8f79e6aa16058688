//! Error types for Shotlist.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the frame source: the video could not be opened or decoded.
///
/// Always fatal for a run; nothing is written to the output directory.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Video not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Video unreadable: {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start decoder {}: {message}", binary.display())]
    Spawn { binary: PathBuf, message: String },

    #[error("Corrupt stream in {}: {message}", path.display())]
    CorruptStream { path: PathBuf, message: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

/// Failures of the phrase loader: the metadata file is malformed.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Metadata not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error reading metadata: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata is not valid JSON: {0}")]
    Parse(String),

    #[error("Unrecognized metadata layout: {0}")]
    UnrecognizedFormat(String),

    #[error("Mention {index}: missing product name")]
    MissingProductName { index: usize },

    #[error("Mention {index}: missing {field}")]
    MissingTimestamp { index: usize, field: &'static str },

    #[error("Mention {index}: {field} is negative or not finite ({value})")]
    InvalidTimestamp {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("Mention {index}: end_time {end} is before start_time {start}")]
    InvertedInterval { index: usize, start: f64, end: f64 },
}

/// Main error type for Shotlist operations.
#[derive(Error, Debug)]
pub enum ShotlistError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for frame source operations.
pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// Result type alias for Shotlist operations.
pub type Result<T> = std::result::Result<T, ShotlistError>;
