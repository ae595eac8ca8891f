//! Error types for pass building and bundling.
//!
//! This module defines the [`enum@Error`] enum covering all failure cases
//! of the packaging pipeline: invalid pass data, asset problems, signing
//! failures, archive I/O and the push-notification collaborator.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use crate::pass::Violation;
use std::path::PathBuf;
use thiserror::Error;

/// Message used when the bundle has no passes.
pub const EMPTY_BUNDLE_MESSAGE: &str =
    "Cannot create bundle with no passes. Add at least one pass before creating the bundle.";

/// Message used when an archive cannot be written to its destination.
pub const ARCHIVE_WRITE_MESSAGE: &str = "Could not write zip archive to file.";

/// Error type for pass operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Match on variants to handle specific failure cases.
///
/// # Examples
///
/// ```no_run
/// use pkpass::{Error, PassBundle};
///
/// let bundle = PassBundle::new();
/// match bundle.build() {
///     Ok(bytes) => println!("{} bytes", bytes.len()),
///     Err(Error::EmptyBundle) => eprintln!("add a pass first"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// Pass data is missing required fields or has fields of the wrong type.
    ///
    /// Carries every violation found, not only the first one.
    #[error("Invalid pass data: {}", format_violations(.0))]
    Validation(Vec<Violation>),

    /// An asset path does not resolve to a readable file.
    #[error("File not found or not readable: {}", .path.display())]
    FileNotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// An asset with this archive name was already attached.
    #[error("Duplicate asset name: {0}")]
    DuplicateAsset(String),

    /// The asset name is reserved by the pass format or is not a valid
    /// relative archive path.
    #[error("Invalid asset name: {0}")]
    InvalidAssetName(String),

    /// Key material could not be loaded or the signing primitive failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The archive could not be assembled, flushed or written.
    #[error("{message}")]
    Archive {
        /// Human-readable description.
        message: String,
        /// Underlying I/O failure, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// A bundle was built before any pass was added.
    #[error("{}", EMPTY_BUNDLE_MESSAGE)]
    EmptyBundle,

    /// An empty byte sequence was offered as a signed pass.
    #[error("Signed pass archive is empty")]
    EmptyPass,

    /// A download file name would not survive as an HTTP header value.
    #[error("Invalid download file name: {0:?}")]
    InvalidFileName(String),

    /// The HTTP response could not be assembled.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP archive operation failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Push configuration is incomplete.
    #[error("{0}")]
    PushConfig(String),

    /// The push auth key is missing, unreadable or not a valid P-256 key.
    #[error("Key error: {0}")]
    Key(String),

    /// The push request failed in transport or returned a non-success status.
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl Error {
    /// Archive error carrying the standard write-failure message.
    pub(crate) fn archive_write(source: std::io::Error) -> Self {
        Error::Archive {
            message: ARCHIVE_WRITE_MESSAGE.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn archive(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Archive {
            message: message.into(),
            source: Some(source),
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
