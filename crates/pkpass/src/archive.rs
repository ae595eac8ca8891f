//! Pass archive assembly.
//!
//! Writes `.pkpass` (and `.pkpasses`) ZIP archives. Every entry is a plain
//! file: no directory entries, no extra fields, and a fixed 1980-01-01
//! timestamp, so the same inputs always produce the same bytes.
//!
//! # Examples
//!
//! ```
//! use pkpass::archive::{ArchiveAssembler, CompressionLevel};
//! use pkpass::AssetCollection;
//!
//! let mut assets = AssetCollection::new();
//! assets.add_content("icon.png", b"PNG_DATA".to_vec())?;
//!
//! let archive = ArchiveAssembler::new(CompressionLevel::DEFAULT)
//!     .assemble(b"{}", b"{}", b"SIG", &assets)?;
//! assert!(archive.starts_with(b"PK"));
//! # Ok::<(), pkpass::Error>(())
//! ```

use crate::pass::{AssetCollection, MANIFEST_JSON, PASS_JSON, SIGNATURE};
use crate::{Error, Result};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// ZIP compression level for pass and bundle archives.
///
/// Use the provided constants for common use cases, or [`CompressionLevel::new`]
/// for custom levels.
///
/// # Examples
///
/// ```
/// use pkpass::archive::CompressionLevel;
///
/// let fast = CompressionLevel::NONE;      // Stored
/// let balanced = CompressionLevel::DEFAULT; // Level 6
/// let small = CompressionLevel::MAX;      // Maximum compression
///
/// // Or create a custom level (clamped to 0-9)
/// let custom = CompressionLevel::new(3);
/// assert_eq!(custom.level(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0).
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn file_options(self) -> SimpleFileOptions {
        let options = SimpleFileOptions::default().last_modified_time(DateTime::default());
        if self.0 == 0 {
            // For stored (no compression), don't set compression level
            options.compression_method(CompressionMethod::Stored)
        } else {
            options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(self.0)))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Packs the signed pass files into a `.pkpass` archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveAssembler {
    compression_level: CompressionLevel,
}

impl ArchiveAssembler {
    pub fn new(compression_level: CompressionLevel) -> Self {
        Self { compression_level }
    }

    /// Assemble a pass archive in memory.
    ///
    /// Entries are written as `pass.json`, `manifest.json`, `signature`,
    /// then every asset under its own name in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] if the ZIP writer fails.
    pub fn assemble(
        &self,
        pass_json: &[u8],
        manifest: &[u8],
        signature: &[u8],
        assets: &AssetCollection,
    ) -> Result<Vec<u8>> {
        let fixed = [
            (PASS_JSON, pass_json),
            (MANIFEST_JSON, manifest),
            (SIGNATURE, signature),
        ];
        let entries = fixed
            .into_iter()
            .chain(assets.iter().map(|a| (a.name(), a.bytes())));

        let cursor = write_entries(Cursor::new(Vec::new()), entries, self.compression_level)?;
        Ok(cursor.into_inner())
    }
}

/// Write `(name, bytes)` entries into a fresh ZIP archive on `writer`.
///
/// Returns the writer positioned at the end of the finished archive.
pub fn write_entries<'a, W, I>(writer: W, entries: I, level: CompressionLevel) -> Result<W>
where
    W: Write + Seek,
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut zip = ZipWriter::new(writer);
    let options = level.file_options();

    for (name, bytes) in entries {
        zip.start_file(name, options).map_err(zip_error)?;
        zip.write_all(bytes)
            .map_err(|e| Error::archive(format!("Failed to write archive entry {}", name), e))?;
    }

    zip.finish().map_err(zip_error)
}

/// Write `bytes` to `path` through a temporary file in the same directory.
///
/// The destination only ever holds a complete archive: on failure the
/// temporary file is removed and `path` is left untouched.
pub(crate) fn persist_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let result = NamedTempFile::new_in(dir).and_then(|mut file| {
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        file.persist(path).map(|_| ()).map_err(|e| e.error)
    });

    result.map_err(|e| {
        warn!(path = %path.display(), error = %e, "failed to write archive");
        Error::archive_write(e)
    })
}

fn zip_error(e: zip::result::ZipError) -> Error {
    match e {
        zip::result::ZipError::Io(io) => Error::archive("Failed to write zip archive", io),
        other => Error::Zip(other),
    }
}
