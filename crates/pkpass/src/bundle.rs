//! Multi-pass `.pkpasses` bundles.
//!
//! A bundle is a ZIP archive whose entries are complete signed passes,
//! named `pass1.pkpass`, `pass2.pkpass`, ... in the order they were added.
//! Passes are carried as opaque bytes; the bundle itself is not signed.

use crate::archive::{persist_atomically, write_entries, CompressionLevel};
use crate::builder::SignedPass;
use crate::response::{check_file_name, PassResponse, PKPASSES_MIME_TYPE};
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default download name for a bundle.
pub const DEFAULT_BUNDLE_NAME: &str = "passes.pkpasses";

/// Accumulates signed passes and packs them into a `.pkpasses` archive.
///
/// Building does not consume the bundle: it can be built again, or grown
/// and rebuilt, and each build reflects the passes added so far.
///
/// # Example
///
/// ```no_run
/// use pkpass::{PassBundle, SignedPass};
///
/// PassBundle::new()
///     .add(SignedPass::from_bytes(std::fs::read("first.pkpass")?)?)
///     .add_bytes(std::fs::read("second.pkpass")?)?
///     .write_to_file("passes.pkpasses")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct PassBundle {
    passes: Vec<SignedPass>,
    temp_dir: PathBuf,
    compression_level: CompressionLevel,
    name: String,
}

impl Default for PassBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl PassBundle {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            temp_dir: std::env::temp_dir(),
            compression_level: CompressionLevel::DEFAULT,
            name: DEFAULT_BUNDLE_NAME.to_string(),
        }
    }

    /// Directory for the scratch archive written during [`build`](Self::build).
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Set ZIP compression level for the bundle archive (0-9).
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = CompressionLevel::new(level);
        self
    }

    /// Set the download file name; `.pkpasses` is appended when missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFileName`] for empty names and names with
    /// control characters, quotes or path separators.
    pub fn name(mut self, name: impl Into<String>) -> Result<Self> {
        let mut name = name.into();
        check_file_name(&name)?;
        if !name.ends_with(".pkpasses") {
            name.push_str(".pkpasses");
        }
        self.name = name;
        Ok(self)
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Append a signed pass.
    pub fn add(mut self, pass: SignedPass) -> Self {
        self.passes.push(pass);
        self
    }

    /// Append raw `.pkpass` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPass`] if `bytes` is empty.
    pub fn add_bytes(mut self, bytes: Vec<u8>) -> Result<Self> {
        self.passes.push(SignedPass::from_bytes(bytes)?);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Archive entry names for the passes added so far.
    pub fn entry_names(&self) -> Vec<String> {
        (1..=self.passes.len())
            .map(|n| format!("pass{}.pkpass", n))
            .collect()
    }

    /// Pack all passes into `.pkpasses` bytes.
    ///
    /// The archive is written to an anonymous scratch file in the temp
    /// directory, read back, and the scratch file is released.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBundle`] if no pass was added
    /// - [`Error::Archive`] if the scratch file cannot be created or read
    pub fn build(&self) -> Result<Vec<u8>> {
        if self.passes.is_empty() {
            return Err(Error::EmptyBundle);
        }

        let names = self.entry_names();
        let entries = names
            .iter()
            .map(String::as_str)
            .zip(self.passes.iter().map(SignedPass::as_bytes));

        let scratch = tempfile::tempfile_in(&self.temp_dir).map_err(|e| {
            Error::archive(
                format!(
                    "Could not create temporary bundle file in {}",
                    self.temp_dir.display()
                ),
                e,
            )
        })?;
        let mut scratch = write_entries(scratch, entries, self.compression_level)?;

        let mut bytes = Vec::new();
        scratch
            .seek(SeekFrom::Start(0))
            .and_then(|_| scratch.read_to_end(&mut bytes))
            .map_err(|e| Error::archive("Could not read temporary bundle file", e))?;

        debug!(passes = self.passes.len(), size = bytes.len(), "built bundle");
        Ok(bytes)
    }

    /// Build the bundle and write it to `path`.
    ///
    /// # Errors
    ///
    /// Any build error, or [`Error::Archive`] with the message
    /// "Could not write zip archive to file." if `path` cannot be written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.build()?;
        persist_atomically(path.as_ref(), &bytes)
    }

    /// Build the bundle as a download response.
    pub fn response(&self) -> Result<PassResponse> {
        PassResponse::new(PKPASSES_MIME_TYPE, &self.name, self.build()?)
    }

    /// Build the bundle and write it as an HTTP response to `out`.
    pub fn emit<W: Write>(&self, out: W) -> Result<()> {
        self.response()?.write_to(out)
    }
}
