//! Pass builder API
//!
//! Provides a builder pattern interface that turns pass data and assets
//! into a complete signed `.pkpass` archive.

use crate::archive::{persist_atomically, ArchiveAssembler, CompressionLevel};
use crate::crypto::ManifestSigner;
use crate::manifest::ManifestBuilder;
use crate::pass::{AssetCollection, PassData, PASS_JSON};
use crate::response::{check_file_name, PassResponse, PKPASS_MIME_TYPE};
use crate::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Default download name for a single pass.
pub const DEFAULT_PASS_NAME: &str = "pass.pkpass";

/// A finished, signed `.pkpass` archive.
///
/// Never empty. Treated as opaque bytes by [`crate::PassBundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPass {
    bytes: Vec<u8>,
}

impl SignedPass {
    /// Wrap archive bytes produced elsewhere (e.g. read from disk).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPass`] if `bytes` is empty.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::EmptyPass);
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; kept for API symmetry with [`Self::len`].
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for SignedPass {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl TryFrom<Vec<u8>> for SignedPass {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes(bytes)
    }
}

/// Signed pass builder.
///
/// Holds the pass document and its assets; [`build`](Self::build) validates,
/// hashes, signs and packs them. The signer is borrowed, so one loaded
/// certificate can serve any number of builders.
///
/// # Example
///
/// ```no_run
/// use pkpass::{PassBuilder, PassData, SigningAssets};
/// use secrecy::SecretString;
/// use serde_json::json;
///
/// let password = SecretString::new("password".to_string());
/// let signer = SigningAssets::from_p12("Certificates.p12", Some(&password))?
///     .with_wwdr_certificate("AppleWWDRCA.pem")?;
///
/// PassBuilder::new(&signer)
///     .set_data(PassData::from_value(json!({
///         "formatVersion": 1,
///         "organizationName": "Flight Express",
///         "passTypeIdentifier": "pass.com.example.flight",
///         "serialNumber": "FLIGHT001",
///         "teamIdentifier": "839X4P2FV8",
///     }))?)
///     .add_file("images/icon.png", None)?
///     .write_to_file("flight.pkpass")?;
/// # Ok::<(), pkpass::Error>(())
/// ```
pub struct PassBuilder<'a> {
    signer: &'a dyn ManifestSigner,
    data: PassData,
    assets: AssetCollection,
    compression_level: CompressionLevel,
    name: String,
}

impl<'a> PassBuilder<'a> {
    /// Create a builder that signs with `signer`.
    pub fn new(signer: &'a dyn ManifestSigner) -> Self {
        Self {
            signer,
            data: PassData::new(),
            assets: AssetCollection::new(),
            compression_level: CompressionLevel::DEFAULT,
            name: DEFAULT_PASS_NAME.to_string(),
        }
    }

    /// Set ZIP compression level for the archive (0-9).
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = CompressionLevel::new(level);
        self
    }

    /// Set the download file name; `.pkpass` is appended when missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFileName`] for empty names and names with
    /// control characters, quotes or path separators.
    pub fn name(mut self, name: impl Into<String>) -> Result<Self> {
        let mut name = name.into();
        check_file_name(&name)?;
        if !name.ends_with(".pkpass") {
            name.push_str(".pkpass");
        }
        self.name = name;
        Ok(self)
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    /// Replace the pass document.
    pub fn set_data(mut self, data: PassData) -> Self {
        self.data = data;
        self
    }

    /// Replace the pass document with parsed JSON.
    pub fn set_data_json(mut self, json: &str) -> Result<Self> {
        self.data = PassData::from_json(json)?;
        Ok(self)
    }

    /// Merge top-level fields into the current document.
    pub fn merge_data(mut self, data: PassData) -> Self {
        self.data.merge(data);
        self
    }

    pub fn data(&self) -> &PassData {
        &self.data
    }

    pub fn assets(&self) -> &AssetCollection {
        &self.assets
    }

    /// Attach a file from disk. See [`AssetCollection::add_file`].
    pub fn add_file(mut self, path: impl AsRef<Path>, name: Option<&str>) -> Result<Self> {
        self.assets.add_file(path, name)?;
        Ok(self)
    }

    /// Attach in-memory bytes. See [`AssetCollection::add_content`].
    pub fn add_content(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        self.assets.add_content(name, bytes)?;
        Ok(self)
    }

    /// Attach a localized file from disk under `<language>.lproj/`.
    pub fn add_locale_file(
        mut self,
        language: &str,
        path: impl AsRef<Path>,
        name: Option<&str>,
    ) -> Result<Self> {
        self.assets.add_locale_file(language, path, name)?;
        Ok(self)
    }

    /// Attach localized in-memory bytes under `<language>.lproj/`.
    pub fn add_locale_content(mut self, language: &str, name: &str, bytes: Vec<u8>) -> Result<Self> {
        self.assets.add_locale_content(language, name, bytes)?;
        Ok(self)
    }

    /// Attach `<language>.lproj/pass.strings` rendered from `pairs`.
    pub fn add_locale_strings<K, V>(
        mut self,
        language: &str,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.assets.add_locale_strings(language, pairs)?;
        Ok(self)
    }

    /// Build the signed pass archive.
    ///
    /// The workflow is:
    /// 1. Validate the pass document
    /// 2. Serialize `pass.json`
    /// 3. Hash `pass.json` and every asset into the manifest
    /// 4. Sign the manifest bytes
    /// 5. Pack everything into the archive
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any step; nothing is produced on failure.
    pub fn build(&self) -> Result<SignedPass> {
        self.data.validate()?;
        let pass_json = self.data.to_bytes()?;

        let mut manifest = ManifestBuilder::new();
        manifest.add_file(PASS_JSON, &pass_json)?;
        for asset in self.assets.iter() {
            manifest.add_file(asset.name(), asset.bytes())?;
        }
        let manifest = manifest.build()?;

        let signature = self.signer.sign_manifest(manifest.bytes())?;

        let archive = ArchiveAssembler::new(self.compression_level).assemble(
            &pass_json,
            manifest.bytes(),
            &signature,
            &self.assets,
        )?;

        debug!(
            pass_type = self.data.pass_type_identifier().unwrap_or_default(),
            serial_number = self.data.serial_number().unwrap_or_default(),
            files = manifest.len(),
            size = archive.len(),
            "built pass"
        );
        SignedPass::from_bytes(archive)
    }

    /// Build the pass and write it to `path`.
    ///
    /// The archive is written to a temporary file next to `path` and renamed
    /// into place, so `path` never holds a partial archive.
    ///
    /// # Errors
    ///
    /// Any build error, or [`Error::Archive`] if `path` cannot be written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let pass = self.build()?;
        persist_atomically(path.as_ref(), pass.as_bytes())
    }

    /// Build the pass as a download response.
    pub fn response(&self) -> Result<PassResponse> {
        let pass = self.build()?;
        PassResponse::new(PKPASS_MIME_TYPE, &self.name, pass.into_bytes())
    }
}
