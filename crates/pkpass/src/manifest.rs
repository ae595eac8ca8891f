//! `manifest.json` generation.
//!
//! The manifest maps every packaged file name (other than the manifest and
//! the signature themselves) to the lowercase hex SHA-1 digest of its bytes.
//! Wallet readers recompute these digests on import, so the set of names
//! must match the archive exactly.
//!
//! The serialized form is canonical: a compact JSON object with keys in
//! lexicographic order. [`Manifest`] caches those bytes once so the signer
//! and the archive always see the same sequence.

use crate::{Error, Result};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Builder for a [`Manifest`].
///
/// # Examples
///
/// ```
/// use pkpass::ManifestBuilder;
///
/// let mut builder = ManifestBuilder::new();
/// builder.add_file("pass.json", b"{}")?;
/// builder.add_file("icon.png", b"PNG_DATA")?;
/// let manifest = builder.build()?;
///
/// assert_eq!(manifest.len(), 2);
/// assert!(manifest.verify_file("icon.png", b"PNG_DATA"));
/// # Ok::<(), pkpass::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    files: BTreeMap<String, String>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `data` and record it under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateAsset`] if `name` was already recorded.
    pub fn add_file(&mut self, name: impl Into<String>, data: &[u8]) -> Result<&mut Self> {
        let name = name.into();
        if self.files.contains_key(&name) {
            return Err(Error::DuplicateAsset(name));
        }
        self.files.insert(name, Self::hash_data(data));
        Ok(self)
    }

    /// SHA-1 of `data` as lowercase hex.
    pub fn hash_data(data: &[u8]) -> String {
        let mut hasher = Sha1::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Serialize the manifest and freeze it.
    pub fn build(self) -> Result<Manifest> {
        let bytes = serde_json::to_vec(&self.files)?;
        Ok(Manifest {
            entries: self.files,
            bytes,
        })
    }
}

/// A frozen digest manifest together with its canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
    bytes: Vec<u8>,
}

impl Manifest {
    /// Parse a `manifest.json` read back from an archive.
    ///
    /// The original bytes are kept as-is so they can be checked against the
    /// archived signature.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let entries: BTreeMap<String, String> = serde_json::from_slice(bytes)?;
        Ok(Self {
            entries,
            bytes: bytes.to_vec(),
        })
    }

    /// The exact bytes that are signed and archived.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `(file name, hex digest)` pairs in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn digest(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Whether `data` hashes to the digest recorded for `name`.
    pub fn verify_file(&self, name: &str, data: &[u8]) -> bool {
        self.digest(name)
            .is_some_and(|d| d == ManifestBuilder::hash_data(data))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_data_known_value() {
        // sha1("abc")
        assert_eq!(
            ManifestBuilder::hash_data(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_canonical_key_order() {
        let mut builder = ManifestBuilder::new();
        builder.add_file("pass.json", b"{}").unwrap();
        builder.add_file("icon.png", b"abc").unwrap();
        let manifest = builder.build().unwrap();

        let text = std::str::from_utf8(manifest.bytes()).unwrap();
        assert!(text.starts_with(r#"{"icon.png":"a9993e364706816aba3e25717850c26c9cd0d89d","#));
        assert!(!text.contains(' '));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn test_bytes_independent_of_insertion_order() {
        let mut a = ManifestBuilder::new();
        a.add_file("pass.json", b"1").unwrap();
        a.add_file("logo.png", b"2").unwrap();

        let mut b = ManifestBuilder::new();
        b.add_file("logo.png", b"2").unwrap();
        b.add_file("pass.json", b"1").unwrap();

        assert_eq!(a.build().unwrap().bytes(), b.build().unwrap().bytes());
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let mut builder = ManifestBuilder::new();
        builder.add_file("icon.png", b"1").unwrap();
        assert!(matches!(
            builder.add_file("icon.png", b"2"),
            Err(Error::DuplicateAsset(_))
        ));
    }

    #[test]
    fn test_parse_round_trip_keeps_bytes() {
        let mut builder = ManifestBuilder::new();
        builder.add_file("pass.json", b"{}").unwrap();
        builder.add_file("en.lproj/pass.strings", b"\"a\" = \"b\";\n").unwrap();
        let manifest = builder.build().unwrap();

        let parsed = Manifest::parse(manifest.bytes()).unwrap();
        assert_eq!(parsed, manifest);
        assert!(parsed.verify_file("pass.json", b"{}"));
        assert!(!parsed.verify_file("pass.json", b"{ }"));
        assert!(!parsed.verify_file("missing.png", b""));
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = ManifestBuilder::new().build().unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.bytes(), b"{}");
    }
}
