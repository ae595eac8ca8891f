//! Asset files (icons, logos, images, localized resources) attached to a pass.
//!
//! Asset names are archive paths and appear verbatim in both the manifest
//! and the `.pkpass` archive. A name may only be attached once; a second
//! attempt fails with [`Error::DuplicateAsset`] instead of replacing the
//! earlier bytes.

use super::RESERVED_NAMES;
use crate::{Error, Result};
use std::fs;
use std::path::{Component, Path};
use tracing::debug;

/// Name of the generated localized strings file inside each `.lproj` folder.
pub const STRINGS_FILE: &str = "pass.strings";

/// A named file packaged with a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    name: String,
    bytes: Vec<u8>,
}

impl Asset {
    /// Archive name, e.g. `icon.png` or `en.lproj/logo.png`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Insertion-ordered set of uniquely named assets.
///
/// # Examples
///
/// ```
/// use pkpass::AssetCollection;
///
/// let mut assets = AssetCollection::new();
/// assets.add_content("icon.png", b"PNG_DATA".to_vec())?;
/// assets.add_locale_content("de", "logo.png", b"LOGO".to_vec())?;
///
/// let names: Vec<_> = assets.iter().map(|a| a.name()).collect();
/// assert_eq!(names, ["icon.png", "de.lproj/logo.png"]);
/// # Ok::<(), pkpass::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct AssetCollection {
    assets: Vec<Asset>,
}

impl AssetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a file from disk.
    ///
    /// The archive name defaults to the file name of `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::FileNotFound`] if `path` is not a readable file
    /// - [`Error::DuplicateAsset`] / [`Error::InvalidAssetName`] as for [`Self::add_content`]
    pub fn add_file(&mut self, path: impl AsRef<Path>, name: Option<&str>) -> Result<&mut Self> {
        let path = path.as_ref();
        let name = match name {
            Some(name) => name.to_string(),
            None => file_name_of(path)?,
        };
        let bytes = read_asset(path)?;
        self.add_content(name, bytes)
    }

    /// Attach in-memory bytes under `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAssetName`] if `name` is reserved or not a clean relative path
    /// - [`Error::DuplicateAsset`] if `name` was already attached
    pub fn add_content(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> Result<&mut Self> {
        let name = name.into();
        check_name(&name)?;
        if self.contains(&name) {
            return Err(Error::DuplicateAsset(name));
        }

        debug!(asset = %name, size = bytes.len(), "attached asset");
        self.assets.push(Asset { name, bytes });
        Ok(self)
    }

    /// Attach a file from disk into the `<language>.lproj/` folder.
    pub fn add_locale_file(
        &mut self,
        language: &str,
        path: impl AsRef<Path>,
        name: Option<&str>,
    ) -> Result<&mut Self> {
        let path = path.as_ref();
        let name = match name {
            Some(name) => name.to_string(),
            None => file_name_of(path)?,
        };
        let bytes = read_asset(path)?;
        self.add_locale_content(language, &name, bytes)
    }

    /// Attach in-memory bytes into the `<language>.lproj/` folder.
    pub fn add_locale_content(
        &mut self,
        language: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<&mut Self> {
        self.add_content(locale_path(language, name)?, bytes)
    }

    /// Render `pairs` as `<language>.lproj/pass.strings`.
    ///
    /// Each pair becomes one `"key" = "value";` line, in the order given.
    pub fn add_locale_strings<K, V>(
        &mut self,
        language: &str,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<&mut Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut body = String::new();
        for (key, value) in pairs {
            body.push('"');
            body.push_str(&escape_strings_literal(key.as_ref()));
            body.push_str("\" = \"");
            body.push_str(&escape_strings_literal(value.as_ref()));
            body.push_str("\";\n");
        }
        self.add_locale_content(language, STRINGS_FILE, body.into_bytes())
    }

    /// Iterate assets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> + Clone + '_ {
        self.assets.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.iter().any(|a| a.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl<'a> IntoIterator for &'a AssetCollection {
    type Item = &'a Asset;
    type IntoIter = std::slice::Iter<'a, Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.iter()
    }
}

fn read_asset(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    fs::read(path).map_err(|_| Error::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::FileNotFound {
            path: path.to_path_buf(),
        })
}

fn locale_path(language: &str, name: &str) -> Result<String> {
    if language.is_empty() || language.contains(['/', '\\']) || language.contains("..") {
        return Err(Error::InvalidAssetName(format!("{language}.lproj/{name}")));
    }
    Ok(format!("{language}.lproj/{name}"))
}

/// Archive names must be clean relative paths that do not shadow the
/// generated files.
fn check_name(name: &str) -> Result<()> {
    let invalid = || Error::InvalidAssetName(name.to_string());

    if name.is_empty() || name.ends_with('/') || name.contains('\\') {
        return Err(invalid());
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(invalid());
    }

    let path = Path::new(name);
    if !path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(invalid());
    }
    Ok(())
}

fn escape_strings_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}
