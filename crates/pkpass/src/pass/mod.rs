//! Pass contents: the `pass.json` document and the attached asset files.
//!
//! Both halves are plain owned state. Nothing is validated on mutation;
//! [`PassData::validate`] runs when [`crate::PassBuilder::build`] starts.

pub mod assets;
pub mod data;

pub use assets::{Asset, AssetCollection};
pub use data::{PassData, Violation};

/// File name of the pass document inside a `.pkpass` archive.
pub const PASS_JSON: &str = "pass.json";

/// File name of the digest manifest inside a `.pkpass` archive.
pub const MANIFEST_JSON: &str = "manifest.json";

/// File name of the detached signature inside a `.pkpass` archive.
pub const SIGNATURE: &str = "signature";

/// Names the archive layout reserves for itself.
pub const RESERVED_NAMES: [&str; 3] = [PASS_JSON, MANIFEST_JSON, SIGNATURE];
