pub mod archive;
pub mod builder;
pub mod bundle;
pub mod crypto;
pub mod error;
pub mod manifest;
pub mod pass;
#[cfg(feature = "push")]
pub mod push;
pub mod response;

pub use archive::CompressionLevel;
pub use builder::{PassBuilder, SignedPass};
pub use bundle::PassBundle;
#[cfg(feature = "pure-rust")]
pub use crypto::CmsSigner;
pub use crypto::ManifestSigner;
#[cfg(feature = "openssl-backend")]
pub use crypto::SigningAssets;
pub use error::Error;
pub use manifest::{Manifest, ManifestBuilder};
pub use pass::{Asset, AssetCollection, PassData, Violation};
#[cfg(feature = "push")]
pub use push::{PushNotifier, PushResponse};
pub use response::PassResponse;

pub type Result<T> = std::result::Result<T, Error>;
