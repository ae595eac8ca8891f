//! Manifest signing.
//!
//! A pass signature is a detached CMS/PKCS#7 `SignedData` structure over the
//! exact `manifest.json` bytes, DER encoded, carrying the pass certificate
//! and its intermediate chain.
//!
//! Two backends implement [`ManifestSigner`]:
//!
//! - [`SigningAssets`] (feature `openssl-backend`, default) - OpenSSL `PKCS7_sign`
//! - [`CmsSigner`] (feature `pure-rust`) - `cryptographic-message-syntax`, RSA keys only

#[cfg(feature = "openssl-backend")]
pub mod assets;
#[cfg(feature = "pure-rust")]
pub mod cms;
#[cfg(all(test, feature = "openssl-backend"))]
pub(crate) mod test_support;

#[cfg(feature = "openssl-backend")]
pub use assets::SigningAssets;
#[cfg(feature = "pure-rust")]
pub use cms::CmsSigner;

use crate::Result;

/// Produces a detached signature over manifest bytes.
///
/// Implementations hold only read-only key material, so a single signer can
/// be shared by every pass it signs.
pub trait ManifestSigner: Send + Sync {
    /// Sign `manifest` and return the DER-encoded detached signature.
    fn sign_manifest(&self, manifest: &[u8]) -> Result<Vec<u8>>;
}

impl<S: ManifestSigner + ?Sized> ManifestSigner for std::sync::Arc<S> {
    fn sign_manifest(&self, manifest: &[u8]) -> Result<Vec<u8>> {
        (**self).sign_manifest(manifest)
    }
}
