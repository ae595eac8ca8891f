//! Pure Rust manifest signing
//!
//! Uses the cryptographic-message-syntax crate for CMS signature generation,
//! for builds that cannot link OpenSSL.
//!
//! Only RSA keys are accepted. The certificates are re-encoded when the
//! SignedData is assembled, and for ECDSA certificates that re-encoding
//! alters the signature AlgorithmIdentifier, so the embedded certificate no
//! longer matches its own signature.

use super::ManifestSigner;
use crate::{Error, Result};
use cryptographic_message_syntax::{SignedDataBuilder, SignerBuilder};
use x509_certificate::{CapturedX509Certificate, InMemorySigningKeyPair};

/// Signer backed by an in-memory RSA PKCS#8 key.
pub struct CmsSigner {
    signing_key: InMemorySigningKeyPair,
    signing_cert: CapturedX509Certificate,
    cert_chain: Vec<CapturedX509Certificate>,
}

impl CmsSigner {
    /// Load from a PEM certificate and an unencrypted PEM PKCS#8 RSA key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if either PEM cannot be parsed or the key
    /// is not RSA.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let signing_cert = CapturedX509Certificate::from_pem(cert_pem)
            .map_err(|e| Error::Signing(format!("Failed to parse certificate PEM: {}", e)))?;
        let signing_key = InMemorySigningKeyPair::from_pkcs8_pem(key_pem)
            .map_err(|e| Error::Signing(format!("Failed to parse private key: {}", e)))?;
        if !matches!(signing_key, InMemorySigningKeyPair::Rsa(..)) {
            return Err(Error::Signing(
                "Unsupported key type for the pure-rust backend. Only RSA keys are supported."
                    .to_string(),
            ));
        }

        Ok(Self {
            signing_key,
            signing_cert,
            cert_chain: Vec::new(),
        })
    }

    /// Add an intermediate certificate (PEM) to the embedded chain.
    pub fn with_chain_pem(mut self, cert_pem: &[u8]) -> Result<Self> {
        let cert = CapturedX509Certificate::from_pem(cert_pem)
            .map_err(|e| Error::Signing(format!("Failed to parse chain certificate: {}", e)))?;
        self.cert_chain.push(cert);
        Ok(self)
    }
}

impl ManifestSigner for CmsSigner {
    fn sign_manifest(&self, manifest: &[u8]) -> Result<Vec<u8>> {
        let signer = SignerBuilder::new(&self.signing_key, self.signing_cert.clone());

        let mut builder = SignedDataBuilder::default()
            .content_external(manifest.to_vec())
            .signer(signer)
            .certificate(self.signing_cert.clone());

        for cert in &self.cert_chain {
            builder = builder.certificate(cert.clone());
        }

        let der = builder
            .build_der()
            .map_err(|e| Error::Signing(format!("Failed to build CMS signature: {}", e)))?;

        Ok(der)
    }
}
