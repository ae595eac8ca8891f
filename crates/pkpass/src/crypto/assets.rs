//! Certificate, private key and chain loading for the OpenSSL backend.

use super::ManifestSigner;
use crate::{Error, Result};
use openssl::pkcs12::Pkcs12;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{Id, PKey, Private};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Signing assets: pass certificate, its private key, and the intermediate chain.
///
/// The chain normally holds Apple's WWDR intermediate certificate; it is
/// embedded in every signature so readers can build the trust path.
///
/// Loaded material is read-only. Signing takes `&self`, so one instance can
/// sign any number of passes, from several threads if OpenSSL was built
/// thread-safe (the default for OpenSSL 1.1 and later).
pub struct SigningAssets {
    /// Pass Type ID certificate
    pub certificate: X509,
    /// Private key
    pub private_key: PKey<Private>,
    /// Intermediate certificates embedded in the signature
    pub chain: Vec<X509>,
    /// Team ID extracted from certificate
    pub team_id: Option<String>,
}

impl SigningAssets {
    /// Load from separate certificate and private key files.
    ///
    /// Both PEM and DER encodings are accepted. The password, if provided,
    /// decrypts a PEM private key.
    pub fn from_pem(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        key_password: Option<&SecretString>,
    ) -> Result<Self> {
        let cert_data = read_material(cert_path.as_ref(), "certificate")?;
        let key_data = read_material(key_path.as_ref(), "private key")?;

        let certificate = parse_certificate(&cert_data)?;

        let private_key = if let Some(pass) = key_password {
            PKey::private_key_from_pem_passphrase(&key_data, pass.expose_secret().as_bytes())
        } else {
            PKey::private_key_from_pem(&key_data)
                .or_else(|_| PKey::private_key_from_der(&key_data))
        }
        .map_err(|e| Error::Signing(format!("Failed to load private key: {}", e)))?;

        Self::from_parts(certificate, private_key)
    }

    /// Load from a PKCS#12 (.p12) file.
    ///
    /// Any CA certificates bundled in the container are added to the chain.
    /// A missing password is treated as the empty string.
    pub fn from_p12(p12_path: impl AsRef<Path>, password: Option<&SecretString>) -> Result<Self> {
        let p12_data = read_material(p12_path.as_ref(), "PKCS#12")?;
        Self::from_p12_der(&p12_data, password)
    }

    /// Load from in-memory PKCS#12 bytes.
    pub fn from_p12_der(p12_data: &[u8], password: Option<&SecretString>) -> Result<Self> {
        let pkcs12 = Pkcs12::from_der(p12_data)
            .map_err(|e| Error::Signing(format!("Invalid PKCS#12: {}", e)))?;

        let pass = password
            .map(|s| s.expose_secret().as_str())
            .unwrap_or("");
        let parsed = pkcs12
            .parse2(pass)
            .map_err(|e| Error::Signing(format!("Failed to parse PKCS#12: {}", e)))?;

        let certificate = parsed
            .cert
            .ok_or_else(|| Error::Signing("No certificate in PKCS#12".into()))?;

        let private_key = parsed
            .pkey
            .ok_or_else(|| Error::Signing("No private key in PKCS#12".into()))?;

        let mut assets = Self::from_parts(certificate, private_key)?;
        if let Some(ca) = parsed.ca {
            assets.chain.extend(ca.into_iter());
        }
        Ok(assets)
    }

    /// Combine an already-loaded certificate and key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if the key is neither RSA nor EC, or does
    /// not belong to the certificate.
    pub fn from_parts(certificate: X509, private_key: PKey<Private>) -> Result<Self> {
        Self::check_key_type(&private_key)?;
        Self::validate_key_pair(&certificate, &private_key)?;

        let team_id = Self::extract_team_id(&certificate);
        debug!(team_id = ?team_id, "loaded signing certificate");

        Ok(Self {
            certificate,
            private_key,
            chain: Vec::new(),
            team_id,
        })
    }

    /// Add the Apple WWDR intermediate certificate (PEM or DER) to the chain.
    pub fn with_wwdr_certificate(self, path: impl AsRef<Path>) -> Result<Self> {
        let data = read_material(path.as_ref(), "WWDR certificate")?;
        let wwdr = parse_certificate(&data)?;
        Ok(self.with_chain_certificate(wwdr))
    }

    /// Add an intermediate certificate to the chain.
    pub fn with_chain_certificate(mut self, certificate: X509) -> Self {
        self.chain.push(certificate);
        self
    }

    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    /// Check a detached signature over `manifest` against this certificate.
    ///
    /// Verifies the signature value and that it was produced by
    /// [`Self::certificate`]. Trust-chain evaluation up to Apple's root is
    /// left to the pass reader.
    pub fn verify_manifest(&self, manifest: &[u8], signature: &[u8]) -> Result<()> {
        let pkcs7 = Pkcs7::from_der(signature)
            .map_err(|e| Error::Signing(format!("Malformed signature: {}", e)))?;

        let certs = Stack::new().map_err(signing_error)?;
        let store = X509StoreBuilder::new().map_err(signing_error)?.build();

        pkcs7
            .verify(
                &certs,
                &store,
                Some(manifest),
                None,
                Pkcs7Flags::BINARY | Pkcs7Flags::NOVERIFY,
            )
            .map_err(|e| Error::Signing(format!("Signature does not match manifest: {}", e)))?;

        let ours = self.certificate.to_der().map_err(signing_error)?;
        let signers = pkcs7
            .signers(&certs, Pkcs7Flags::empty())
            .map_err(signing_error)?;
        let signed_by_us = signers
            .iter()
            .any(|cert| cert.to_der().is_ok_and(|der| der == ours));

        if !signed_by_us {
            return Err(Error::Signing(
                "Signature was not produced by this certificate".into(),
            ));
        }
        Ok(())
    }

    /// Extract team ID from certificate subject
    fn extract_team_id(cert: &X509) -> Option<String> {
        let subject = cert.subject_name();

        // Look for OU (Organizational Unit) which contains team ID
        for entry in subject.entries() {
            let nid = entry.object().nid();
            if nid == openssl::nid::Nid::ORGANIZATIONALUNITNAME {
                if let Ok(data) = entry.data().as_utf8() {
                    return Some(data.to_string());
                }
            }
        }
        None
    }

    /// PKCS#7 signing is only wired up for RSA and EC keys.
    fn check_key_type(private_key: &PKey<Private>) -> Result<()> {
        let id = private_key.id();
        if id == Id::RSA || id == Id::EC {
            return Ok(());
        }
        Err(Error::Signing(format!(
            "Unsupported private key type (id {}); expected RSA or EC",
            id.as_raw()
        )))
    }

    /// Validate that the private key matches the certificate's public key
    fn validate_key_pair(cert: &X509, private_key: &PKey<Private>) -> Result<()> {
        let cert_public_key = cert.public_key().map_err(|e| {
            Error::Signing(format!(
                "Failed to extract public key from certificate: {}",
                e
            ))
        })?;

        if !private_key.public_eq(&cert_public_key) {
            return Err(Error::Signing(
                "Private key does not match certificate public key".into(),
            ));
        }

        Ok(())
    }
}

impl ManifestSigner for SigningAssets {
    /// DER-encoded detached PKCS#7 signature, with the certificate and chain embedded.
    fn sign_manifest(&self, manifest: &[u8]) -> Result<Vec<u8>> {
        let mut certs = Stack::new().map_err(signing_error)?;
        for cert in &self.chain {
            certs.push(cert.clone()).map_err(signing_error)?;
        }

        let pkcs7 = Pkcs7::sign(
            &self.certificate,
            &self.private_key,
            &certs,
            manifest,
            Pkcs7Flags::BINARY | Pkcs7Flags::DETACHED,
        )
        .map_err(|e| Error::Signing(format!("Failed to build PKCS#7 signature: {}", e)))?;

        let der = pkcs7
            .to_der()
            .map_err(|e| Error::Signing(format!("Failed to encode signature: {}", e)))?;

        debug!(manifest_len = manifest.len(), signature_len = der.len(), "signed manifest");
        Ok(der)
    }
}

fn read_material(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        Error::Signing(format!(
            "Failed to read {} from {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

fn parse_certificate(data: &[u8]) -> Result<X509> {
    X509::from_pem(data)
        .or_else(|_| X509::from_der(data))
        .map_err(|e| Error::Signing(format!("Failed to load certificate: {}", e)))
}

fn signing_error(e: openssl::error::ErrorStack) -> Error {
    Error::Signing(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_support::{
        generate_ec_key, generate_rsa_key, self_signed_cert, test_signing_assets,
    };
    use openssl::hash::MessageDigest;
    use tempfile::TempDir;

    #[test]
    fn test_sign_and_verify_manifest() {
        let assets = test_signing_assets();
        let manifest = br#"{"pass.json":"0000"}"#;

        let signature = assets.sign_manifest(manifest).unwrap();
        assert!(!signature.is_empty());
        assets.verify_manifest(manifest, &signature).unwrap();
    }

    #[test]
    fn test_signature_is_detached() {
        let assets = test_signing_assets();
        let manifest = br#"{"marker.png":"unique-detached-content-marker"}"#;

        let signature = assets.sign_manifest(manifest).unwrap();
        assert!(!signature
            .windows(manifest.len())
            .any(|w| w == manifest.as_slice()));
    }

    #[test]
    fn test_verify_rejects_modified_manifest() {
        let assets = test_signing_assets();
        let signature = assets.sign_manifest(b"original").unwrap();

        let result = assets.verify_manifest(b"originaL", &signature);
        assert!(matches!(result, Err(Error::Signing(_))));
    }

    #[test]
    fn test_verify_rejects_other_signer() {
        let ours = test_signing_assets();
        let theirs = test_signing_assets();
        let signature = theirs.sign_manifest(b"manifest").unwrap();

        let result = ours.verify_manifest(b"manifest", &signature);
        assert!(result.is_err());
    }

    #[test]
    fn test_rsa_key_signs() {
        let key = generate_rsa_key();
        let cert = self_signed_cert(&key, Some("KN44X8ZLNC"));
        let assets = SigningAssets::from_parts(cert, key).unwrap();

        let signature = assets.sign_manifest(b"rsa manifest").unwrap();
        assets.verify_manifest(b"rsa manifest", &signature).unwrap();
    }

    #[test]
    fn test_chain_certificates_embedded() {
        let ca_key = generate_ec_key();
        let ca_cert = self_signed_cert(&ca_key, None);
        let assets = test_signing_assets().with_chain_certificate(ca_cert.clone());

        let signature = assets.sign_manifest(b"chain").unwrap();
        let ca_der = ca_cert.to_der().unwrap();
        assert!(signature.windows(ca_der.len()).any(|w| w == ca_der.as_slice()));
    }

    #[test]
    fn test_extract_team_id() {
        let assets = test_signing_assets();
        assert_eq!(assets.team_id(), Some("T1TEAMID00"));
    }

    #[test]
    fn test_validate_key_pair_mismatched() {
        let key1 = generate_ec_key();
        let key2 = generate_ec_key();
        let certificate = self_signed_cert(&key1, None);

        let result = SigningAssets::from_parts(certificate, key2);
        let err = result.err().expect("mismatched key pair should fail");
        assert!(
            err.to_string().contains("does not match"),
            "Error message should indicate key mismatch: {}",
            err
        );
    }

    #[test]
    fn test_unsupported_key_type() {
        use openssl::asn1::Asn1Time;
        use openssl::x509::{X509Builder, X509NameBuilder};

        let key = PKey::generate_ed25519().unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "ed25519").unwrap();
        let name = name.build();
        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::null()).unwrap();

        let result = SigningAssets::from_parts(builder.build(), key);
        assert!(matches!(result, Err(Error::Signing(ref m)) if m.contains("Unsupported")));
    }

    #[test]
    fn test_from_p12_round_trip() {
        let key = generate_ec_key();
        let cert = self_signed_cert(&key, Some("KN44X8ZLNC"));
        let p12 = Pkcs12::builder()
            .name("pass")
            .pkey(&key)
            .cert(&cert)
            .build2("password")
            .unwrap()
            .to_der()
            .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Certificates.p12");
        fs::write(&path, &p12).unwrap();

        let password = SecretString::new("password".to_string());
        let assets = SigningAssets::from_p12(&path, Some(&password)).unwrap();
        assert_eq!(assets.team_id(), Some("KN44X8ZLNC"));

        let wrong = SecretString::new("wrong".to_string());
        assert!(matches!(
            SigningAssets::from_p12(&path, Some(&wrong)),
            Err(Error::Signing(_))
        ));
    }

    #[test]
    fn test_from_p12_missing_file() {
        let result = SigningAssets::from_p12("/nonexistent/Certificates.p12", None);
        assert!(matches!(result, Err(Error::Signing(ref m)) if m.contains("PKCS#12")));
    }

    #[test]
    fn test_from_p12_invalid_data() {
        let result = SigningAssets::from_p12_der(b"not valid p12 data", None);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_pem_files_and_wwdr() {
        let key = generate_ec_key();
        let cert = self_signed_cert(&key, None);
        let wwdr_key = generate_ec_key();
        let wwdr = self_signed_cert(&wwdr_key, None);

        let dir = TempDir::new().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        let wwdr_path = dir.path().join("wwdr.der");
        fs::write(&cert_path, cert.to_pem().unwrap()).unwrap();
        fs::write(&key_path, key.private_key_to_pem_pkcs8().unwrap()).unwrap();
        fs::write(&wwdr_path, wwdr.to_der().unwrap()).unwrap();

        let assets = SigningAssets::from_pem(&cert_path, &key_path, None)
            .unwrap()
            .with_wwdr_certificate(&wwdr_path)
            .unwrap();
        assert_eq!(assets.chain.len(), 1);
    }
}
