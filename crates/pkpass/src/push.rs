//! Wallet update notifications over APNs.
//!
//! Sends an alert push to a device that holds a pass, authenticated with a
//! token-based (`.p8`) APNs key. The request is a single HTTP/2 POST; there
//! are no retries.
//!
//! # Example
//!
//! ```no_run
//! use pkpass::PushNotifier;
//!
//! let notifier = PushNotifier::new()
//!     .bundle_id("pass.com.example.flight")
//!     .key_id("ABC123DEFG")
//!     .team_id("839X4P2FV8")
//!     .auth_key_path("AuthKey_ABC123DEFG.p8");
//!
//! let response = notifier.push("7c9e0f1a2b3c4d5e", "Gate change", "Now boarding at B12")?;
//! assert_eq!(response.status, 200);
//! # Ok::<(), pkpass::Error>(())
//! ```

use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const PRODUCTION_ENDPOINT: &str = "https://api.push.apple.com/3/device";
const DEVELOPMENT_ENDPOINT: &str = "https://api.development.push.apple.com/3/device";
const INCOMPLETE_CONFIG: &str = "Push configuration is incomplete.";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
enum AuthKey {
    Path(PathBuf),
    Pem(SecretString),
}

/// Result of a delivered push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
    /// HTTP status returned by APNs (always 200 on success).
    pub status: u16,
    /// Response body, usually empty.
    pub body: String,
}

/// APNs client for pass update notifications.
#[derive(Debug)]
pub struct PushNotifier {
    bundle_id: Option<String>,
    key_id: Option<String>,
    team_id: Option<String>,
    auth_key: Option<AuthKey>,
    production: bool,
    timeout: Duration,
}

impl Default for PushNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PushNotifier {
    /// Create an unconfigured notifier targeting the production gateway.
    pub fn new() -> Self {
        Self {
            bundle_id: None,
            key_id: None,
            team_id: None,
            auth_key: None,
            production: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Pass type identifier, sent as the `apns-topic`.
    pub fn bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    /// APNs auth key id (`kid`).
    pub fn key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Developer team id (`iss`).
    pub fn team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Read the `.p8` auth key from disk at push time.
    pub fn auth_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_key = Some(AuthKey::Path(path.into()));
        self
    }

    /// Use an in-memory PKCS#8 PEM auth key.
    pub fn auth_key_pem(mut self, pem: SecretString) -> Self {
        self.auth_key = Some(AuthKey::Pem(pem));
        self
    }

    /// Select the production (default) or development gateway.
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check that every setting needed for a push is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PushConfig`] if any setting is missing or empty.
    pub fn validate(&self) -> Result<()> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        let has_key = match &self.auth_key {
            Some(AuthKey::Path(p)) => !p.as_os_str().is_empty(),
            Some(AuthKey::Pem(pem)) => !pem.expose_secret().is_empty(),
            None => false,
        };

        if present(&self.bundle_id) && present(&self.key_id) && present(&self.team_id) && has_key {
            Ok(())
        } else {
            Err(Error::PushConfig(INCOMPLETE_CONFIG.to_string()))
        }
    }

    /// Send an alert notification to `device_token`.
    ///
    /// # Errors
    ///
    /// - [`Error::PushConfig`] if the notifier is not fully configured, or
    ///   `device_token` is not a hex string
    /// - [`Error::Key`] if the auth key cannot be read or parsed
    /// - [`Error::Delivery`] on transport failure or a non-200 status
    pub fn push(&self, device_token: &str, title: &str, body: &str) -> Result<PushResponse> {
        self.validate()?;
        if device_token.is_empty() {
            return Err(Error::PushConfig("Device token is empty.".to_string()));
        }
        // the token becomes a path segment of the request URL
        if hex::decode(device_token).is_err() {
            return Err(Error::PushConfig(format!(
                "Device token must be hex encoded: {:?}",
                device_token
            )));
        }

        let jwt = self.token(chrono::Utc::now().timestamp())?;
        let url = self.endpoint(device_token);
        let topic = self.bundle_id.as_deref().unwrap_or_default();

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Delivery(format!("failed to create HTTP client: {}", e)))?;

        debug!(url = %url, topic, "sending push notification");
        let response = client
            .post(&url)
            .header("authorization", format!("bearer {}", jwt))
            .header("apns-topic", topic)
            .json(&notification_payload(title, body))
            .send()
            .map_err(|e| Error::Delivery(format!("transport error: {}", e)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| Error::Delivery(format!("failed to read response: {}", e)))?;

        if status != 200 {
            warn!(status, response = %text, "APNs rejected push");
            return Err(Error::Delivery(format!(
                "APNs returned HTTP {}: {}",
                status, text
            )));
        }

        Ok(PushResponse { status, body: text })
    }

    fn endpoint(&self, device_token: &str) -> String {
        let base = if self.production {
            PRODUCTION_ENDPOINT
        } else {
            DEVELOPMENT_ENDPOINT
        };
        format!("{}/{}", base, device_token)
    }

    fn signing_key(&self) -> Result<SigningKey> {
        let parsed = match &self.auth_key {
            Some(AuthKey::Path(path)) => {
                if !path.is_file() {
                    return Err(Error::Key(format!(
                        "Auth key file not found at: {}",
                        path.display()
                    )));
                }
                let pem = SecretString::new(
                    std::fs::read_to_string(path)
                        .map_err(|e| Error::Key(format!("Failed to read auth key: {}", e)))?,
                );
                SigningKey::from_pkcs8_pem(pem.expose_secret())
            }
            Some(AuthKey::Pem(pem)) => SigningKey::from_pkcs8_pem(pem.expose_secret()),
            None => return Err(Error::PushConfig(INCOMPLETE_CONFIG.to_string())),
        };

        parsed.map_err(|_| Error::Key("Invalid auth key provided.".to_string()))
    }

    /// ES256 provider token: `base64url(header).base64url(claims).base64url(r||s)`.
    fn token(&self, issued_at: i64) -> Result<String> {
        let key = self.signing_key()?;

        let header = json!({ "alg": "ES256", "kid": self.key_id });
        let claims = json!({ "iss": self.team_id, "iat": issued_at });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let signature: Signature = key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| Error::Key(format!("Unable to sign JWT with provided key: {}", e)))?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

fn notification_payload(title: &str, body: &str) -> Value {
    json!({
        "aps": {
            "alert": { "title": title, "body": body },
            "sound": "default",
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::VerifyingKey;
    use p256::pkcs8::{EncodePrivateKey, LineEnding};

    fn test_key() -> (SigningKey, SecretString) {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap();
        (key, SecretString::new(pem.to_string()))
    }

    fn configured() -> PushNotifier {
        PushNotifier::new()
            .bundle_id("pass.com.example")
            .key_id("KEY1234567")
            .team_id("TEAM123456")
            .auth_key_pem(test_key().1)
    }

    fn decode_json(part: &str) -> Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    #[test]
    fn test_validate_incomplete() {
        let err = PushNotifier::new().bundle_id("pass.x").validate().unwrap_err();
        assert_eq!(err.to_string(), "Push configuration is incomplete.");

        let empty = configured().team_id("");
        assert!(matches!(empty.validate(), Err(Error::PushConfig(_))));
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_push_requires_config() {
        let result = PushNotifier::new().push("token", "t", "b");
        assert!(matches!(result, Err(Error::PushConfig(_))));
    }

    #[test]
    fn test_push_rejects_non_hex_token() {
        for token in ["", "ab/../cd", "abcd?x=1", "ab#cd", "abc", "zz"] {
            let result = configured().push(token, "t", "b");
            assert!(
                matches!(result, Err(Error::PushConfig(_))),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn test_missing_key_file() {
        let notifier = configured().auth_key_path("/nonexistent/AuthKey.p8");
        let err = notifier.token(0).unwrap_err();
        assert!(err.to_string().contains("Auth key file not found at:"));
    }

    #[test]
    fn test_invalid_key() {
        let notifier = configured().auth_key_pem(SecretString::new("not a key".to_string()));
        match notifier.token(0) {
            Err(Error::Key(msg)) => assert_eq!(msg, "Invalid auth key provided."),
            other => panic!("expected key error, got {other:?}"),
        }
    }

    #[test]
    fn test_key_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("AuthKey.p8");
        std::fs::write(&path, test_key().1.expose_secret()).unwrap();

        let notifier = configured().auth_key_path(&path);
        assert_eq!(notifier.token(0).unwrap().split('.').count(), 3);
    }

    #[test]
    fn test_token_structure_and_signature() {
        let (key, _) = test_key();
        let token = configured().token(1_700_000_000).unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(!token.contains('='));

        assert_eq!(
            decode_json(parts[0]),
            json!({ "alg": "ES256", "kid": "KEY1234567" })
        );
        assert_eq!(
            decode_json(parts[1]),
            json!({ "iss": "TEAM123456", "iat": 1_700_000_000 })
        );

        let raw = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        assert_eq!(raw.len(), 64);
        let signature = Signature::from_slice(&raw).unwrap();
        let verifying = VerifyingKey::from(&key);
        let input = format!("{}.{}", parts[0], parts[1]);
        assert!(verifying.verify(input.as_bytes(), &signature).is_ok());
    }

    #[test]
    fn test_endpoint_selection() {
        assert_eq!(
            configured().endpoint("abcd"),
            "https://api.push.apple.com/3/device/abcd"
        );
        assert_eq!(
            configured().production(false).endpoint("abcd"),
            "https://api.development.push.apple.com/3/device/abcd"
        );
    }

    #[test]
    fn test_notification_payload() {
        assert_eq!(
            notification_payload("Gate", "B12"),
            json!({ "aps": { "alert": { "title": "Gate", "body": "B12" }, "sound": "default" } })
        );
    }
}
