//! Signed, expiring blob URLs for backends without native presigning.

use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use url::Url;

use super::to_hex;
use crate::{ArborError, Result};

/// Issues and verifies `{base}/blobs/{key}?expires=..&signature=..` URLs.
///
/// The signature is a SHA-256 digest keyed by the configured secret over the blob key and the
/// expiry timestamp, so a URL cannot be retargeted at another blob or extended.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: Url,
}

impl UrlSigner {
    /// Create a signer for the given secret and public base URL.
    pub fn new(secret: &str, base_url: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(ArborError::Config(
                "signing secret must not be empty".to_string(),
            ));
        }

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            secret: secret.as_bytes().to_vec(),
            base_url,
        })
    }

    /// Issue a URL for `key` that expires `ttl` from now.
    pub fn sign(&self, key: &str, ttl: Duration) -> Result<String> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        self.sign_until(key, expires)
    }

    /// Issue a URL for `key` that expires at the given unix timestamp.
    pub fn sign_until(&self, key: &str, expires: i64) -> Result<String> {
        let mut url = self.base_url.join("blobs/")?.join(key)?;
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signature(key, expires));
        Ok(url.to_string())
    }

    /// Check a presented signature against `key` and `expires` at time `now`.
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if now > expires {
            return false;
        }
        let expected = self.signature(key, expires);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(expires.to_string().as_bytes());
        to_hex(&hasher.finalize())
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("test-secret", "http://localhost:8000").unwrap()
    }

    fn query_value(url: &str, name: &str) -> String {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(UrlSigner::new("", "http://localhost").is_err());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(UrlSigner::new("s", "not a url").is_err());
    }

    #[test]
    fn test_sign_url_shape() {
        let url = signer().sign_until("abc123", 1_700_000_000).unwrap();
        assert!(url.starts_with("http://localhost:8000/blobs/abc123?expires=1700000000&signature="));
    }

    #[test]
    fn test_base_path_preserved() {
        let signer = UrlSigner::new("s", "https://cdn.example.com/store").unwrap();
        let url = signer.sign_until("k", 10).unwrap();
        assert!(url.starts_with("https://cdn.example.com/store/blobs/k?"));
    }

    #[test]
    fn test_verify_roundtrip() {
        let signer = signer();
        let url = signer.sign_until("abc123", 2_000).unwrap();
        let signature = query_value(&url, "signature");

        assert!(signer.verify("abc123", 2_000, &signature, 1_000));
    }

    #[test]
    fn test_verify_rejects_expired() {
        let signer = signer();
        let url = signer.sign_until("abc123", 2_000).unwrap();
        let signature = query_value(&url, "signature");

        assert!(!signer.verify("abc123", 2_000, &signature, 2_001));
    }

    #[test]
    fn test_verify_rejects_other_key_or_expiry() {
        let signer = signer();
        let url = signer.sign_until("abc123", 2_000).unwrap();
        let signature = query_value(&url, "signature");

        assert!(!signer.verify("abc124", 2_000, &signature, 1_000));
        assert!(!signer.verify("abc123", 3_000, &signature, 1_000));
        assert!(!signer.verify("abc123", 2_000, "deadbeef", 1_000));
    }

    #[test]
    fn test_different_secrets_differ() {
        let a = UrlSigner::new("a", "http://h").unwrap();
        let b = UrlSigner::new("b", "http://h").unwrap();
        assert_ne!(a.sign_until("k", 5).unwrap(), b.sign_until("k", 5).unwrap());
    }

    #[test]
    fn test_sign_uses_ttl() {
        let url = signer().sign("k", Duration::from_secs(3600)).unwrap();
        let expires: i64 = query_value(&url, "expires").parse().unwrap();
        let now = Utc::now().timestamp();
        assert!(expires >= now + 3590 && expires <= now + 3610);
    }
}
