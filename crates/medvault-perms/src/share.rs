//! Signed, expiring share links.
//!
//! A link has the form `<base>/share/<record id>?token=<token>`. The token
//! is `hex(nonce || expires_at || mac)` where `mac` is a keyed BLAKE3 hash
//! over the CBOR encoding of [`ShareClaims`]. Only the holder of the
//! [`ShareKey`] can mint tokens, and expiry is checked on every open.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use medvault_core::RecordId;

use crate::error::{PermsError, Result};

const NONCE_LEN: usize = 16;
const EXPIRY_LEN: usize = 8;
const MAC_LEN: usize = 32;
const TOKEN_LEN: usize = NONCE_LEN + EXPIRY_LEN + MAC_LEN;

/// Default lifetime of a share link: 24 hours.
pub const DEFAULT_SHARE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Secret used to sign share-link tokens.
#[derive(Clone)]
pub struct ShareKey([u8; 32]);

impl ShareKey {
    /// Generate a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Mint a link for `record_id` valid until `now + ttl_ms`.
    pub fn issue(
        &self,
        record_id: RecordId,
        base_url: &str,
        ttl_ms: i64,
        now: i64,
    ) -> Result<ShareLink> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let expires_at = now.saturating_add(ttl_ms);

        let claims = ShareClaims {
            record_id,
            nonce,
            expires_at,
        };
        let mac = self.mac(&claims)?;

        let mut raw = Vec::with_capacity(TOKEN_LEN);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&expires_at.to_be_bytes());
        raw.extend_from_slice(mac.as_bytes());
        let token = hex::encode(raw);

        let url = format!(
            "{}/share/{}?token={}",
            base_url.trim_end_matches('/'),
            record_id,
            token
        );

        Ok(ShareLink {
            record_id,
            token,
            expires_at,
            url,
        })
    }

    /// Check that `token` was minted for `record_id` and has not expired.
    ///
    /// Returns the expiry on success.
    pub fn verify(&self, record_id: RecordId, token: &str, now: i64) -> Result<i64> {
        let raw = hex::decode(token)
            .map_err(|e| PermsError::InvalidShareLink(format!("token is not hex: {e}")))?;
        if raw.len() != TOKEN_LEN {
            return Err(PermsError::InvalidShareLink(format!(
                "token has {} bytes, expected {}",
                raw.len(),
                TOKEN_LEN
            )));
        }

        let (nonce, rest) = raw.split_at(NONCE_LEN);
        let (expiry, mac) = rest.split_at(EXPIRY_LEN);

        let mut nonce_arr = [0u8; NONCE_LEN];
        nonce_arr.copy_from_slice(nonce);
        let mut expiry_arr = [0u8; EXPIRY_LEN];
        expiry_arr.copy_from_slice(expiry);
        let mut mac_arr = [0u8; MAC_LEN];
        mac_arr.copy_from_slice(mac);

        let claims = ShareClaims {
            record_id,
            nonce: nonce_arr,
            expires_at: i64::from_be_bytes(expiry_arr),
        };

        // blake3::Hash equality is constant time.
        if self.mac(&claims)? != blake3::Hash::from(mac_arr) {
            return Err(PermsError::InvalidShareLink("signature mismatch".into()));
        }
        if now > claims.expires_at {
            return Err(PermsError::ShareLinkExpired(claims.expires_at));
        }
        Ok(claims.expires_at)
    }

    fn mac(&self, claims: &ShareClaims) -> Result<blake3::Hash> {
        let mut buf = Vec::new();
        ciborium::into_writer(claims, &mut buf)
            .map_err(|e| PermsError::SerializationError(e.to_string()))?;
        Ok(blake3::keyed_hash(&self.0, &buf))
    }
}

impl fmt::Debug for ShareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShareKey(..)")
    }
}

/// The signed fields of a share token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareClaims {
    pub record_id: RecordId,
    pub nonce: [u8; NONCE_LEN],
    /// Unix ms.
    pub expires_at: i64,
}

/// An issued share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub record_id: RecordId,
    pub token: String,
    /// Unix ms.
    pub expires_at: i64,
    pub url: String,
}

impl ShareLink {
    /// Split a share URL into record id and token.
    pub fn parse_url(url: &str) -> Result<(RecordId, String)> {
        let (_, tail) = url
            .split_once("/share/")
            .ok_or_else(|| PermsError::InvalidShareLink("missing /share/ segment".into()))?;
        let (id, query) = tail
            .split_once('?')
            .ok_or_else(|| PermsError::InvalidShareLink("missing token".into()))?;

        let token = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PermsError::InvalidShareLink("missing token".into()))?;

        let record_id = RecordId::from_hex(id.trim_end_matches('/'))?;
        Ok((record_id, token.to_string()))
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:3000";

    #[test]
    fn test_issue_and_verify() {
        let key = ShareKey::generate();
        let id = RecordId::generate();
        let link = key.issue(id, BASE, DEFAULT_SHARE_TTL_MS, 1_000).unwrap();

        assert!(link.url.starts_with("http://localhost:3000/share/"));
        assert_eq!(link.expires_at, 1_000 + DEFAULT_SHARE_TTL_MS);

        let (parsed_id, token) = ShareLink::parse_url(&link.url).unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(token, link.token);
        assert_eq!(key.verify(id, &token, 2_000).unwrap(), link.expires_at);
    }

    #[test]
    fn test_trailing_slash_base() {
        let key = ShareKey::generate();
        let link = key
            .issue(RecordId::generate(), "https://vault.example/", 10, 0)
            .unwrap();
        assert!(link.url.starts_with("https://vault.example/share/"));
    }

    #[test]
    fn test_expired_link() {
        let key = ShareKey::generate();
        let id = RecordId::generate();
        let link = key.issue(id, BASE, 100, 0).unwrap();

        assert!(key.verify(id, &link.token, 100).is_ok());
        assert!(matches!(
            key.verify(id, &link.token, 101),
            Err(PermsError::ShareLinkExpired(100))
        ));
    }

    #[test]
    fn test_token_bound_to_record_and_key() {
        let key = ShareKey::generate();
        let id = RecordId::generate();
        let link = key.issue(id, BASE, 100, 0).unwrap();

        assert!(matches!(
            key.verify(RecordId::generate(), &link.token, 0),
            Err(PermsError::InvalidShareLink(_))
        ));
        assert!(matches!(
            ShareKey::generate().verify(id, &link.token, 0),
            Err(PermsError::InvalidShareLink(_))
        ));
    }

    #[test]
    fn test_tampered_expiry_rejected() {
        let key = ShareKey::from_bytes([7; 32]);
        let id = RecordId::from_bytes([1; 16]);
        let link = key.issue(id, BASE, 100, 0).unwrap();

        let mut raw = hex::decode(&link.token).unwrap();
        raw[NONCE_LEN..NONCE_LEN + EXPIRY_LEN].copy_from_slice(&i64::MAX.to_be_bytes());
        let forged = hex::encode(raw);

        assert!(matches!(
            key.verify(id, &forged, 0),
            Err(PermsError::InvalidShareLink(_))
        ));
    }

    #[test]
    fn test_parse_url_errors() {
        assert!(ShareLink::parse_url("http://x/records/abc").is_err());
        assert!(ShareLink::parse_url("http://x/share/abc").is_err());
        assert!(ShareLink::parse_url("http://x/share/zz?token=00").is_err());
        assert!(ShareLink::parse_url(&format!(
            "http://x/share/{}?token=",
            RecordId::generate()
        ))
        .is_err());
    }
}
