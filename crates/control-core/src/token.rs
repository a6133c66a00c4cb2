//! Stateless signed tokens. Unlike the cloud-account session token (an
//! opaque bearer credential looked up by hash against the `sessions`
//! table, the same shape as a node token), the short-lived impersonation
//! link embeds its claims as a base64url JSON payload plus an HMAC-SHA256
//! tag — verification is a pure function of the shared secret, so any
//! control-plane instance can validate a link without a database round
//! trip, which matters because the link is handed to a browser that talks
//! to the edge server's own origin, not back to the cloud.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;

use crate::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

fn b64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn b64_decode(s: &str) -> Result<Vec<u8>, CoreError> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| CoreError::Unauthenticated)
}

/// Signs `claims` into an opaque `<payload>.<tag>` token using `secret`.
pub fn sign<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, CoreError> {
    let payload = serde_json::to_vec(claims)
        .map_err(|e| CoreError::Internal(format!("token encode failure: {e}")))?;
    let payload_b64 = b64_encode(&payload);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CoreError::Internal(format!("hmac key failure: {e}")))?;
    mac.update(payload_b64.as_bytes());
    let tag = mac.finalize().into_bytes();

    Ok(format!("{payload_b64}.{}", b64_encode(&tag)))
}

/// Verifies and decodes a token minted by [`sign`]. Fails closed: a missing
/// segment, a bad signature, or a non-UTF8/non-JSON payload are all
/// `Unauthenticated`, never a panic.
pub fn verify<T: DeserializeOwned>(token: &str, secret: &[u8]) -> Result<T, CoreError> {
    let (payload_b64, tag_b64) = token.split_once('.').ok_or(CoreError::Unauthenticated)?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CoreError::Internal(format!("hmac key failure: {e}")))?;
    mac.update(payload_b64.as_bytes());
    let expected_tag = b64_decode(tag_b64)?;
    mac.verify_slice(&expected_tag)
        .map_err(|_| CoreError::Unauthenticated)?;

    let payload = b64_decode(payload_b64)?;
    serde_json::from_slice(&payload).map_err(|_| CoreError::Unauthenticated)
}

/// Claims carried by a store impersonation link (§6). Embeds enough of the
/// calling account's identity that the receiving UI can attribute actions
/// without a second lookup.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ImpersonationClaims {
    pub store_id: uuid::Uuid,
    pub store_code: String,
    pub tenant_id: uuid::Uuid,
    pub reseller_id: Option<uuid::Uuid>,
    pub cloud_account_id: uuid::Uuid,
    pub cloud_account_type: crate::entities::AccountType,
    pub cloud_account_email: String,
    pub expires_at: DateTime<Utc>,
}

impl ImpersonationClaims {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_claims(now: DateTime<Utc>) -> ImpersonationClaims {
        ImpersonationClaims {
            store_id: uuid::Uuid::new_v4(),
            store_code: "SMOKE-1".into(),
            tenant_id: uuid::Uuid::new_v4(),
            reseller_id: None,
            cloud_account_id: uuid::Uuid::new_v4(),
            cloud_account_type: crate::entities::AccountType::Owner,
            cloud_account_email: "owner@example.com".into(),
            expires_at: now + Duration::minutes(5),
        }
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let claims = sample_claims(Utc::now());
        let token = sign(&claims, b"test-secret").unwrap();
        let decoded: ImpersonationClaims = verify(&token, b"test-secret").unwrap();
        assert_eq!(decoded.store_id, claims.store_id);
        assert_eq!(decoded.cloud_account_email, claims.cloud_account_email);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let claims = sample_claims(Utc::now());
        let token = sign(&claims, b"test-secret").unwrap();
        let wrong_secret_result: Result<ImpersonationClaims, _> = verify(&token, b"other-secret");
        assert!(wrong_secret_result.is_err());
    }
}
