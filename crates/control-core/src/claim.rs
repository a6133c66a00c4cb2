//! Wire types for the two public endpoints the edge server exposes to the
//! Claim Coordinator (§4.6). These are pure data — the outbound HTTP calls
//! themselves, and the transactional node/store upsert around them, live in
//! the HTTP crate, which owns the reqwest client and the inbound request
//! whose headers seed the cloud base URL fallback.

use serde::{Deserialize, Serialize};

use crate::validation::normalize_node_key_fragment;

/// Body of `POST <edgeBaseUrl>/onsite/public/claim/consume`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimConsumeRequest {
    pub claim_id: String,
    pub claim_code: String,
}

/// Response of `claim/consume`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimConsumeResponse {
    pub server_uid: String,
    pub server_label: Option<String>,
    pub store_name_hint: Option<String>,
    pub address_hint: Option<String>,
    pub timezone_hint: Option<String>,
    pub finalize_token: Option<String>,
    pub finalize_expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ClaimConsumeResponse {
    /// The node key a claimed onsite server is filed under, per §4.6 step 2:
    /// `"ONSITE-" + normalize(serverUid)`, truncated to 64 characters total.
    pub fn derived_node_key(&self) -> String {
        let fragment = normalize_node_key_fragment(&self.server_uid);
        let mut key = format!("ONSITE-{fragment}");
        key.truncate(64);
        key
    }
}

/// Body of `POST <edgeBaseUrl>/onsite/public/claim/finalize`. Its response
/// is ignored on success (§4.6 step 5); failure is non-fatal and surfaced
/// to the operator as `onsite.finalizeError`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimFinalizeRequest {
    pub finalize_token: String,
    pub cloud_store_id: uuid::Uuid,
    pub cloud_store_code: String,
    pub cloud_node_id: uuid::Uuid,
    pub node_key: String,
    pub node_token: String,
    pub cloud_base_url: Option<String>,
    pub linked_by: uuid::Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_node_key_is_prefixed_and_normalized() {
        let response = ClaimConsumeResponse {
            server_uid: "server-123".into(),
            server_label: None,
            store_name_hint: None,
            address_hint: None,
            timezone_hint: None,
            finalize_token: None,
            finalize_expires_at: None,
        };
        assert_eq!(response.derived_node_key(), "ONSITE-SERVER-123");
    }

    #[test]
    fn derived_node_key_is_truncated_to_64_chars() {
        let response = ClaimConsumeResponse {
            server_uid: "a".repeat(100),
            server_label: None,
            store_name_hint: None,
            address_hint: None,
            timezone_hint: None,
            finalize_token: None,
            finalize_expires_at: None,
        };
        assert_eq!(response.derived_node_key().len(), 64);
    }
}
