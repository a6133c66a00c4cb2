//! Outbound HTTP calls to the two public endpoints an edge server exposes
//! during the claim handshake (§4.6). Kept outside any database
//! transaction per §5: these calls cross the network and must never hold
//! a lock while they do.

use std::time::Duration;

use control_core::claim::{ClaimConsumeRequest, ClaimConsumeResponse, ClaimFinalizeRequest};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimClientError {
    #[error("onsite server did not respond in time")]
    Timeout,

    #[error("onsite server returned an error: {0}")]
    Upstream(String),

    #[error("onsite server response was malformed: {0}")]
    MalformedResponse(String),
}

impl From<ClaimClientError> for crate::error::ApiError {
    fn from(err: ClaimClientError) -> Self {
        control_core::CoreError::Upstream(err.to_string()).into()
    }
}

pub struct ClaimClient {
    http: reqwest::Client,
}

impl ClaimClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("control-plane/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client configuration is static and always valid");

        Self { http }
    }

    pub async fn consume(
        &self,
        edge_base_url: &str,
        claim_id: &str,
        claim_code: &str,
    ) -> Result<ClaimConsumeResponse, ClaimClientError> {
        let url = format!("{}/onsite/public/claim/consume", edge_base_url.trim_end_matches('/'));
        let body = ClaimConsumeRequest {
            claim_id: claim_id.to_string(),
            claim_code: claim_code.to_string(),
        };

        let response = self.http.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ClaimClientError::Timeout
            } else {
                ClaimClientError::Upstream(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(ClaimClientError::Upstream(format!(
                "claim/consume returned {}",
                response.status()
            )));
        }

        response
            .json::<ClaimConsumeResponse>()
            .await
            .map_err(|e| ClaimClientError::MalformedResponse(e.to_string()))
    }

    /// Best-effort; callers treat any failure as non-fatal (§4.6 step 5).
    pub async fn finalize(
        &self,
        edge_base_url: &str,
        request: &ClaimFinalizeRequest,
    ) -> Result<(), ClaimClientError> {
        let url = format!("{}/onsite/public/claim/finalize", edge_base_url.trim_end_matches('/'));

        let response = self.http.post(&url).json(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ClaimClientError::Timeout
            } else {
                ClaimClientError::Upstream(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(ClaimClientError::Upstream(format!(
                "claim/finalize returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
