//! Request-scoped identity extractors (§4.1).
//!
//! `AuthedOperator` resolves the `Authorization: Bearer <session>` header
//! against the session store and derives a `Scope` once, so handlers never
//! branch on `account_type` themselves. `NodeAuth` resolves the `x-node-id`
//! / `x-node-token` header pair edge servers authenticate with. Both are
//! `FromRequestParts` extractors: a handler that never calls them never
//! pays for the lookup, and one that declares them gets a typed, already-
//! authenticated value instead of an `Option` it has to null-check (§9).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use control_core::{CloudAccount, CoreError, Node, Scope};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub struct AuthedOperator {
    pub account: CloudAccount,
    pub scope: Scope,
}

impl FromRequestParts<AppState> for AuthedOperator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(CoreError::Unauthenticated)?;

        let session = state
            .sessions()
            .get_valid_by_token(&token, Utc::now())
            .await
            .map_err(ApiError::from)?
            .ok_or(CoreError::Unauthenticated)?;

        let account = state.accounts().get(session.cloud_account_id).await?;
        let scope = Scope::from_account(&account);

        Ok(AuthedOperator { account, scope })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(str::to_string)
}

pub struct NodeAuth(pub Node);

impl FromRequestParts<AppState> for NodeAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let node_id = header_str(parts, "x-node-id").ok_or(CoreError::Unauthenticated)?;
        let node_token = header_str(parts, "x-node-token").ok_or(CoreError::Unauthenticated)?;

        let node_id = Uuid::parse_str(&node_id).map_err(|_| CoreError::Unauthenticated)?;
        let node = state.nodes().get(node_id).await.map_err(|_| CoreError::Unauthenticated)?;

        if !control_core::secret::verify(&node_token, &node.token_hash) {
            return Err(CoreError::Unauthenticated.into());
        }

        Ok(NodeAuth(node))
    }
}

fn header_str(parts: &Parts, name: &str) -> Option<String> {
    parts.headers.get(name)?.to_str().ok().map(str::to_string)
}

/// Verifies that `expected_node_id`, when given, matches the authenticated
/// node — the guard in `requireNodeAuth` (§4.1) for path-scoped node
/// endpoints like `/cloud/nodes/{nodeId}/commands`.
pub fn require_node_matches(node: &Node, expected_node_id: Uuid) -> Result<(), ApiError> {
    if node.id != expected_node_id {
        return Err(CoreError::forbidden("node token does not match path node id").into());
    }
    Ok(())
}
