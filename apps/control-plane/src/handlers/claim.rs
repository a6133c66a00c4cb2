//! The two-phase on-premise claim handshake (§4.6): the only place this
//! service calls out to another HTTP server. The outbound calls live
//! entirely outside any database transaction (§9 "edge outbound HTTP").

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use control_core::claim::ClaimFinalizeRequest;
use control_core::{validation, CoreError, Node, Store};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthedOperator;
use crate::claim_client::ClaimClient;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub onsite_base_url: String,
    pub claim_id: String,
    pub claim_code: String,
    pub tenant_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub store_name: Option<String>,
    pub store_code: Option<String>,
    pub timezone: Option<String>,
    pub edge_base_url: Option<String>,
    pub cloud_base_url: Option<String>,
    pub node_label: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedNode {
    #[serde(flatten)]
    pub node: Node,
    pub node_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnsiteResult {
    pub server_uid: String,
    pub finalized: bool,
    pub finalize_error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub store: Store,
    pub node: ClaimedNode,
    pub onsite: OnsiteResult,
}

/// Derives the cloud's own base URL from the inbound request when the
/// operator didn't supply one (§4.6): `x-forwarded-proto` + `x-forwarded-
/// host` if present, else `host`.
fn infer_cloud_base_url(headers: &HeaderMap, supplied: Option<String>) -> Option<String> {
    if supplied.is_some() {
        return supplied;
    }

    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(axum::http::header::HOST))
        .and_then(|v| v.to_str().ok())?;
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");

    Some(format!("{proto}://{host}"))
}

pub async fn claim(
    State(state): State<AppState>,
    operator: AuthedOperator,
    headers: HeaderMap,
    Json(body): Json<ClaimRequest>,
) -> ApiResult<Json<ClaimResponse>> {
    if body.tenant_id.is_some() == body.store_id.is_some() {
        return Err(CoreError::validation("specify exactly one of tenantId or storeId").into());
    }

    let claim_client = ClaimClient::new(state.config.claim_timeout);
    let consumed = claim_client
        .consume(&body.onsite_base_url, &body.claim_id, &body.claim_code)
        .await?;

    let node_key = consumed.derived_node_key();
    let existing_node = state.nodes().get_by_node_key(&node_key).await?;

    let store = resolve_target_store(&state, &operator, &body, &consumed, existing_node.as_ref()).await?;

    if let Some(existing) = &existing_node {
        if existing.store_id != store.id {
            return Err(CoreError::conflict(format!(
                "node key '{node_key}' is already linked to a different store"
            ))
            .into());
        }
    }

    let node_token = control_db::repositories::nodes::generate_node_token();
    let node_token_hash = control_core::secret::hash(&node_token);
    let label = body.node_label.clone().unwrap_or_else(|| node_key.clone());

    let metadata = serde_json::json!({
        "serverUid": consumed.server_uid,
        "onsiteBaseUrl": body.onsite_base_url,
    });

    let node = state
        .nodes()
        .upsert_for_claim(store.id, &node_key, &label, &node_token_hash, metadata, chrono::Utc::now())
        .await?;

    let mut finalized = true;
    let mut finalize_error = None;

    if let Some(finalize_token) = consumed.finalize_token.clone() {
        let cloud_base_url = infer_cloud_base_url(&headers, body.cloud_base_url.clone());
        let finalize_request = ClaimFinalizeRequest {
            finalize_token,
            cloud_store_id: store.id,
            cloud_store_code: store.code.clone(),
            cloud_node_id: node.id,
            node_key: node_key.clone(),
            node_token: node_token.clone(),
            cloud_base_url,
            linked_by: operator.account.id,
        };

        if let Err(err) = claim_client.finalize(&body.onsite_base_url, &finalize_request).await {
            finalized = false;
            finalize_error = Some(err.to_string());
        }
    }

    Ok(Json(ClaimResponse {
        store,
        node: ClaimedNode { node, node_token },
        onsite: OnsiteResult {
            server_uid: consumed.server_uid,
            finalized,
            finalize_error,
        },
    }))
}

async fn resolve_target_store(
    state: &AppState,
    operator: &AuthedOperator,
    body: &ClaimRequest,
    consumed: &control_core::claim::ClaimConsumeResponse,
    existing_node: Option<&Node>,
) -> ApiResult<Store> {
    if let Some(store_id) = body.store_id {
        let store = state.stores().get(store_id).await?;
        require_store_access(state, operator, &store).await?;
        return Ok(store);
    }

    // tenantId path: reuse the existing node's store if this physical
    // server was already claimed once under the same tenant, otherwise
    // create a fresh store.
    let tenant_id = body.tenant_id.expect("xor-checked above");
    let tenant = state.tenants().get(tenant_id).await?;
    if !operator.scope.can_access_tenant(tenant.id, tenant.reseller_id) {
        return Err(CoreError::forbidden("tenant is out of scope").into());
    }

    if let Some(existing) = existing_node {
        let existing_store = state.stores().get(existing.store_id).await?;
        if existing_store.tenant_id == tenant_id {
            return Ok(existing_store);
        }
    }

    let name = body
        .store_name
        .clone()
        .or_else(|| consumed.store_name_hint.clone())
        .unwrap_or_else(|| format!("Onsite store {}", consumed.server_uid));
    let code = match &body.store_code {
        Some(code) => validation::normalize_code(code)?,
        None => validation::normalize_code(&format!("ONSITE-{}", consumed.server_uid))?,
    };
    let timezone = body
        .timezone
        .clone()
        .or_else(|| consumed.timezone_hint.clone())
        .unwrap_or_else(|| "UTC".to_string());
    let edge_base_url = body.edge_base_url.as_deref();

    Ok(state.stores().create(tenant_id, &code, &name, &timezone, edge_base_url).await?)
}

async fn require_store_access(state: &AppState, operator: &AuthedOperator, store: &Store) -> ApiResult<()> {
    let tenant = state.tenants().get(store.tenant_id).await?;
    if !operator.scope.can_access_tenant(tenant.id, tenant.reseller_id) {
        return Err(CoreError::forbidden("store is out of scope").into());
    }
    Ok(())
}
