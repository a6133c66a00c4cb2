//! Mints the short-lived signed link an operator uses to open a store's
//! on-premise UI as themselves (§6, §9). The token is stateless: any
//! control-plane instance holding the same `impersonation_secret` can
//! verify it without a database round trip.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use control_core::token::{sign, ImpersonationClaims};
use control_core::{CoreError, Store};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthedOperator;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationLinkRequest {
    pub target_base_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationLinkResponse {
    pub store: Store,
    pub target_base_url: String,
    pub expires_in_seconds: i64,
    pub url: String,
}

pub async fn create_impersonation_link(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(store_id): Path<Uuid>,
    Json(body): Json<ImpersonationLinkRequest>,
) -> ApiResult<Json<ImpersonationLinkResponse>> {
    let store = state.stores().get(store_id).await?;
    let tenant = state.tenants().get(store.tenant_id).await?;
    if !operator.scope.can_access_tenant(tenant.id, tenant.reseller_id) {
        return Err(CoreError::forbidden("store is out of scope").into());
    }

    let target_base_url = body
        .target_base_url
        .or_else(|| store.edge_base_url.clone())
        .ok_or_else(|| CoreError::validation("store has no edge base url configured; supply targetBaseUrl"))?;

    let now = Utc::now();
    let expires_at = now + state.config.impersonation_ttl;

    let claims = ImpersonationClaims {
        store_id: store.id,
        store_code: store.code.clone(),
        tenant_id: tenant.id,
        reseller_id: tenant.reseller_id,
        cloud_account_id: operator.account.id,
        cloud_account_type: operator.account.account_type,
        cloud_account_email: operator.account.email.clone(),
        expires_at,
    };

    let token = sign(&claims, &state.config.impersonation_secret)?;
    let url = format!(
        "{}/onsite/impersonate?token={token}",
        target_base_url.trim_end_matches('/')
    );

    Ok(Json(ImpersonationLinkResponse {
        store,
        target_base_url,
        expires_in_seconds: state.config.impersonation_ttl.num_seconds(),
        url,
    }))
}
