use axum::extract::{Path, Query, State};
use axum::Json;
use control_core::{validation, Command, CoreError, Revision};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthedOperator;
use crate::error::ApiResult;
use crate::state::AppState;

async fn require_store_access(state: &AppState, operator: &AuthedOperator, store_id: Uuid) -> ApiResult<()> {
    let store = state.stores().get(store_id).await?;
    let tenant = state.tenants().get(store.tenant_id).await?;
    if !operator.scope.can_access_tenant(tenant.id, tenant.reseller_id) {
        return Err(CoreError::forbidden("store is out of scope").into());
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRevisionRequest {
    pub domain: String,
    pub payload: Value,
    pub command_type: Option<String>,
    pub node_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRevisionResponse {
    pub revision: Revision,
    pub command: Command,
}

pub async fn publish_revision(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(store_id): Path<Uuid>,
    Json(body): Json<PublishRevisionRequest>,
) -> ApiResult<Json<PublishRevisionResponse>> {
    require_store_access(&state, &operator, store_id).await?;
    let domain = validation::normalize_domain(&body.domain)?;

    let (revision, command) = state
        .revisions()
        .publish(
            store_id,
            &domain,
            body.payload,
            body.node_id,
            body.command_type,
            operator.account.id,
        )
        .await?;

    Ok(Json(PublishRevisionResponse { revision, command }))
}

#[derive(Deserialize)]
pub struct LatestRevisionQuery {
    pub domain: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum LatestRevisionResponse {
    Single(Option<Revision>),
    ByDomain(std::collections::HashMap<String, Revision>),
}

pub async fn latest_revision(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(store_id): Path<Uuid>,
    Query(query): Query<LatestRevisionQuery>,
) -> ApiResult<Json<LatestRevisionResponse>> {
    require_store_access(&state, &operator, store_id).await?;

    match query.domain {
        Some(domain) => {
            let domain = validation::normalize_domain(&domain)?;
            let revision = state.revisions().latest_for_domain(store_id, &domain).await?;
            Ok(Json(LatestRevisionResponse::Single(revision)))
        }
        None => {
            let by_domain = state.revisions().latest_by_domain(store_id).await?;
            Ok(Json(LatestRevisionResponse::ByDomain(by_domain)))
        }
    }
}
