//! The tenancy hierarchy: resellers, tenants, stores, and the cloud
//! accounts scoped under each (§6 "Operator — hierarchy"). Every creation
//! endpoint checks the caller's `Scope` against the target before writing;
//! every listing endpoint delegates scope filtering to the repository,
//! which builds the `WHERE` clause from the same `Scope` value (§4.1, §9).

use axum::extract::{Path, Query, State};
use axum::Json;
use control_core::{validation, AccountType, CoreError, Scope};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthedOperator;
use crate::error::ApiResult;
use crate::state::AppState;

// --- resellers ---------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResellerRequest {
    pub code: String,
    pub name: String,
}

pub async fn list_resellers(
    State(state): State<AppState>,
    operator: AuthedOperator,
) -> ApiResult<Json<Vec<control_core::Reseller>>> {
    Ok(Json(state.resellers().list(&operator.scope).await?))
}

pub async fn create_reseller(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Json(body): Json<CreateResellerRequest>,
) -> ApiResult<Json<control_core::Reseller>> {
    require_owner(&operator.scope)?;
    let code = validation::normalize_code(&body.code)?;
    Ok(Json(state.resellers().create(&code, &body.name).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

pub async fn create_reseller_account(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(reseller_id): Path<Uuid>,
    Json(body): Json<CreateAccountRequest>,
) -> ApiResult<Json<control_core::CloudAccount>> {
    require_owner(&operator.scope)?;
    state.resellers().get(reseller_id).await?;

    let email = validation::normalize_email(&body.email)?;
    let password_hash = control_core::secret::hash(&body.password);

    Ok(Json(
        state
            .accounts()
            .create(
                &email,
                &password_hash,
                &body.display_name,
                AccountType::Reseller,
                Some(reseller_id),
                None,
            )
            .await?,
    ))
}

// --- tenants -------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTenantsQuery {
    pub reseller_id: Option<Uuid>,
}

pub async fn list_tenants(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Query(query): Query<ListTenantsQuery>,
) -> ApiResult<Json<Vec<control_core::Tenant>>> {
    Ok(Json(
        state.tenants().list(&operator.scope, query.reseller_id).await?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    pub reseller_id: Option<Uuid>,
    pub slug: String,
    pub name: String,
}

pub async fn create_tenant(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Json(body): Json<CreateTenantRequest>,
) -> ApiResult<Json<control_core::Tenant>> {
    let reseller_id = resolve_tenant_reseller(&operator.scope, body.reseller_id)?;
    let slug = validation::normalize_slug(&body.slug)?;
    Ok(Json(state.tenants().create(reseller_id, &slug, &body.name).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantUnderResellerRequest {
    pub slug: String,
    pub name: String,
}

pub async fn create_tenant_under_reseller(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(reseller_id): Path<Uuid>,
    Json(body): Json<CreateTenantUnderResellerRequest>,
) -> ApiResult<Json<control_core::Tenant>> {
    if !operator.scope.can_access_reseller(reseller_id) {
        return Err(CoreError::forbidden("reseller is out of scope").into());
    }
    let slug = validation::normalize_slug(&body.slug)?;
    Ok(Json(
        state.tenants().create(Some(reseller_id), &slug, &body.name).await?,
    ))
}

pub async fn create_tenant_account(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(tenant_id): Path<Uuid>,
    Json(body): Json<CreateAccountRequest>,
) -> ApiResult<Json<control_core::CloudAccount>> {
    let tenant = state.tenants().get(tenant_id).await?;
    if !operator.scope.can_access_tenant(tenant.id, tenant.reseller_id) {
        return Err(CoreError::forbidden("tenant is out of scope").into());
    }

    let email = validation::normalize_email(&body.email)?;
    let password_hash = control_core::secret::hash(&body.password);

    Ok(Json(
        state
            .accounts()
            .create(
                &email,
                &password_hash,
                &body.display_name,
                AccountType::TenantAdmin,
                None,
                Some(tenant_id),
            )
            .await?,
    ))
}

// --- stores ----------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStoresQuery {
    pub tenant_id: Option<Uuid>,
}

pub async fn list_stores(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Query(query): Query<ListStoresQuery>,
) -> ApiResult<Json<Vec<control_core::Store>>> {
    Ok(Json(state.stores().list(&operator.scope, query.tenant_id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub timezone: String,
    pub edge_base_url: Option<String>,
}

pub async fn create_store(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Json(body): Json<CreateStoreRequest>,
) -> ApiResult<Json<control_core::Store>> {
    let tenant = state.tenants().get(body.tenant_id).await?;
    if !operator.scope.can_access_tenant(tenant.id, tenant.reseller_id) {
        return Err(CoreError::forbidden("tenant is out of scope").into());
    }

    let code = validation::normalize_code(&body.code)?;
    Ok(Json(
        state
            .stores()
            .create(
                tenant.id,
                &code,
                &body.name,
                &body.timezone,
                body.edge_base_url.as_deref(),
            )
            .await?,
    ))
}

// --- bootstrap tokens --------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBootstrapTokenRequest {
    pub label: String,
    pub expires_in_hours: Option<i64>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBootstrapTokenResponse {
    pub bootstrap_token: control_core::BootstrapToken,
    pub token: String,
}

/// Mints a single-use bootstrap credential a node can redeem via
/// `POST /cloud/nodes/register` (§3, §4.5). The plaintext `token` is
/// returned exactly once and never logged, the same contract as a node
/// token (§4.2, §4.5 step 5).
pub async fn create_bootstrap_token(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(store_id): Path<Uuid>,
    Json(body): Json<CreateBootstrapTokenRequest>,
) -> ApiResult<Json<CreateBootstrapTokenResponse>> {
    let store = state.stores().get(store_id).await?;
    let tenant = state.tenants().get(store.tenant_id).await?;
    if !operator.scope.can_access_tenant(tenant.id, tenant.reseller_id) {
        return Err(CoreError::forbidden("store is out of scope").into());
    }

    let ttl = match body.expires_in_hours {
        Some(hours) => chrono::Duration::hours(hours),
        None => state.config.bootstrap_token_ttl,
    };
    let expires_at = chrono::Utc::now() + ttl;

    let token = control_db::repositories::bootstrap_tokens::generate_bootstrap_token();
    let token_hash = control_core::secret::hash(&token);

    let bootstrap_token = state
        .bootstrap_tokens()
        .create(store.id, &body.label, &token_hash, expires_at)
        .await?;

    Ok(Json(CreateBootstrapTokenResponse { bootstrap_token, token }))
}

// --- shared scope guards ---------------------------------------------------

fn require_owner(scope: &Scope) -> Result<(), crate::error::ApiError> {
    match scope {
        Scope::Owner => Ok(()),
        _ => Err(CoreError::forbidden("only an owner account may perform this action").into()),
    }
}

/// A reseller-scoped caller may only create tenants under its own
/// reseller; an owner may create a top-level tenant or one under any
/// reseller it names; a tenant admin may never create tenants (§9
/// "multi-tenant references").
fn resolve_tenant_reseller(scope: &Scope, requested: Option<Uuid>) -> Result<Option<Uuid>, crate::error::ApiError> {
    match scope {
        Scope::Owner => Ok(requested),
        Scope::Reseller(id) => match requested {
            Some(requested_id) if requested_id != *id => {
                Err(CoreError::forbidden("reseller is out of scope").into())
            }
            _ => Ok(Some(*id)),
        },
        Scope::TenantAdmin(_) => Err(CoreError::forbidden("tenant admins may not create tenants").into()),
    }
}

