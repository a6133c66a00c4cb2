use axum::extract::State;
use axum::Json;
use control_core::{CoreError, secret, validation};
use serde::{Deserialize, Serialize};

use crate::auth::AuthedOperator;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub account: control_core::CloudAccount,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = validation::normalize_email(&body.email)?;

    let account = state
        .accounts()
        .get_by_email(&email)
        .await?
        .ok_or(CoreError::Unauthenticated)?;

    if !secret::verify(&body.password, &account.password_hash) {
        return Err(CoreError::Unauthenticated.into());
    }

    let (_, token) = state
        .sessions()
        .create(account.id, state.config.session_ttl)
        .await?;

    Ok(Json(LoginResponse { token, account }))
}

#[derive(Serialize)]
pub struct MeResponse {
    pub account: control_core::CloudAccount,
}

pub async fn me(operator: AuthedOperator) -> Json<MeResponse> {
    Json(MeResponse {
        account: operator.account,
    })
}
