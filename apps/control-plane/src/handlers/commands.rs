use axum::extract::{Path, Query, State};
use axum::Json;
use control_core::{Command, CommandLog, CommandStatus, CoreError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
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

/// Checks that the operator can reach the store owning `command`, returning
/// the command for reuse — every command-by-id endpoint needs this lookup
/// before it can authorize anything further.
async fn load_authorized_command(state: &AppState, operator: &AuthedOperator, command_id: Uuid) -> ApiResult<Command> {
    let command = state.commands().get(command_id).await?;
    require_store_access(state, operator, command.store_id).await?;
    Ok(command)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommandsQuery {
    pub status: Option<String>,
    pub domain: Option<String>,
    pub node_id: Option<Uuid>,
    pub limit: Option<i64>,
}

fn parse_status_filter(raw: Option<&str>) -> ApiResult<Vec<CommandStatus>> {
    match raw {
        None => Ok(vec![CommandStatus::Pending, CommandStatus::Failed, CommandStatus::Acked]),
        Some(s) => s
            .split(',')
            .map(|part| CommandStatus::from_str(part.trim()).map_err(Into::into))
            .collect(),
    }
}

pub async fn list_for_store(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(store_id): Path<Uuid>,
    Query(query): Query<ListCommandsQuery>,
) -> ApiResult<Json<Vec<Command>>> {
    require_store_access(&state, &operator, store_id).await?;

    let statuses = parse_status_filter(query.status.as_deref())?;
    let domain = query.domain.as_deref().map(|d| d.to_ascii_uppercase());

    let commands = state
        .commands()
        .for_store(store_id, &statuses, domain.as_deref(), query.node_id, query.limit.unwrap_or(100))
        .await?;

    Ok(Json(commands))
}

/// General-purpose retry (§4.4, §6): applies to a command of any domain,
/// unlike the domain-restricted retry exposed under remote-action network
/// endpoints (§4.7).
pub async fn retry(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(command_id): Path<Uuid>,
) -> ApiResult<Json<Command>> {
    load_authorized_command(&state, &operator, command_id).await?;
    Ok(Json(state.commands().retry(command_id).await?))
}

#[derive(Deserialize)]
pub struct ListLogsQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLogsResponse {
    pub command: Command,
    pub logs: Vec<CommandLog>,
}

pub async fn logs(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(command_id): Path<Uuid>,
    Query(query): Query<ListLogsQuery>,
) -> ApiResult<Json<CommandLogsResponse>> {
    let command = load_authorized_command(&state, &operator, command_id).await?;
    let logs = state.commands().logs_for_command(command_id, query.limit.unwrap_or(100)).await?;
    Ok(Json(CommandLogsResponse { command, logs }))
}
