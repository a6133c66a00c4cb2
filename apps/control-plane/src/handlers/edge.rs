//! The edge-facing surface (§4.1, §4.4, §4.5, §4.7): node self-registration
//! against a bootstrap token, the pull endpoint for pending commands, ack,
//! and heartbeat. Every endpoint but registration authenticates via
//! [`NodeAuth`]; registration's credential *is* the bootstrap token.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use control_core::{Command, CommandStatus, CoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{require_node_matches, NodeAuth};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodeRequest {
    pub store_id: Uuid,
    pub bootstrap_token: String,
    pub label: String,
    pub software_version: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodeResponse {
    pub node_id: Uuid,
    pub store_id: Uuid,
    pub node_key: String,
    pub node_token: String,
}

pub async fn register_node(
    State(state): State<AppState>,
    Json(body): Json<RegisterNodeRequest>,
) -> ApiResult<Json<RegisterNodeResponse>> {
    let metadata = body.metadata.unwrap_or(Value::Null);

    let (node, node_token) = state
        .nodes()
        .register_with_bootstrap_token(
            body.store_id,
            &body.bootstrap_token,
            &body.label,
            body.software_version.as_deref(),
            metadata,
        )
        .await?;

    Ok(Json(RegisterNodeResponse {
        node_id: node.id,
        store_id: node.store_id,
        node_key: node.node_key,
        node_token,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCommandsQuery {
    pub status: Option<String>,
    pub domain: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCommandsResponse {
    pub commands: Vec<Command>,
}

pub async fn pull_commands(
    State(state): State<AppState>,
    NodeAuth(node): NodeAuth,
    Path(node_id): Path<Uuid>,
    Query(query): Query<NodeCommandsQuery>,
) -> ApiResult<Json<NodeCommandsResponse>> {
    require_node_matches(&node, node_id)?;

    let statuses: Vec<CommandStatus> = match query.status.as_deref() {
        None => vec![CommandStatus::Pending],
        Some(s) => s
            .split(',')
            .map(|part| CommandStatus::from_str(part.trim()).map_err(Into::into))
            .collect::<Result<_, crate::error::ApiError>>()?,
    };

    let mut commands = state.commands().for_node(&node, &statuses).await?;

    if let Some(domain) = query.domain.as_deref() {
        let domain = domain.to_ascii_uppercase();
        commands.retain(|c| c.domain == domain);
    }

    if let Some(limit) = query.limit {
        commands.truncate(limit.max(0) as usize);
    }

    Ok(Json(NodeCommandsResponse { commands }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckCommandRequest {
    pub status: String,
    pub applied_revision: Option<i64>,
    pub error_code: Option<String>,
    pub error_detail: Option<String>,
    pub output: Option<Value>,
}

pub async fn ack_command(
    State(state): State<AppState>,
    NodeAuth(node): NodeAuth,
    Path(command_id): Path<Uuid>,
    Json(body): Json<AckCommandRequest>,
) -> ApiResult<Json<Command>> {
    let status = CommandStatus::from_str(&body.status)?;
    if status == CommandStatus::Pending {
        return Err(CoreError::validation("ack status must be ACKED or FAILED").into());
    }

    let command = state
        .commands()
        .ack(
            command_id,
            &node,
            status,
            body.applied_revision,
            body.error_code,
            body.error_detail,
            body.output,
        )
        .await?;

    Ok(Json(command))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub software_version: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub ok: bool,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    NodeAuth(node): NodeAuth,
    Path(node_id): Path<Uuid>,
    Json(body): Json<HeartbeatRequest>,
) -> ApiResult<Json<HeartbeatResponse>> {
    require_node_matches(&node, node_id)?;

    state
        .nodes()
        .heartbeat(node.id, body.software_version.as_deref(), body.metadata, chrono::Utc::now())
        .await?;

    Ok(Json(HeartbeatResponse { ok: true }))
}
