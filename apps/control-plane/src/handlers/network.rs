//! Fleet-wide node health view and the remote-action dispatcher (§4.7,
//! §6 "network & remote actions"). Health is never stored; it's derived
//! fresh from `lastSeenAt` on every read (§3, §8 property 6).

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use control_core::actions::RemoteAction;
use control_core::entities::REMOTE_ACTION_DOMAIN;
use control_core::{health, Command, CommandStatus, CoreError, Node, NodeHealth, Store, StoreStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthedOperator;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkNodeView {
    pub id: Uuid,
    pub label: String,
    pub node_key: String,
    pub status: NodeHealth,
    pub raw_status: String,
    pub heartbeat_age_seconds: i64,
    pub software_version: Option<String>,
    pub last_seen_at: chrono::DateTime<Utc>,
}

fn node_view(node: &Node, now: chrono::DateTime<Utc>) -> NetworkNodeView {
    NetworkNodeView {
        id: node.id,
        label: node.label.clone(),
        node_key: node.node_key.clone(),
        status: health::classify(&node.raw_status, node.last_seen_at, now),
        raw_status: node.raw_status.clone(),
        heartbeat_age_seconds: health::heartbeat_age_seconds(node.last_seen_at, now),
        software_version: node.software_version.clone(),
        last_seen_at: node.last_seen_at,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStoreView {
    pub store: Store,
    pub nodes: Vec<NetworkNodeView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub total_stores: usize,
    pub total_nodes: usize,
    pub online: usize,
    pub stale: usize,
    pub offline: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResponse {
    pub summary: NetworkSummary,
    pub stores: Vec<NetworkStoreView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkQuery {
    pub reseller_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub store_status: Option<String>,
    pub node_status: Option<String>,
    #[serde(default)]
    pub include_unlinked: bool,
}

pub async fn network_summary(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Query(query): Query<NetworkQuery>,
) -> ApiResult<Json<NetworkResponse>> {
    let now = Utc::now();
    let node_status_filter = query
        .node_status
        .as_deref()
        .map(parse_node_health)
        .transpose()?;
    let store_status_filter = query
        .store_status
        .as_deref()
        .map(parse_store_status)
        .transpose()?;

    let stores = state.stores().list(&operator.scope, query.tenant_id).await?;

    let mut summary = NetworkSummary {
        total_stores: 0,
        total_nodes: 0,
        online: 0,
        stale: 0,
        offline: 0,
    };
    let mut views = Vec::new();

    for store in stores {
        if let Some(status) = store_status_filter {
            if store.status != status {
                continue;
            }
        }

        if let Some(reseller_id) = query.reseller_id {
            let tenant = state.tenants().get(store.tenant_id).await?;
            if tenant.reseller_id != Some(reseller_id) {
                continue;
            }
        }

        let mut nodes: Vec<NetworkNodeView> = state
            .nodes()
            .list_for_store(store.id)
            .await?
            .iter()
            .map(|n| node_view(n, now))
            .collect();

        if let Some(wanted) = node_status_filter {
            nodes.retain(|n| n.status == wanted);
        }

        if nodes.is_empty() && !query.include_unlinked {
            continue;
        }

        summary.total_stores += 1;
        summary.total_nodes += nodes.len();
        for node in &nodes {
            match node.status {
                NodeHealth::Online => summary.online += 1,
                NodeHealth::Stale => summary.stale += 1,
                NodeHealth::Offline => summary.offline += 1,
            }
        }

        views.push(NetworkStoreView { store, nodes });
    }

    Ok(Json(NetworkResponse { summary, stores: views }))
}

fn parse_node_health(raw: &str) -> Result<NodeHealth, crate::error::ApiError> {
    match raw.to_ascii_uppercase().as_str() {
        "ONLINE" => Ok(NodeHealth::Online),
        "STALE" => Ok(NodeHealth::Stale),
        "OFFLINE" => Ok(NodeHealth::Offline),
        other => Err(CoreError::validation(format!("unknown node status '{other}'")).into()),
    }
}

fn parse_store_status(raw: &str) -> Result<StoreStatus, crate::error::ApiError> {
    match raw.to_ascii_uppercase().as_str() {
        "ACTIVE" => Ok(StoreStatus::Active),
        "SUSPENDED" => Ok(StoreStatus::Suspended),
        other => Err(CoreError::validation(format!("unknown store status '{other}'")).into()),
    }
}

async fn require_store_access(state: &AppState, operator: &AuthedOperator, store_id: Uuid) -> ApiResult<()> {
    let store = state.stores().get(store_id).await?;
    let tenant = state.tenants().get(store.tenant_id).await?;
    if !operator.scope.can_access_tenant(tenant.id, tenant.reseller_id) {
        return Err(CoreError::forbidden("store is out of scope").into());
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateTokenResponse {
    pub node: Node,
    pub node_token: String,
}

pub async fn rotate_token(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(node_id): Path<Uuid>,
) -> ApiResult<Json<RotateTokenResponse>> {
    let node = state.nodes().get(node_id).await?;
    require_store_access(&state, &operator, node.store_id).await?;

    let node_token = state
        .nodes()
        .rotate_token(node_id, operator.account.id, Utc::now())
        .await?;
    let node = state.nodes().get(node_id).await?;

    Ok(Json(RotateTokenResponse { node, node_token }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchActionRequest {
    pub store_id: Uuid,
    pub node_id: Option<Uuid>,
    #[serde(default)]
    pub target_all_nodes: bool,
    pub action: String,
    pub note: Option<String>,
    pub parameters: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchActionResponse {
    pub action: String,
    pub command: Command,
}

pub async fn dispatch_action(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Json(body): Json<DispatchActionRequest>,
) -> ApiResult<Json<DispatchActionResponse>> {
    require_store_access(&state, &operator, body.store_id).await?;

    let action = RemoteAction::from_str(&body.action)?;
    let node_count = state.nodes().count_for_store(body.store_id).await?;
    if node_count == 0 {
        return Err(CoreError::validation("store has no registered nodes").into());
    }

    let target_node_id = match body.node_id {
        Some(node_id) => {
            let node = state.nodes().get(node_id).await?;
            if node.store_id != body.store_id {
                return Err(CoreError::validation("node does not belong to store").into());
            }
            Some(node_id)
        }
        None if body.target_all_nodes => None,
        None if node_count > 1 => {
            return Err(CoreError::validation("specify nodeId or targetAllNodes=true").into())
        }
        None => None,
    };

    let payload = json!({
        "action": action.to_string(),
        "parameters": body.parameters,
        "note": body.note,
        "issuedAt": Utc::now().to_rfc3339(),
        "requestedBy": operator.account.id,
    });

    let command = state
        .commands()
        .create_pending(
            body.store_id,
            target_node_id,
            REMOTE_ACTION_DOMAIN,
            action.command_type(),
            payload,
            operator.account.id,
        )
        .await?;

    Ok(Json(DispatchActionResponse {
        action: action.to_string(),
        command,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActionsQuery {
    pub store_id: Uuid,
    pub status: Option<String>,
    pub node_id: Option<Uuid>,
    pub limit: Option<i64>,
}

pub async fn list_actions(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Query(query): Query<ListActionsQuery>,
) -> ApiResult<Json<Vec<Command>>> {
    require_store_access(&state, &operator, query.store_id).await?;

    let statuses: Vec<CommandStatus> = match query.status.as_deref() {
        None => vec![CommandStatus::Pending, CommandStatus::Failed, CommandStatus::Acked],
        Some(s) => s
            .split(',')
            .map(|part| CommandStatus::from_str(part.trim()).map_err(Into::into))
            .collect::<Result<_, crate::error::ApiError>>()?,
    };

    let commands = state
        .commands()
        .for_store(
            query.store_id,
            &statuses,
            Some(REMOTE_ACTION_DOMAIN),
            query.node_id,
            query.limit.unwrap_or(100),
        )
        .await?;

    Ok(Json(commands))
}

async fn load_remote_action_command(state: &AppState, operator: &AuthedOperator, command_id: Uuid) -> ApiResult<Command> {
    let command = state.commands().get(command_id).await?;
    require_store_access(state, operator, command.store_id).await?;
    if command.domain != REMOTE_ACTION_DOMAIN {
        return Err(CoreError::validation(format!("command {command_id} is not a REMOTE_ACTION")).into());
    }
    Ok(command)
}

pub async fn retry_action(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(command_id): Path<Uuid>,
) -> ApiResult<Json<Command>> {
    load_remote_action_command(&state, &operator, command_id).await?;
    Ok(Json(state.commands().retry(command_id).await?))
}

pub async fn cancel_action(
    State(state): State<AppState>,
    operator: AuthedOperator,
    Path(command_id): Path<Uuid>,
) -> ApiResult<Json<Command>> {
    load_remote_action_command(&state, &operator, command_id).await?;
    Ok(Json(state.commands().cancel(command_id).await?))
}
