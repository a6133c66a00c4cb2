use crate::convert::{datetime_col, json_col, now_iso, opt_datetime_col, opt_json_col, opt_uuid_col, uuid_col};
use crate::errors::DbError;
use crate::TursoClient;
use control_core::{Command, CommandLog, CommandStatus, Node};
use libsql::{params, Row};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str = "id, store_id, node_id, revision_id, domain, command_type, payload, status, attempts, applied_revision, error_code, error_detail, issued_at, acknowledged_at, created_by";
const LOG_COLUMNS: &str = "id, command_id, store_id, node_id, status, error_code, error_detail, output, created_at";

pub struct CommandRepository {
    client: TursoClient,
}

impl CommandRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: Uuid) -> Result<Command, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM commands WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound(format!("command {id}"))),
        }
    }

    /// Writes a PENDING command directly, without a companion revision —
    /// the shape the Remote Action Dispatcher uses (§4.7). Revision-backed
    /// commands go through `RevisionRepository::publish` instead, which
    /// needs the extra atomicity of allocating a revision number.
    #[instrument(skip(self, payload))]
    pub async fn create_pending(
        &self,
        store_id: Uuid,
        node_id: Option<Uuid>,
        domain: &str,
        command_type: &str,
        payload: Value,
        created_by: Uuid,
    ) -> Result<Command, DbError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        let now = now_iso();
        let payload_str = serde_json::to_string(&payload)
            .map_err(|e| DbError::MappingError(format!("payload encode failure: {e}")))?;

        conn.execute(
            "INSERT INTO commands (id, store_id, node_id, revision_id, domain, command_type, payload, status, attempts, applied_revision, error_code, error_detail, issued_at, acknowledged_at, created_by)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, 'PENDING', 0, NULL, NULL, NULL, ?7, NULL, ?8)",
            params![
                id.to_string(),
                store_id.to_string(),
                node_id.map(|n| n.to_string()),
                domain,
                command_type,
                payload_str,
                now,
                created_by.to_string()
            ],
        )
        .await?;

        self.get(id).await
    }

    /// Pull view for edge nodes (§4.4): broadcast commands (`node_id IS
    /// NULL`) plus commands targeted at this node, oldest first.
    pub async fn for_node(&self, node: &Node, statuses: &[CommandStatus]) -> Result<Vec<Command>, DbError> {
        let conn = self.client.connection()?;
        let status_list = status_in_clause(statuses, 2);
        let sql = format!(
            "SELECT {COLUMNS} FROM commands
             WHERE store_id = ?1 AND status IN ({status_list}) AND (node_id IS NULL OR node_id = ?{})
             ORDER BY issued_at ASC",
            statuses.len() + 2
        );
        let mut bind: Vec<String> = vec![node.store_id.to_string()];
        bind.extend(statuses.iter().map(|s| s.to_string()));
        bind.push(node.id.to_string());

        let mut rows = conn.query(&sql, libsql::params_from_iter(bind)).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    /// Operator-facing read (§4.4): newest first, optionally filtered by
    /// domain/node, row-limited.
    pub async fn for_store(
        &self,
        store_id: Uuid,
        statuses: &[CommandStatus],
        domain: Option<&str>,
        node_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Command>, DbError> {
        let conn = self.client.connection()?;
        let mut bind: Vec<String> = vec![store_id.to_string()];
        let status_list = status_in_clause(statuses, 2);
        bind.extend(statuses.iter().map(|s| s.to_string()));

        let mut clauses = vec![format!("store_id = ?1"), format!("status IN ({status_list})")];

        if let Some(domain) = domain {
            clauses.push(format!("domain = ?{}", bind.len() + 1));
            bind.push(domain.to_string());
        }
        if let Some(node_id) = node_id {
            clauses.push(format!("node_id = ?{}", bind.len() + 1));
            bind.push(node_id.to_string());
        }

        let limit = limit.clamp(1, 200);
        let sql = format!(
            "SELECT {COLUMNS} FROM commands WHERE {} ORDER BY issued_at DESC LIMIT {limit}",
            clauses.join(" AND ")
        );

        let mut rows = conn.query(&sql, libsql::params_from_iter(bind)).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    /// Records a node's self-reported outcome (§4.4 PENDING -> ACKED/FAILED).
    /// Guards: the acking node's store must match the command's store, and
    /// if the command is node-targeted, the acking node must be the target
    /// (§4.1, §7: otherwise 403). `attempts` increments unconditionally —
    /// the core does not deduplicate concurrent acks (§4.4, §8 property 7).
    #[instrument(skip(self, output))]
    #[allow(clippy::too_many_arguments)]
    pub async fn ack(
        &self,
        command_id: Uuid,
        node: &Node,
        status: CommandStatus,
        applied_revision: Option<i64>,
        error_code: Option<String>,
        error_detail: Option<String>,
        output: Option<Value>,
    ) -> Result<Command, DbError> {
        let conn = self.client.connection()?;
        let tx = conn.transaction().await?;
        let now = now_iso();

        let (store_id, target_node_id, attempts): (String, Option<String>, i64) = {
            let mut rows = tx
                .query(
                    "SELECT store_id, node_id, attempts FROM commands WHERE id = ?1",
                    params![command_id.to_string()],
                )
                .await?;
            match rows.next().await? {
                Some(row) => (row.get(0)?, row.get(1)?, row.get(2)?),
                None => return Err(DbError::NotFound(format!("command {command_id}"))),
            }
        };

        if store_id != node.store_id.to_string() {
            return Err(DbError::Forbidden(format!(
                "node {} is not in store {store_id}",
                node.id
            )));
        }
        if let Some(target) = &target_node_id {
            if *target != node.id.to_string() {
                return Err(DbError::Forbidden(format!(
                    "command {command_id} is targeted at a different node"
                )));
            }
        }

        let output_str = match &output {
            Some(v) => Some(
                serde_json::to_string(v).map_err(|e| DbError::MappingError(format!("output encode failure: {e}")))?,
            ),
            None => None,
        };

        tx.execute(
            "UPDATE commands SET status = ?2, attempts = ?3, applied_revision = ?4, error_code = ?5, error_detail = ?6, acknowledged_at = ?7 WHERE id = ?1",
            params![
                command_id.to_string(),
                status.to_string(),
                attempts + 1,
                applied_revision,
                error_code.clone(),
                error_detail.clone(),
                now.clone()
            ],
        )
        .await?;

        insert_log(
            &tx,
            command_id,
            Uuid::parse_str(&store_id).unwrap(),
            Some(node.id),
            &status.to_string(),
            error_code.as_deref(),
            error_detail.as_deref(),
            output_str.as_deref(),
            &now,
        )
        .await?;

        tx.commit().await?;
        self.get(command_id).await
    }

    /// Operator retry (§4.4 FAILED/ACKED -> PENDING). Only legal from a
    /// terminal status; from PENDING this is a conflict (nothing to retry).
    #[instrument(skip(self))]
    pub async fn retry(&self, command_id: Uuid) -> Result<Command, DbError> {
        let conn = self.client.connection()?;
        let tx = conn.transaction().await?;
        let now = now_iso();

        let (store_id, current_status): (String, String) = {
            let mut rows = tx
                .query(
                    "SELECT store_id, status FROM commands WHERE id = ?1",
                    params![command_id.to_string()],
                )
                .await?;
            match rows.next().await? {
                Some(row) => (row.get(0)?, row.get(1)?),
                None => return Err(DbError::NotFound(format!("command {command_id}"))),
            }
        };

        if current_status == CommandStatus::Pending.to_string() {
            return Err(DbError::InvalidState);
        }

        tx.execute(
            "UPDATE commands SET status = 'PENDING', error_code = NULL, error_detail = NULL, acknowledged_at = NULL WHERE id = ?1",
            params![command_id.to_string()],
        )
        .await?;

        insert_log(
            &tx,
            command_id,
            Uuid::parse_str(&store_id).unwrap(),
            None,
            control_core::actions::LOG_STATUS_RETRY_QUEUED,
            None,
            None,
            None,
            &now,
        )
        .await?;

        tx.commit().await?;
        self.get(command_id).await
    }

    /// Operator cancel (§4.4, §4.7): only legal from PENDING, and only for
    /// `domain = REMOTE_ACTION` commands — callers enforce the domain
    /// restriction before calling this (§8 S3).
    #[instrument(skip(self))]
    pub async fn cancel(&self, command_id: Uuid) -> Result<Command, DbError> {
        let conn = self.client.connection()?;
        let tx = conn.transaction().await?;
        let now = now_iso();

        let (store_id, current_status): (String, String) = {
            let mut rows = tx
                .query(
                    "SELECT store_id, status FROM commands WHERE id = ?1",
                    params![command_id.to_string()],
                )
                .await?;
            match rows.next().await? {
                Some(row) => (row.get(0)?, row.get(1)?),
                None => return Err(DbError::NotFound(format!("command {command_id}"))),
            }
        };

        if current_status != CommandStatus::Pending.to_string() {
            return Err(DbError::InvalidState);
        }

        tx.execute(
            "UPDATE commands SET status = 'FAILED', error_code = ?2, acknowledged_at = ?3 WHERE id = ?1",
            params![
                command_id.to_string(),
                control_core::actions::CANCELLED_BY_CLOUD,
                now.clone()
            ],
        )
        .await?;

        insert_log(
            &tx,
            command_id,
            Uuid::parse_str(&store_id).unwrap(),
            None,
            control_core::actions::LOG_STATUS_CANCELLED,
            Some(control_core::actions::CANCELLED_BY_CLOUD),
            None,
            None,
            &now,
        )
        .await?;

        tx.commit().await?;
        self.get(command_id).await
    }

    pub async fn logs_for_command(&self, command_id: Uuid, limit: i64) -> Result<Vec<CommandLog>, DbError> {
        let conn = self.client.connection()?;
        let limit = limit.clamp(1, 500);
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM command_logs WHERE command_id = ?1 ORDER BY created_at DESC LIMIT {limit}"
        );
        let mut rows = conn.query(&sql, params![command_id.to_string()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_log_row(&row)?);
        }
        Ok(out)
    }
}

fn status_in_clause(statuses: &[CommandStatus], start_index: usize) -> String {
    (0..statuses.len())
        .map(|i| format!("?{}", start_index + i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[allow(clippy::too_many_arguments)]
async fn insert_log(
    tx: &libsql::Transaction,
    command_id: Uuid,
    store_id: Uuid,
    node_id: Option<Uuid>,
    status: &str,
    error_code: Option<&str>,
    error_detail: Option<&str>,
    output: Option<&str>,
    created_at: &str,
) -> Result<(), DbError> {
    tx.execute(
        "INSERT INTO command_logs (id, command_id, store_id, node_id, status, error_code, error_detail, output, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            Uuid::new_v4().to_string(),
            command_id.to_string(),
            store_id.to_string(),
            node_id.map(|n| n.to_string()),
            status,
            error_code,
            error_detail,
            output,
            created_at
        ],
    )
    .await?;
    Ok(())
}

pub(crate) fn map_row(row: &Row) -> Result<Command, DbError> {
    let status_raw: String = row.get(7)?;
    Ok(Command {
        id: uuid_col(row, 0)?,
        store_id: uuid_col(row, 1)?,
        node_id: opt_uuid_col(row, 2)?,
        revision_id: opt_uuid_col(row, 3)?,
        domain: row.get(4)?,
        command_type: row.get(5)?,
        payload: json_col(row, 6)?,
        status: status_raw
            .parse()
            .map_err(|_| DbError::MappingError(format!("unknown command status '{status_raw}'")))?,
        attempts: row.get(8)?,
        applied_revision: row.get(9)?,
        error_code: row.get(10)?,
        error_detail: row.get(11)?,
        issued_at: datetime_col(row, 12)?,
        acknowledged_at: opt_datetime_col(row, 13)?,
        created_by: opt_uuid_col(row, 14)?,
    })
}

fn map_log_row(row: &Row) -> Result<CommandLog, DbError> {
    Ok(CommandLog {
        id: uuid_col(row, 0)?,
        command_id: uuid_col(row, 1)?,
        store_id: uuid_col(row, 2)?,
        node_id: opt_uuid_col(row, 3)?,
        status: row.get(4)?,
        error_code: row.get(5)?,
        error_detail: row.get(6)?,
        output: opt_json_col(row, 7)?,
        created_at: datetime_col(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{NodeRepository, RevisionRepository};
    use crate::test_support::{memory_client, seed_store};
    use serde_json::json;

    async fn seed_node(client: &TursoClient, store_id: Uuid) -> Node {
        let bootstrap = crate::repositories::BootstrapTokenRepository::new(client.clone());
        let token = "plaintext-bootstrap-token";
        bootstrap
            .create(store_id, "default", &control_core::secret::hash(token), chrono::Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();

        let nodes = NodeRepository::new(client.clone());
        let (node, _token) = nodes
            .register_with_bootstrap_token(store_id, token, "n-1", None, json!({}))
            .await
            .unwrap();
        node
    }

    #[tokio::test]
    async fn ack_transitions_pending_to_acked_and_logs() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-5").await;
        let node = seed_node(&client, store.id).await;

        let revisions = RevisionRepository::new(client.clone());
        let (_rev, command) = revisions
            .publish(store.id, "SETTINGS", json!({}), Some(node.id), None, Uuid::new_v4())
            .await
            .unwrap();

        let commands = CommandRepository::new(client.clone());
        let acked = commands
            .ack(command.id, &node, CommandStatus::Acked, Some(1), None, None, None)
            .await
            .unwrap();

        assert_eq!(acked.status, CommandStatus::Acked);
        assert_eq!(acked.attempts, 1);

        let logs = commands.logs_for_command(command.id, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "ACKED");
    }

    #[tokio::test]
    async fn ack_targeting_wrong_node_is_forbidden() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-6").await;
        let node = seed_node(&client, store.id).await;

        let revisions = RevisionRepository::new(client.clone());
        let (_rev, command) = revisions
            .publish(store.id, "SETTINGS", json!({}), Some(node.id), None, Uuid::new_v4())
            .await
            .unwrap();

        let other_node = seed_node(&client, store.id).await;
        let commands = CommandRepository::new(client.clone());
        let result = commands
            .ack(command.id, &other_node, CommandStatus::Acked, None, None, None, None)
            .await;

        assert!(matches!(result, Err(DbError::Forbidden(_))));
    }

    #[tokio::test]
    async fn retry_moves_failed_back_to_pending_and_clears_error() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-7").await;
        let node = seed_node(&client, store.id).await;

        let revisions = RevisionRepository::new(client.clone());
        let (_rev, command) = revisions
            .publish(store.id, "SETTINGS", json!({}), Some(node.id), None, Uuid::new_v4())
            .await
            .unwrap();

        let commands = CommandRepository::new(client.clone());
        commands
            .ack(command.id, &node, CommandStatus::Failed, None, Some("SMOKE_FAIL".into()), None, None)
            .await
            .unwrap();

        let retried = commands.retry(command.id).await.unwrap();
        assert_eq!(retried.status, CommandStatus::Pending);
        assert_eq!(retried.error_code, None);

        let acked = commands
            .ack(command.id, &node, CommandStatus::Acked, Some(1), None, None, None)
            .await
            .unwrap();
        assert_eq!(acked.status, CommandStatus::Acked);
        assert_eq!(acked.attempts, 2);
    }

    #[tokio::test]
    async fn cancel_only_applies_from_pending() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-8").await;
        let commands = CommandRepository::new(client.clone());

        let command = commands
            .create_pending(store.id, None, "REMOTE_ACTION", "REMOTE_ACTION_SYNC_PULL", json!({}), Uuid::new_v4())
            .await
            .unwrap();

        let cancelled = commands.cancel(command.id).await.unwrap();
        assert_eq!(cancelled.status, CommandStatus::Failed);
        assert_eq!(cancelled.error_code.as_deref(), Some("CANCELLED_BY_CLOUD"));

        let second = commands.cancel(command.id).await;
        assert!(matches!(second, Err(DbError::InvalidState)));
    }

    #[tokio::test]
    async fn broadcast_command_is_visible_to_every_node_until_acked() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-9").await;
        let node_a = seed_node(&client, store.id).await;
        let node_b = seed_node(&client, store.id).await;

        let commands = CommandRepository::new(client.clone());
        let command = commands
            .create_pending(store.id, None, "SETTINGS", "SETTINGS_PATCH", json!({}), Uuid::new_v4())
            .await
            .unwrap();

        let pending = vec![CommandStatus::Pending];
        assert_eq!(commands.for_node(&node_a, &pending).await.unwrap().len(), 1);
        assert_eq!(commands.for_node(&node_b, &pending).await.unwrap().len(), 1);

        commands
            .ack(command.id, &node_a, CommandStatus::Acked, None, None, None, None)
            .await
            .unwrap();

        assert_eq!(commands.for_node(&node_b, &pending).await.unwrap().len(), 0);
    }
}
