use crate::convert::{json_col, now_iso, uuid_col};
use crate::errors::{is_unique_violation, DbError};
use crate::TursoClient;
use control_core::{Command, CommandStatus, Revision};
use libsql::{params, Row};
use serde_json::Value;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

const REVISION_COLUMNS: &str = "id, store_id, domain, revision_number, payload, published_by, created_at";
const COMMAND_COLUMNS: &str = "id, store_id, node_id, revision_id, domain, command_type, payload, status, attempts, applied_revision, error_code, error_detail, issued_at, acknowledged_at, created_by";

/// Number of times `publish` retries after a unique-violation race on
/// `(store_id, domain, revision_number)` before giving up (§4.3, §5).
const PUBLISH_RETRY_ATTEMPTS: u32 = 5;

pub struct RevisionRepository {
    client: TursoClient,
}

impl RevisionRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    /// Publishes the next revision for `(store_id, domain)` and its
    /// companion PENDING command in one transaction (§4.3 steps 2-5).
    /// `domain` is assumed already normalized by the caller (§4.1 layering:
    /// validation lives in `control-core`, this layer trusts its input).
    #[instrument(skip(self, payload))]
    #[allow(clippy::too_many_arguments)]
    pub async fn publish(
        &self,
        store_id: Uuid,
        domain: &str,
        payload: Value,
        target_node_id: Option<Uuid>,
        command_type: Option<String>,
        created_by: Uuid,
    ) -> Result<(Revision, Command), DbError> {
        let mut attempt = 0;
        loop {
            match self
                .try_publish(store_id, domain, payload.clone(), target_node_id, command_type.clone(), created_by)
                .await
            {
                Ok(result) => return Ok(result),
                Err(DbError::UniqueViolation(_)) if attempt < PUBLISH_RETRY_ATTEMPTS => {
                    attempt += 1;
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn try_publish(
        &self,
        store_id: Uuid,
        domain: &str,
        payload: Value,
        target_node_id: Option<Uuid>,
        command_type: Option<String>,
        created_by: Uuid,
    ) -> Result<(Revision, Command), DbError> {
        let conn = self.client.connection()?;
        let tx = conn.transaction().await?;
        let now = now_iso();

        if let Some(node_id) = target_node_id {
            let mut rows = tx
                .query(
                    "SELECT store_id FROM nodes WHERE id = ?1",
                    params![node_id.to_string()],
                )
                .await?;
            match rows.next().await? {
                Some(row) => {
                    let node_store: String = row.get(0)?;
                    if node_store != store_id.to_string() {
                        return Err(DbError::InvalidReference(format!(
                            "node {node_id} does not belong to store {store_id}"
                        )));
                    }
                }
                None => {
                    return Err(DbError::InvalidReference(format!("node {node_id} not found")));
                }
            }
        }

        let mut rows = tx
            .query(
                "SELECT COALESCE(MAX(revision_number), 0) FROM revisions WHERE store_id = ?1 AND domain = ?2",
                params![store_id.to_string(), domain],
            )
            .await?;
        let current_max: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        drop(rows);
        let next_number = current_max + 1;

        let revision_id = Uuid::new_v4();
        let payload_str = serde_json::to_string(&payload)
            .map_err(|e| DbError::MappingError(format!("payload encode failure: {e}")))?;

        tx.execute(
            "INSERT INTO revisions (id, store_id, domain, revision_number, payload, published_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                revision_id.to_string(),
                store_id.to_string(),
                domain,
                next_number,
                payload_str.clone(),
                created_by.to_string(),
                now.clone()
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::UniqueViolation(format!("revision ({store_id}, {domain}, {next_number})"))
            } else {
                DbError::QueryError(e)
            }
        })?;

        let command_id = Uuid::new_v4();
        let resolved_command_type = command_type.unwrap_or_else(|| format!("{domain}_PATCH"));
        let command_payload_str = serde_json::to_string(&payload)
            .map_err(|e| DbError::MappingError(format!("payload encode failure: {e}")))?;

        tx.execute(
            "INSERT INTO commands (id, store_id, node_id, revision_id, domain, command_type, payload, status, attempts, applied_revision, error_code, error_detail, issued_at, acknowledged_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'PENDING', 0, NULL, NULL, NULL, ?8, NULL, ?9)",
            params![
                command_id.to_string(),
                store_id.to_string(),
                target_node_id.map(|n| n.to_string()),
                revision_id.to_string(),
                domain,
                resolved_command_type,
                command_payload_str,
                now.clone(),
                created_by.to_string()
            ],
        )
        .await?;

        tx.commit().await?;

        let revision = Revision {
            id: revision_id,
            store_id,
            domain: domain.to_string(),
            revision_number: next_number,
            payload,
            published_by: created_by,
            created_at: chrono::DateTime::parse_from_rfc3339(&now)
                .unwrap()
                .with_timezone(&chrono::Utc),
        };

        let command = self.get_command(command_id).await?;
        Ok((revision, command))
    }

    async fn get_command(&self, id: Uuid) -> Result<Command, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COMMAND_COLUMNS} FROM commands WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_command_row(&row),
            None => Err(DbError::NotFound(format!("command {id}"))),
        }
    }

    /// Latest revision for a single domain, or `None` if none has been
    /// published yet.
    pub async fn latest_for_domain(&self, store_id: Uuid, domain: &str) -> Result<Option<Revision>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {REVISION_COLUMNS} FROM revisions WHERE store_id = ?1 AND domain = ?2
             ORDER BY revision_number DESC LIMIT 1"
        );
        let mut rows = conn.query(&sql, params![store_id.to_string(), domain]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_revision_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Latest revision per domain across the whole store.
    pub async fn latest_by_domain(&self, store_id: Uuid) -> Result<HashMap<String, Revision>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {REVISION_COLUMNS} FROM revisions r
             WHERE store_id = ?1 AND revision_number = (
                 SELECT MAX(revision_number) FROM revisions WHERE store_id = r.store_id AND domain = r.domain
             )"
        );
        let mut rows = conn.query(&sql, params![store_id.to_string()]).await?;
        let mut out = HashMap::new();
        while let Some(row) = rows.next().await? {
            let revision = map_revision_row(&row)?;
            out.insert(revision.domain.clone(), revision);
        }
        Ok(out)
    }
}

fn map_revision_row(row: &Row) -> Result<Revision, DbError> {
    Ok(Revision {
        id: uuid_col(row, 0)?,
        store_id: uuid_col(row, 1)?,
        domain: row.get(2)?,
        revision_number: row.get(3)?,
        payload: json_col(row, 4)?,
        published_by: uuid_col(row, 5)?,
        created_at: crate::convert::datetime_col(row, 6)?,
    })
}

fn map_command_row(row: &Row) -> Result<Command, DbError> {
    crate::repositories::commands::map_row(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_client, seed_store};
    use serde_json::json;

    #[tokio::test]
    async fn first_publish_starts_at_one() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-1").await;
        let repo = RevisionRepository::new(client);

        let (revision, command) = repo
            .publish(store.id, "SETTINGS", json!({"a": 1}), None, None, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(revision.revision_number, 1);
        assert_eq!(command.status, CommandStatus::Pending);
        assert_eq!(command.command_type, "SETTINGS_PATCH");
        assert_eq!(command.revision_id, Some(revision.id));
    }

    #[tokio::test]
    async fn successive_publishes_are_dense_and_increasing() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-2").await;
        let repo = RevisionRepository::new(client);
        let creator = Uuid::new_v4();

        for expected in 1..=3 {
            let (revision, _) = repo
                .publish(store.id, "MENU", json!({"n": expected}), None, None, creator)
                .await
                .unwrap();
            assert_eq!(revision.revision_number, expected);
        }
    }

    #[tokio::test]
    async fn domains_have_independent_streams() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-3").await;
        let repo = RevisionRepository::new(client);
        let creator = Uuid::new_v4();

        repo.publish(store.id, "SETTINGS", json!({}), None, None, creator).await.unwrap();
        let (menu_rev, _) = repo.publish(store.id, "MENU", json!({}), None, None, creator).await.unwrap();
        assert_eq!(menu_rev.revision_number, 1);

        let latest = repo.latest_by_domain(store.id).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["SETTINGS"].revision_number, 1);
        assert_eq!(latest["MENU"].revision_number, 1);
    }

    #[tokio::test]
    async fn target_node_must_belong_to_store() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-4").await;
        let repo = RevisionRepository::new(client);

        let result = repo
            .publish(store.id, "SETTINGS", json!({}), Some(Uuid::new_v4()), None, Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(DbError::InvalidReference(_))));
    }
}
