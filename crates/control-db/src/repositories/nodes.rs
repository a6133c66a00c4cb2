use crate::convert::{datetime_col, json_col, uuid_col};
use crate::errors::{is_unique_violation, DbError};
use crate::TursoClient;
use chrono::{DateTime, Utc};
use control_core::Node;
use libsql::{params, Row};
use rand::{distributions::Alphanumeric, Rng};
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str =
    "id, store_id, label, node_key, token_hash, raw_status, software_version, metadata, last_seen_at, created_at";

pub struct NodeRepository {
    client: TursoClient,
}

/// Generates an opaque bearer credential: a type prefix plus at least 30
/// characters of alphanumeric entropy, per §4.5 step 3.
pub fn generate_node_token() -> String {
    let entropy: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();
    format!("node_{entropy}")
}

/// Generates a node key of the shape `EDGE-XXXXXXXX` (8 uppercase chars).
pub fn generate_node_key() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("EDGE-{suffix}")
}

impl NodeRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: Uuid) -> Result<Node, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM nodes WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound(format!("node {id}"))),
        }
    }

    pub async fn get_by_node_key(&self, node_key: &str) -> Result<Option<Node>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM nodes WHERE node_key = ?1");
        let mut rows = conn.query(&sql, params![node_key]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_for_store(&self, store_id: Uuid) -> Result<Vec<Node>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM nodes WHERE store_id = ?1 ORDER BY created_at ASC");
        let mut rows = conn.query(&sql, params![store_id.to_string()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    pub async fn count_for_store(&self, store_id: Uuid) -> Result<i64, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM nodes WHERE store_id = ?1",
                params![store_id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Ok(0),
        }
    }

    /// Consumes a bootstrap token and mints a new node in one transaction
    /// (§4.5 step 1-4). Returns the node together with the one-time
    /// plaintext token.
    #[instrument(skip(self, bootstrap_token, metadata))]
    pub async fn register_with_bootstrap_token(
        &self,
        store_id: Uuid,
        bootstrap_token: &str,
        label: &str,
        software_version: Option<&str>,
        metadata: serde_json::Value,
    ) -> Result<(Node, String), DbError> {
        let conn = self.client.connection()?;
        let tx = conn.transaction().await?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let token_hash = control_core::secret::hash(bootstrap_token);

        let mut rows = tx
            .query(
                "SELECT id FROM bootstrap_tokens
                 WHERE store_id = ?1 AND token_hash = ?2 AND used_at IS NULL AND expires_at > ?3
                 ORDER BY created_at DESC LIMIT 1",
                params![store_id.to_string(), token_hash.clone(), now_str.clone()],
            )
            .await?;
        let bootstrap_id: String = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => return Err(DbError::NotFound("bootstrap token".into())),
        };
        drop(rows);

        tx.execute(
            "UPDATE bootstrap_tokens SET used_at = ?2 WHERE id = ?1",
            params![bootstrap_id, now_str.clone()],
        )
        .await?;

        let node_id = Uuid::new_v4();
        let node_token = generate_node_token();
        let node_key = generate_node_key();
        let node_token_hash = control_core::secret::hash(&node_token);
        let metadata_str = serde_json::to_string(&metadata)
            .map_err(|e| DbError::MappingError(format!("metadata encode failure: {e}")))?;

        tx.execute(
            "INSERT INTO nodes (id, store_id, label, node_key, token_hash, raw_status, software_version, metadata, last_seen_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'ONLINE', ?6, ?7, ?8, ?9)",
            params![
                node_id.to_string(),
                store_id.to_string(),
                label,
                node_key.clone(),
                node_token_hash,
                software_version,
                metadata_str,
                now_str.clone(),
                now_str
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::UniqueViolation(format!("node key '{node_key}'"))
            } else {
                DbError::QueryError(e)
            }
        })?;

        tx.commit().await?;

        let node = self.get(node_id).await?;
        Ok((node, node_token))
    }

    #[instrument(skip(self, metadata))]
    pub async fn heartbeat(
        &self,
        node_id: Uuid,
        software_version: Option<&str>,
        metadata: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let now_str = now.to_rfc3339();

        match (software_version, metadata) {
            (Some(version), Some(meta)) => {
                let meta_str = serde_json::to_string(&meta)
                    .map_err(|e| DbError::MappingError(format!("metadata encode failure: {e}")))?;
                conn.execute(
                    "UPDATE nodes SET last_seen_at = ?2, raw_status = 'ONLINE', software_version = ?3, metadata = ?4 WHERE id = ?1",
                    params![node_id.to_string(), now_str, version, meta_str],
                )
                .await?;
            }
            (Some(version), None) => {
                conn.execute(
                    "UPDATE nodes SET last_seen_at = ?2, raw_status = 'ONLINE', software_version = ?3 WHERE id = ?1",
                    params![node_id.to_string(), now_str, version],
                )
                .await?;
            }
            (None, Some(meta)) => {
                let meta_str = serde_json::to_string(&meta)
                    .map_err(|e| DbError::MappingError(format!("metadata encode failure: {e}")))?;
                conn.execute(
                    "UPDATE nodes SET last_seen_at = ?2, raw_status = 'ONLINE', metadata = ?3 WHERE id = ?1",
                    params![node_id.to_string(), now_str, meta_str],
                )
                .await?;
            }
            (None, None) => {
                conn.execute(
                    "UPDATE nodes SET last_seen_at = ?2, raw_status = 'ONLINE' WHERE id = ?1",
                    params![node_id.to_string(), now_str],
                )
                .await?;
            }
        }

        Ok(())
    }

    /// Mints a new token and replaces the stored hash; the previous token
    /// is unusable the instant this commits (§8 property 4). Records the
    /// rotating account and the rotation time in `metadata` under
    /// `lastTokenRotation` so a rotation is auditable after the fact (§4.5).
    #[instrument(skip(self))]
    pub async fn rotate_token(&self, node_id: Uuid, rotated_by: Uuid, now: DateTime<Utc>) -> Result<String, DbError> {
        let conn = self.client.connection()?;
        let node_token = generate_node_token();
        let token_hash = control_core::secret::hash(&node_token);

        let existing = self.get(node_id).await?;
        let mut metadata = existing.metadata;
        let rotation = serde_json::json!({
            "rotatedBy": rotated_by,
            "rotatedAt": now.to_rfc3339(),
        });
        match metadata.as_object_mut() {
            Some(obj) => {
                obj.insert("lastTokenRotation".to_string(), rotation);
            }
            None => metadata = serde_json::json!({ "lastTokenRotation": rotation }),
        }
        let metadata_str = serde_json::to_string(&metadata)
            .map_err(|e| DbError::MappingError(format!("metadata encode failure: {e}")))?;

        let changed = conn
            .execute(
                "UPDATE nodes SET token_hash = ?2, metadata = ?3 WHERE id = ?1",
                params![node_id.to_string(), token_hash, metadata_str],
            )
            .await?;

        if changed == 0 {
            return Err(DbError::NotFound(format!("node {node_id}")));
        }

        Ok(node_token)
    }

    /// Inserts a new node or re-links an existing one identified by
    /// `node_key` (the onsite claim handshake, §4.6 step 3-4). Existing
    /// rows are expected to already belong to the target store — callers
    /// enforce the cross-store conflict check before calling this.
    #[instrument(skip(self, token_hash, metadata))]
    pub async fn upsert_for_claim(
        &self,
        store_id: Uuid,
        node_key: &str,
        label: &str,
        token_hash: &str,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Node, DbError> {
        let conn = self.client.connection()?;
        let now_str = now.to_rfc3339();
        let metadata_str = serde_json::to_string(&metadata)
            .map_err(|e| DbError::MappingError(format!("metadata encode failure: {e}")))?;

        if let Some(existing) = self.get_by_node_key(node_key).await? {
            conn.execute(
                "UPDATE nodes SET label = ?2, token_hash = ?3, metadata = ?4, last_seen_at = ?5, raw_status = 'ONLINE' WHERE id = ?1",
                params![existing.id.to_string(), label, token_hash, metadata_str, now_str],
            )
            .await?;
            return self.get(existing.id).await;
        }

        let node_id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO nodes (id, store_id, label, node_key, token_hash, raw_status, software_version, metadata, last_seen_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'ONLINE', NULL, ?6, ?7, ?8)",
            params![
                node_id.to_string(),
                store_id.to_string(),
                label,
                node_key,
                token_hash,
                metadata_str,
                now_str.clone(),
                now_str
            ],
        )
        .await?;

        self.get(node_id).await
    }
}

fn map_row(row: &Row) -> Result<Node, DbError> {
    Ok(Node {
        id: uuid_col(row, 0)?,
        store_id: uuid_col(row, 1)?,
        label: row.get(2)?,
        node_key: row.get(3)?,
        token_hash: row.get(4)?,
        raw_status: row.get(5)?,
        software_version: row.get(6)?,
        metadata: json_col(row, 7)?,
        last_seen_at: datetime_col(row, 8)?,
        created_at: datetime_col(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::BootstrapTokenRepository;
    use crate::test_support::{memory_client, seed_store};
    use serde_json::json;

    async fn issue_token(client: &TursoClient, store_id: Uuid, plaintext: &str) {
        let repo = BootstrapTokenRepository::new(client.clone());
        let hash = control_core::secret::hash(plaintext);
        repo.create(store_id, "kitchen node", &hash, Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registering_with_a_bootstrap_token_mints_a_node_and_consumes_it() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-N1").await;
        issue_token(&client, store.id, "boot-1").await;

        let repo = NodeRepository::new(client.clone());
        let (node, node_token) = repo
            .register_with_bootstrap_token(store.id, "boot-1", "Kitchen KDS", Some("1.0.0"), json!({}))
            .await
            .unwrap();

        assert_eq!(node.store_id, store.id);
        assert!(node_token.starts_with("node_"));
        assert_eq!(node.raw_status, "ONLINE");

        let second = repo
            .register_with_bootstrap_token(store.id, "boot-1", "Kitchen KDS (again)", None, json!({}))
            .await;
        assert!(matches!(second, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn registering_with_an_unknown_token_fails() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-N2").await;
        let repo = NodeRepository::new(client);

        let result = repo
            .register_with_bootstrap_token(store.id, "never-issued", "Kitchen KDS", None, json!({}))
            .await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn heartbeat_marks_a_node_online_and_records_metadata() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-N3").await;
        issue_token(&client, store.id, "boot-2").await;
        let repo = NodeRepository::new(client);

        let (node, _) = repo
            .register_with_bootstrap_token(store.id, "boot-2", "POS Terminal", None, json!({}))
            .await
            .unwrap();

        repo.heartbeat(node.id, Some("1.2.0"), Some(json!({"uptimeSeconds": 42})), Utc::now())
            .await
            .unwrap();

        let refreshed = repo.get(node.id).await.unwrap();
        assert_eq!(refreshed.raw_status, "ONLINE");
        assert_eq!(refreshed.software_version.as_deref(), Some("1.2.0"));
        assert_eq!(refreshed.metadata["uptimeSeconds"], 42);
    }

    #[tokio::test]
    async fn rotate_token_invalidates_the_previous_hash() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-N4").await;
        issue_token(&client, store.id, "boot-3").await;
        let repo = NodeRepository::new(client);

        let (node, original_token) = repo
            .register_with_bootstrap_token(store.id, "boot-3", "Bar Printer", None, json!({}))
            .await
            .unwrap();

        let rotator = Uuid::new_v4();
        let rotated = repo.rotate_token(node.id, rotator, Utc::now()).await.unwrap();
        assert_ne!(rotated, original_token);

        let refreshed = repo.get(node.id).await.unwrap();
        assert_eq!(refreshed.token_hash, control_core::secret::hash(&rotated));
        assert_ne!(refreshed.token_hash, control_core::secret::hash(&original_token));
        assert_eq!(
            refreshed.metadata["lastTokenRotation"]["rotatedBy"],
            serde_json::json!(rotator)
        );
    }

    #[tokio::test]
    async fn upsert_for_claim_links_an_existing_node_key_instead_of_duplicating() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-N5").await;
        let repo = NodeRepository::new(client);

        let first = repo
            .upsert_for_claim(store.id, "EDGE-ABC12345", "Onsite Node", "hash-a", json!({"v": 1}), Utc::now())
            .await
            .unwrap();

        let second = repo
            .upsert_for_claim(store.id, "EDGE-ABC12345", "Onsite Node Renamed", "hash-b", json!({"v": 2}), Utc::now())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.label, "Onsite Node Renamed");
        assert_eq!(second.token_hash, "hash-b");
    }
}
