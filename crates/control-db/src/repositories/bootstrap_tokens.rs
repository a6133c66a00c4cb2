use crate::convert::{datetime_col, now_iso, opt_datetime_col, uuid_col};
use crate::errors::DbError;
use crate::TursoClient;
use chrono::{DateTime, Utc};
use control_core::BootstrapToken;
use libsql::{params, Row};
use rand::{distributions::Alphanumeric, Rng};
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str = "id, store_id, label, token_hash, expires_at, used_at, created_at";

/// Generates an opaque bootstrap credential: unlike a node token, it
/// carries no type-prefix (§4.2).
pub fn generate_bootstrap_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect()
}

pub struct BootstrapTokenRepository {
    client: TursoClient,
}

impl BootstrapTokenRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, token_hash))]
    pub async fn create(
        &self,
        store_id: Uuid,
        label: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<BootstrapToken, DbError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        let now = now_iso();

        conn.execute(
            "INSERT INTO bootstrap_tokens (id, store_id, label, token_hash, expires_at, used_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            params![
                id.to_string(),
                store_id.to_string(),
                label,
                token_hash,
                expires_at.to_rfc3339(),
                now
            ],
        )
        .await?;

        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<BootstrapToken, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM bootstrap_tokens WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound(format!("bootstrap token {id}"))),
        }
    }
}

fn map_row(row: &Row) -> Result<BootstrapToken, DbError> {
    Ok(BootstrapToken {
        id: uuid_col(row, 0)?,
        store_id: uuid_col(row, 1)?,
        label: row.get(2)?,
        token_hash: row.get(3)?,
        expires_at: datetime_col(row, 4)?,
        used_at: opt_datetime_col(row, 5)?,
        created_at: datetime_col(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_client, seed_store};
    use std::collections::HashSet;

    #[tokio::test]
    async fn create_starts_unused() {
        let client = memory_client().await;
        let store = seed_store(&client, "SMOKE-BT1").await;
        let repo = BootstrapTokenRepository::new(client);

        let expires_at = Utc::now() + chrono::Duration::days(7);
        let token = repo
            .create(store.id, "front counter", "hash-1", expires_at)
            .await
            .unwrap();

        assert_eq!(token.store_id, store.id);
        assert!(token.used_at.is_none());

        let fetched = repo.get(token.id).await.unwrap();
        assert_eq!(fetched.id, token.id);
    }

    #[test]
    fn generated_tokens_are_unprefixed_and_unique() {
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let token = generate_bootstrap_token();
            assert_eq!(token.len(), 40);
            assert!(!token.starts_with("node_"));
            assert!(seen.insert(token), "generator produced a duplicate");
        }
    }
}
