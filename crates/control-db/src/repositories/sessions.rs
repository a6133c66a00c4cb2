use crate::convert::{datetime_col, uuid_col};
use crate::errors::DbError;
use crate::TursoClient;
use chrono::{DateTime, Duration, Utc};
use control_core::Session;
use libsql::{params, Row};
use rand::{distributions::Alphanumeric, Rng};
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str = "id, cloud_account_id, token_hash, issued_at, expires_at";

pub struct SessionRepository {
    client: TursoClient,
}

/// Opaque bearer credential minted by `/cloud/auth/login`; never a JWT,
/// per the session-store design note in §3.1.
fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

impl SessionRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, cloud_account_id: Uuid, ttl: Duration) -> Result<(Session, String), DbError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + ttl;
        let token = generate_session_token();
        let token_hash = control_core::secret::hash(&token);

        conn.execute(
            "INSERT INTO sessions (id, cloud_account_id, token_hash, issued_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                cloud_account_id.to_string(),
                token_hash,
                now.to_rfc3339(),
                expires_at.to_rfc3339()
            ],
        )
        .await?;

        let session = self.get(id).await?;
        Ok((session, token))
    }

    pub async fn get(&self, id: Uuid) -> Result<Session, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM sessions WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound(format!("session {id}"))),
        }
    }

    /// Looks up a session by the hash of its bearer token. Returns `None`
    /// both for an unknown hash and for an expired session — the caller
    /// treats both as an unauthenticated request.
    pub async fn get_valid_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>, DbError> {
        let conn = self.client.connection()?;
        let token_hash = control_core::secret::hash(token);
        let sql = format!("SELECT {COLUMNS} FROM sessions WHERE token_hash = ?1");
        let mut rows = conn.query(&sql, params![token_hash]).await?;
        match rows.next().await? {
            Some(row) => {
                let session = map_row(&row)?;
                if session.is_expired(now) {
                    Ok(None)
                } else {
                    Ok(Some(session))
                }
            }
            None => Ok(None),
        }
    }
}

fn map_row(row: &Row) -> Result<Session, DbError> {
    Ok(Session {
        id: uuid_col(row, 0)?,
        cloud_account_id: uuid_col(row, 1)?,
        token_hash: row.get(2)?,
        issued_at: datetime_col(row, 3)?,
        expires_at: datetime_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::CloudAccountRepository;
    use crate::test_support::memory_client;
    use control_core::AccountType;

    async fn seed_account(client: &TursoClient) -> Uuid {
        let accounts = CloudAccountRepository::new(client.clone());
        accounts
            .create(
                "owner@example.com",
                "hash",
                "Owner",
                AccountType::Owner,
                None,
                None,
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn created_session_is_looked_up_by_token() {
        let client = memory_client().await;
        let account_id = seed_account(&client).await;
        let repo = SessionRepository::new(client);

        let (session, token) = repo.create(account_id, Duration::hours(1)).await.unwrap();
        let found = repo
            .get_valid_by_token(&token, Utc::now())
            .await
            .unwrap()
            .expect("session found");
        assert_eq!(found.id, session.id);
    }

    #[tokio::test]
    async fn expired_session_is_treated_as_absent() {
        let client = memory_client().await;
        let account_id = seed_account(&client).await;
        let repo = SessionRepository::new(client);

        let (_, token) = repo.create(account_id, Duration::seconds(-1)).await.unwrap();
        let found = repo.get_valid_by_token(&token, Utc::now()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn unknown_token_is_absent() {
        let client = memory_client().await;
        let repo = SessionRepository::new(client);
        let found = repo.get_valid_by_token("nonsense", Utc::now()).await.unwrap();
        assert!(found.is_none());
    }
}
