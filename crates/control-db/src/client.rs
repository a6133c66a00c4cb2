//! Connection management for the libSQL-backed control-plane store.
//!
//! Handles both the production shape (remote libSQL over HTTPS, or a local
//! file) and the test shape (`:memory:`). In-memory SQLite purges its
//! content the moment the last connection referencing it drops, so the
//! client parks one extra connection (`_memory_anchor`) for the lifetime of
//! the database to keep the schema and rows alive across pooled borrows.

use crate::errors::DbError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct TursoClient {
    database: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl TursoClient {
    #[instrument(skip(auth_token))]
    pub async fn connect(database_url: &str, auth_token: Option<String>) -> Result<Self, DbError> {
        if database_url.is_empty() {
            return Err(DbError::ConfigurationError(
                "DATABASE_URL must not be empty".into(),
            ));
        }

        info!(url = database_url, "connecting to control-plane database");

        let is_remote = database_url.starts_with("libsql://") || database_url.starts_with("https://");
        let is_memory = database_url.contains(":memory:");

        let database = if is_remote {
            let token = auth_token.ok_or_else(|| {
                DbError::ConfigurationError("remote database requires TURSO_AUTH_TOKEN".into())
            })?;
            Builder::new_remote(database_url.to_string(), token)
                .build()
                .await
        } else {
            Builder::new_local(database_url).build().await
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let database = Arc::new(database);

        let anchor = if is_memory {
            let conn = database
                .connect()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&conn)
                .await
                .map_err(|e| DbError::ConfigurationError(e.to_string()))?;
            Some(Arc::new(conn))
        } else {
            let conn = database
                .connect()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&conn)
                .await
                .map_err(|e| DbError::ConfigurationError(e.to_string()))?;
            None
        };

        info!("control-plane database ready");

        Ok(Self {
            database,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, DbError> {
        self.database
            .connect()
            .map_err(|e| DbError::ConnectionError(e.to_string()))
    }
}
