use crate::convert::{datetime_col, now_iso, uuid_col};
use crate::errors::{is_unique_violation, DbError};
use crate::TursoClient;
use control_core::{Reseller, Scope};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str = "id, code, name, active, created_at";

pub struct ResellerRepository {
    client: TursoClient,
}

impl ResellerRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, code: &str, name: &str) -> Result<Reseller, DbError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        let now = now_iso();

        conn.execute(
            "INSERT INTO resellers (id, code, name, active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
            params![id.to_string(), code, name, now.clone()],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::UniqueViolation(format!("reseller code '{code}'"))
            } else {
                DbError::QueryError(e)
            }
        })?;

        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Reseller, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM resellers WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound(format!("reseller {id}"))),
        }
    }

    /// Owner sees every reseller; a reseller account sees only itself;
    /// tenant admins have no reseller-level visibility.
    pub async fn list(&self, scope: &Scope) -> Result<Vec<Reseller>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM resellers ORDER BY created_at DESC");

        let target_id = match scope {
            Scope::Owner => None,
            Scope::Reseller(id) => Some(*id),
            Scope::TenantAdmin(_) => return Ok(Vec::new()),
        };

        let mut rows = conn.query(&sql, ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let reseller = map_row(&row)?;
            let visible = match target_id {
                Some(id) => id == reseller.id,
                None => true,
            };
            if visible {
                out.push(reseller);
            }
        }
        Ok(out)
    }
}

fn map_row(row: &Row) -> Result<Reseller, DbError> {
    Ok(Reseller {
        id: uuid_col(row, 0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        active: row.get::<i64>(3)? != 0,
        created_at: datetime_col(row, 4)?,
    })
}
