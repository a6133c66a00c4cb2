use crate::convert::{datetime_col, now_iso, opt_uuid_col, uuid_col};
use crate::errors::{is_unique_violation, DbError};
use crate::TursoClient;
use control_core::{Scope, Tenant};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str = "id, reseller_id, slug, name, active, created_at";

pub struct TenantRepository {
    client: TursoClient,
}

impl TenantRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        reseller_id: Option<Uuid>,
        slug: &str,
        name: &str,
    ) -> Result<Tenant, DbError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        let now = now_iso();

        conn.execute(
            "INSERT INTO tenants (id, reseller_id, slug, name, active, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![
                id.to_string(),
                reseller_id.map(|r| r.to_string()),
                slug,
                name,
                now
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::UniqueViolation(format!("tenant slug '{slug}'"))
            } else {
                DbError::QueryError(e)
            }
        })?;

        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Tenant, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM tenants WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound(format!("tenant {id}"))),
        }
    }

    /// Owner sees everything (optionally filtered by `reseller_filter`);
    /// a reseller account only ever sees its own tenants; a tenant admin
    /// only ever sees its own tenant.
    pub async fn list(
        &self,
        scope: &Scope,
        reseller_filter: Option<Uuid>,
    ) -> Result<Vec<Tenant>, DbError> {
        let conn = self.client.connection()?;

        let (clause, bind): (&str, Option<Uuid>) = match scope {
            Scope::Owner => match reseller_filter {
                Some(id) => (" WHERE reseller_id = ?1", Some(id)),
                None => ("", None),
            },
            Scope::Reseller(id) => (" WHERE reseller_id = ?1", Some(*id)),
            Scope::TenantAdmin(id) => (" WHERE id = ?1", Some(*id)),
        };

        let sql = format!("SELECT {COLUMNS} FROM tenants{clause} ORDER BY created_at DESC");
        let mut rows = match bind {
            Some(id) => conn.query(&sql, params![id.to_string()]).await?,
            None => conn.query(&sql, ()).await?,
        };

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }
}

fn map_row(row: &Row) -> Result<Tenant, DbError> {
    Ok(Tenant {
        id: uuid_col(row, 0)?,
        reseller_id: opt_uuid_col(row, 1)?,
        slug: row.get(2)?,
        name: row.get(3)?,
        active: row.get::<i64>(4)? != 0,
        created_at: datetime_col(row, 5)?,
    })
}
