use crate::convert::{datetime_col, now_iso, uuid_col};
use crate::errors::{is_unique_violation, DbError};
use crate::TursoClient;
use control_core::{Scope, Store, StoreStatus};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str = "id, tenant_id, code, name, timezone, status, edge_base_url, created_at";

pub struct StoreRepository {
    client: TursoClient,
}

impl StoreRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        tenant_id: Uuid,
        code: &str,
        name: &str,
        timezone: &str,
        edge_base_url: Option<&str>,
    ) -> Result<Store, DbError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        let now = now_iso();

        conn.execute(
            "INSERT INTO stores (id, tenant_id, code, name, timezone, status, edge_base_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'ACTIVE', ?6, ?7)",
            params![
                id.to_string(),
                tenant_id.to_string(),
                code,
                name,
                timezone,
                edge_base_url,
                now
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::UniqueViolation(format!("store code '{code}'"))
            } else {
                DbError::QueryError(e)
            }
        })?;

        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Store, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM stores WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound(format!("store {id}"))),
        }
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<Store>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM stores WHERE code = ?1");
        let mut rows = conn.query(&sql, params![code]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Scoped listing for `GET /cloud/platform/stores` and the network
    /// view: owners see everything (optionally tenant-filtered); reseller
    /// accounts see stores of tenants under their reseller; tenant admins
    /// see only their own tenant's stores.
    pub async fn list(&self, scope: &Scope, tenant_filter: Option<Uuid>) -> Result<Vec<Store>, DbError> {
        let conn = self.client.connection()?;

        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        match scope {
            Scope::Owner => {}
            Scope::Reseller(id) => {
                clauses.push(format!(
                    "stores.tenant_id IN (SELECT id FROM tenants WHERE reseller_id = ?{})",
                    binds.len() + 1
                ));
                binds.push(id.to_string());
            }
            Scope::TenantAdmin(id) => {
                clauses.push(format!("stores.tenant_id = ?{}", binds.len() + 1));
                binds.push(id.to_string());
            }
        }

        if let Some(tenant_id) = tenant_filter {
            clauses.push(format!("stores.tenant_id = ?{}", binds.len() + 1));
            binds.push(tenant_id.to_string());
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let qualified_columns = "stores.id, stores.tenant_id, stores.code, stores.name, stores.timezone, stores.status, stores.edge_base_url, stores.created_at";
        let sql = format!(
            "SELECT {qualified_columns} FROM stores{where_clause} ORDER BY stores.created_at DESC"
        );

        let params = libsql::params_from_iter(binds);
        let mut rows = conn.query(&sql, params).await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }
}

fn map_row(row: &Row) -> Result<Store, DbError> {
    let status_raw: String = row.get(5)?;
    let status = match status_raw.as_str() {
        "SUSPENDED" => StoreStatus::Suspended,
        _ => StoreStatus::Active,
    };

    Ok(Store {
        id: uuid_col(row, 0)?,
        tenant_id: uuid_col(row, 1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        timezone: row.get(4)?,
        status,
        edge_base_url: row.get(6)?,
        created_at: datetime_col(row, 7)?,
    })
}
