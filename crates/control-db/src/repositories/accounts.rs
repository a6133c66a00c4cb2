use crate::convert::{datetime_col, now_iso, opt_uuid_col, uuid_col};
use crate::errors::{is_unique_violation, DbError};
use crate::TursoClient;
use control_core::{AccountStatus, AccountType, CloudAccount};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str = "id, email, password_hash, display_name, account_type, status, reseller_id, tenant_id, created_at";

pub struct CloudAccountRepository {
    client: TursoClient,
}

impl CloudAccountRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, password_hash))]
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        display_name: &str,
        account_type: AccountType,
        reseller_id: Option<Uuid>,
        tenant_id: Option<Uuid>,
    ) -> Result<CloudAccount, DbError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        let now = now_iso();

        conn.execute(
            "INSERT INTO cloud_accounts (id, email, password_hash, display_name, account_type, status, reseller_id, tenant_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'ACTIVE', ?6, ?7, ?8)",
            params![
                id.to_string(),
                email,
                password_hash,
                display_name,
                account_type_label(account_type),
                reseller_id.map(|r| r.to_string()),
                tenant_id.map(|t| t.to_string()),
                now
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::UniqueViolation(format!("account email '{email}'"))
            } else {
                DbError::QueryError(e)
            }
        })?;

        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<CloudAccount, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM cloud_accounts WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound(format!("cloud account {id}"))),
        }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<CloudAccount>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {COLUMNS} FROM cloud_accounts WHERE email = ?1");
        let mut rows = conn.query(&sql, params![email]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn account_type_label(account_type: AccountType) -> &'static str {
    match account_type {
        AccountType::Owner => "OWNER",
        AccountType::Reseller => "RESELLER",
        AccountType::TenantAdmin => "TENANT_ADMIN",
    }
}

fn map_row(row: &Row) -> Result<CloudAccount, DbError> {
    let account_type_raw: String = row.get(4)?;
    let account_type = match account_type_raw.as_str() {
        "OWNER" => AccountType::Owner,
        "RESELLER" => AccountType::Reseller,
        "TENANT_ADMIN" => AccountType::TenantAdmin,
        other => {
            return Err(DbError::MappingError(format!(
                "unknown account_type '{other}'"
            )))
        }
    };

    let status_raw: String = row.get(5)?;
    let status = match status_raw.as_str() {
        "DISABLED" => AccountStatus::Disabled,
        _ => AccountStatus::Active,
    };

    Ok(CloudAccount {
        id: uuid_col(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        display_name: row.get(3)?,
        account_type,
        status,
        reseller_id: opt_uuid_col(row, 6)?,
        tenant_id: opt_uuid_col(row, 7)?,
        created_at: datetime_col(row, 8)?,
    })
}
