use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owner of zero or more tenants. Top of the tenancy tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reseller {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub reseller_id: Option<Uuid>,
    pub slug: String,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StoreStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub timezone: String,
    pub status: StoreStatus,
    pub edge_base_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Owner,
    Reseller,
    TenantAdmin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudAccount {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub reseller_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl CloudAccount {
    /// OWNER carries neither reseller nor tenant; RESELLER carries only a
    /// reseller; TENANT_ADMIN carries only a tenant. Violating this means the
    /// row was inserted outside the account-creation endpoints.
    pub fn scope_is_consistent(&self) -> bool {
        match self.account_type {
            AccountType::Owner => self.reseller_id.is_none() && self.tenant_id.is_none(),
            AccountType::Reseller => self.reseller_id.is_some() && self.tenant_id.is_none(),
            AccountType::TenantAdmin => self.tenant_id.is_some() && self.reseller_id.is_none(),
        }
    }
}

/// An opaque, server-side bearer credential minted by `/cloud/auth/login`.
/// Looked up by hashing the inbound bearer token and matching `token_hash`,
/// the same shape as a node token (§3.1) — never a self-describing JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub cloud_account_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapToken {
    pub id: Uuid,
    pub store_id: Uuid,
    pub label: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BootstrapToken {
    pub fn is_consumable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: Uuid,
    pub store_id: Uuid,
    pub label: String,
    pub node_key: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub raw_status: String,
    pub software_version: Option<String>,
    pub metadata: serde_json::Value,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub id: Uuid,
    pub store_id: Uuid,
    pub domain: String,
    pub revision_number: i64,
    pub payload: serde_json::Value,
    pub published_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Pending,
    Acked,
    Failed,
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CommandStatus::Pending => "PENDING",
            CommandStatus::Acked => "ACKED",
            CommandStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(CommandStatus::Pending),
            "ACKED" => Ok(CommandStatus::Acked),
            "FAILED" => Ok(CommandStatus::Failed),
            other => Err(crate::error::CoreError::Validation(format!(
                "unknown command status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: Uuid,
    pub store_id: Uuid,
    pub node_id: Option<Uuid>,
    pub revision_id: Option<Uuid>,
    pub domain: String,
    pub command_type: String,
    pub payload: serde_json::Value,
    pub status: CommandStatus,
    pub attempts: i64,
    pub applied_revision: Option<i64>,
    pub error_code: Option<String>,
    pub error_detail: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}

pub const REMOTE_ACTION_DOMAIN: &str = "REMOTE_ACTION";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLog {
    pub id: Uuid,
    pub command_id: Uuid,
    pub store_id: Uuid,
    pub node_id: Option<Uuid>,
    pub status: String,
    pub error_code: Option<String>,
    pub error_detail: Option<String>,
    pub output: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
