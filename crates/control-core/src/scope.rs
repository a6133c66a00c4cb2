use uuid::Uuid;

use crate::entities::{AccountType, CloudAccount};

/// What a cloud account may read or mutate, derived once at auth time and
/// threaded through handlers and repositories rather than re-derived from
/// `account_type` at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Owner,
    Reseller(Uuid),
    TenantAdmin(Uuid),
}

impl Scope {
    pub fn from_account(account: &CloudAccount) -> Self {
        match account.account_type {
            AccountType::Owner => Scope::Owner,
            AccountType::Reseller => Scope::Reseller(
                account
                    .reseller_id
                    .expect("reseller account without reseller_id violates scope invariant"),
            ),
            AccountType::TenantAdmin => Scope::TenantAdmin(
                account
                    .tenant_id
                    .expect("tenant admin account without tenant_id violates scope invariant"),
            ),
        }
    }

    pub fn can_access_reseller(&self, reseller_id: Uuid) -> bool {
        match self {
            Scope::Owner => true,
            Scope::Reseller(id) => *id == reseller_id,
            Scope::TenantAdmin(_) => false,
        }
    }

    /// Tenant access additionally requires the tenant's own reseller to
    /// match when the caller is scoped at the reseller level; callers pass
    /// the tenant's `reseller_id` (which may be absent for unaffiliated
    /// tenants).
    pub fn can_access_tenant(&self, tenant_id: Uuid, tenant_reseller_id: Option<Uuid>) -> bool {
        match self {
            Scope::Owner => true,
            Scope::Reseller(id) => tenant_reseller_id == Some(*id),
            Scope::TenantAdmin(id) => *id == tenant_id,
        }
    }
}
