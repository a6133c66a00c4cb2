//! Shared fixtures for repository tests. Each test gets its own
//! in-memory database and applies the schema fresh, per §2.1/§8.1.

use crate::repositories::{ResellerRepository, StoreRepository, TenantRepository};
use crate::TursoClient;
use control_core::Store;
use uuid::Uuid;

pub async fn memory_client() -> TursoClient {
    TursoClient::connect(":memory:", None)
        .await
        .expect("in-memory control-plane database")
}

/// Seeds a reseller-less tenant and an active store under it, returning
/// the store. Most command/revision/node tests only need a store to hang
/// rows off; the reseller/tenant hierarchy above it is incidental.
pub async fn seed_store(client: &TursoClient, code: &str) -> Store {
    let tenants = TenantRepository::new(client.clone());
    let stores = StoreRepository::new(client.clone());

    let tenant = tenants
        .create(None, &code.to_lowercase(), "Test Tenant")
        .await
        .expect("create tenant");

    stores
        .create(tenant.id, code, "Test Store", "America/New_York", None)
        .await
        .expect("create store")
}

pub async fn seed_reseller(client: &TursoClient, code: &str) -> Uuid {
    let resellers = ResellerRepository::new(client.clone());
    resellers.create(code, "Test Reseller").await.expect("create reseller").id
}
