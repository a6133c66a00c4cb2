//! One-shot operator utility: populates a freshly provisioned control plane
//! with the first OWNER cloud account and a minimal tenancy skeleton (a
//! tenant and a store) so local development has something to point an edge
//! node's bootstrap token at without going through the HTTP surface first.
//!
//! Safe to re-run: each step's unique constraint turns a repeat invocation
//! into a no-op (reported, not treated as an error) rather than failing the
//! whole run.

use control_core::{secret, AccountType};
use control_db::repositories::{CloudAccountRepository, StoreRepository, TenantRepository};
use control_db::{DbError, TursoClient};
use control_telemetry::init_tracing;
use dotenvy::dotenv;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing("control-plane-seed");

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let database_token = std::env::var("TURSO_AUTH_TOKEN").ok();

    let email = std::env::var("SEED_OWNER_EMAIL").unwrap_or_else(|_| "owner@example.com".to_string());
    let password = std::env::var("SEED_OWNER_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    let display_name = std::env::var("SEED_OWNER_NAME").unwrap_or_else(|_| "Platform Owner".to_string());
    let tenant_slug = std::env::var("SEED_TENANT_SLUG").unwrap_or_else(|_| "demo".to_string());
    let store_code = std::env::var("SEED_STORE_CODE").unwrap_or_else(|_| "DEMO-001".to_string());

    info!("connecting to control-plane database for seeding");
    let client = TursoClient::connect(&database_url, database_token).await?;

    let accounts = CloudAccountRepository::new(client.clone());
    let password_hash = secret::hash(&password);
    match accounts
        .create(&email, &password_hash, &display_name, AccountType::Owner, None, None)
        .await
    {
        Ok(account) => info!(account_id = %account.id, %email, "seeded OWNER account"),
        Err(DbError::UniqueViolation(_)) => warn!(%email, "OWNER account already exists, skipping"),
        Err(e) => {
            error!(%email, error = %e, "failed to seed OWNER account");
            return Err(e.into());
        }
    }

    let tenants = TenantRepository::new(client.clone());
    let tenant = match tenants.create(None, &tenant_slug, "Demo Tenant").await {
        Ok(tenant) => {
            info!(tenant_id = %tenant.id, slug = %tenant_slug, "seeded demo tenant");
            Some(tenant)
        }
        Err(DbError::UniqueViolation(_)) => {
            warn!(slug = %tenant_slug, "demo tenant already exists, skipping store seed");
            None
        }
        Err(e) => {
            error!(slug = %tenant_slug, error = %e, "failed to seed demo tenant");
            return Err(e.into());
        }
    };

    if let Some(tenant) = tenant {
        let stores = StoreRepository::new(client);
        match stores
            .create(tenant.id, &store_code, "Demo Store", "America/New_York", None)
            .await
        {
            Ok(store) => info!(store_id = %store.id, code = %store_code, "seeded demo store"),
            Err(DbError::UniqueViolation(_)) => warn!(code = %store_code, "demo store already exists, skipping"),
            Err(e) => {
                error!(code = %store_code, error = %e, "failed to seed demo store");
                return Err(e.into());
            }
        }
    }

    Ok(())
}
