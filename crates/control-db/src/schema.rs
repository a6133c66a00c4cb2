//! Structural schema for the control-plane ledger. Applied idempotently on
//! every connect so a fresh `:memory:` database (tests) and a long-lived
//! on-disk/remote one (production) both boot from the same statements.

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

/// Base tables, in dependency order (a table only ever references one that
/// appears earlier in this list).
const TABLES: &[(&str, &str)] = &[
    (
        "resellers",
        r#"
        CREATE TABLE IF NOT EXISTS resellers (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "tenants",
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            reseller_id TEXT REFERENCES resellers(id),
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "stores",
        r#"
        CREATE TABLE IF NOT EXISTS stores (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            timezone TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            edge_base_url TEXT,
            created_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "cloud_accounts",
        r#"
        CREATE TABLE IF NOT EXISTS cloud_accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            display_name TEXT NOT NULL,
            account_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            reseller_id TEXT REFERENCES resellers(id),
            tenant_id TEXT REFERENCES tenants(id),
            created_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "sessions",
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            cloud_account_id TEXT NOT NULL REFERENCES cloud_accounts(id),
            token_hash TEXT NOT NULL UNIQUE,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "bootstrap_tokens",
        r#"
        CREATE TABLE IF NOT EXISTS bootstrap_tokens (
            id TEXT PRIMARY KEY,
            store_id TEXT NOT NULL REFERENCES stores(id),
            label TEXT NOT NULL,
            token_hash TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            used_at TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(store_id, token_hash)
        );
    "#,
    ),
    (
        "nodes",
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            store_id TEXT NOT NULL REFERENCES stores(id),
            label TEXT NOT NULL,
            node_key TEXT NOT NULL UNIQUE,
            token_hash TEXT NOT NULL,
            raw_status TEXT NOT NULL DEFAULT 'ONLINE',
            software_version TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            last_seen_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "revisions",
        r#"
        CREATE TABLE IF NOT EXISTS revisions (
            id TEXT PRIMARY KEY,
            store_id TEXT NOT NULL REFERENCES stores(id),
            domain TEXT NOT NULL,
            revision_number INTEGER NOT NULL,
            payload TEXT NOT NULL,
            published_by TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(store_id, domain, revision_number)
        );
    "#,
    ),
    (
        "commands",
        r#"
        CREATE TABLE IF NOT EXISTS commands (
            id TEXT PRIMARY KEY,
            store_id TEXT NOT NULL REFERENCES stores(id),
            node_id TEXT REFERENCES nodes(id),
            revision_id TEXT REFERENCES revisions(id),
            domain TEXT NOT NULL,
            command_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            attempts INTEGER NOT NULL DEFAULT 0,
            applied_revision INTEGER,
            error_code TEXT,
            error_detail TEXT,
            issued_at TEXT NOT NULL,
            acknowledged_at TEXT,
            created_by TEXT
        );
    "#,
    ),
    (
        "command_logs",
        r#"
        CREATE TABLE IF NOT EXISTS command_logs (
            id TEXT PRIMARY KEY,
            command_id TEXT NOT NULL REFERENCES commands(id),
            store_id TEXT NOT NULL REFERENCES stores(id),
            node_id TEXT REFERENCES nodes(id),
            status TEXT NOT NULL,
            error_code TEXT,
            error_detail TEXT,
            output TEXT,
            created_at TEXT NOT NULL
        );
    "#,
    ),
];

/// Indexes that accelerate the read paths in §4: scoped hierarchy listing,
/// the node pull queue, and the operator command/log views.
const INDEXES: &[(&str, &str)] = &[
    (
        "idx_tenants_reseller",
        "CREATE INDEX IF NOT EXISTS idx_tenants_reseller ON tenants(reseller_id);",
    ),
    (
        "idx_stores_tenant",
        "CREATE INDEX IF NOT EXISTS idx_stores_tenant ON stores(tenant_id);",
    ),
    (
        "idx_accounts_reseller",
        "CREATE INDEX IF NOT EXISTS idx_accounts_reseller ON cloud_accounts(reseller_id);",
    ),
    (
        "idx_accounts_tenant",
        "CREATE INDEX IF NOT EXISTS idx_accounts_tenant ON cloud_accounts(tenant_id);",
    ),
    (
        "idx_sessions_expires",
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);",
    ),
    (
        "idx_bootstrap_tokens_store",
        "CREATE INDEX IF NOT EXISTS idx_bootstrap_tokens_store ON bootstrap_tokens(store_id, used_at, expires_at);",
    ),
    (
        "idx_nodes_store",
        "CREATE INDEX IF NOT EXISTS idx_nodes_store ON nodes(store_id);",
    ),
    (
        "idx_revisions_store_domain",
        "CREATE INDEX IF NOT EXISTS idx_revisions_store_domain ON revisions(store_id, domain, revision_number);",
    ),
    (
        "idx_commands_store_status",
        "CREATE INDEX IF NOT EXISTS idx_commands_store_status ON commands(store_id, status, issued_at);",
    ),
    (
        "idx_commands_node",
        "CREATE INDEX IF NOT EXISTS idx_commands_node ON commands(node_id, status);",
    ),
    (
        "idx_commands_domain",
        "CREATE INDEX IF NOT EXISTS idx_commands_domain ON commands(store_id, domain);",
    ),
    (
        "idx_command_logs_command",
        "CREATE INDEX IF NOT EXISTS idx_command_logs_command ON command_logs(command_id, created_at);",
    ),
];

/// Applies the full schema. Safe to call on every connect: every statement
/// is `IF NOT EXISTS`, so a warm database is a no-op pass.
#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<()> {
    info!("applying control-plane schema");
    for (name, sql) in TABLES {
        debug!(table = *name, "ensuring table");
        conn.execute(sql, ())
            .await
            .with_context(|| format!("failed to create table '{name}'"))?;
    }
    for (name, sql) in INDEXES {
        debug!(index = *name, "ensuring index");
        conn.execute(sql, ())
            .await
            .with_context(|| format!("failed to create index '{name}'"))?;
    }
    info!("control-plane schema is current");
    Ok(())
}
