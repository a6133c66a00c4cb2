//! Shared application state: the database client, the loaded configuration,
//! and constructors for every repository a handler might need. Handlers
//! take `State<AppState>` and build the repository they want from it rather
//! than each owning its own connection pool.

use std::sync::Arc;

use control_db::repositories::{
    BootstrapTokenRepository, CloudAccountRepository, CommandRepository, NodeRepository,
    ResellerRepository, RevisionRepository, SessionRepository, StoreRepository, TenantRepository,
};
use control_db::TursoClient;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: TursoClient,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: TursoClient, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn accounts(&self) -> CloudAccountRepository {
        CloudAccountRepository::new(self.db.clone())
    }

    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(self.db.clone())
    }

    pub fn resellers(&self) -> ResellerRepository {
        ResellerRepository::new(self.db.clone())
    }

    pub fn tenants(&self) -> TenantRepository {
        TenantRepository::new(self.db.clone())
    }

    pub fn stores(&self) -> StoreRepository {
        StoreRepository::new(self.db.clone())
    }

    pub fn nodes(&self) -> NodeRepository {
        NodeRepository::new(self.db.clone())
    }

    pub fn bootstrap_tokens(&self) -> BootstrapTokenRepository {
        BootstrapTokenRepository::new(self.db.clone())
    }

    pub fn revisions(&self) -> RevisionRepository {
        RevisionRepository::new(self.db.clone())
    }

    pub fn commands(&self) -> CommandRepository {
        CommandRepository::new(self.db.clone())
    }
}
