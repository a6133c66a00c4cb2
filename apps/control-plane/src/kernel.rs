//! Composition root: connect to storage, build shared state, bind the
//! listener, serve. No daemons run alongside the HTTP server — this
//! service is a pull-based control plane (§3), not a poller.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use control_db::TursoClient;
use tracing::{info, instrument};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

pub struct Kernel {
    port: u16,
    state: AppState,
}

impl Kernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: Config) -> anyhow::Result<Self> {
        let db = TursoClient::connect(&config.database_url, config.turso_auth_token.clone()).await?;
        let port = config.port;

        Ok(Self {
            port,
            state: AppState::new(db, config),
        })
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let router = build_router(self.state);
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "control-plane listening");

        axum::serve(listener, router).await?;
        Ok(())
    }
}
