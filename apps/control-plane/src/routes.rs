//! Route table (§6). Scope and node-identity checks live in the
//! `FromRequestParts` extractors and the handlers themselves, not in
//! route-level middleware, so there is nothing here to keep in sync with
//! them.

use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, claim, commands, edge, impersonation, network, platform, revisions};
use crate::state::AppState;

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let operator_routes = Router::new()
        .route("/cloud/auth/login", post(auth::login))
        .route("/cloud/auth/me", get(auth::me))
        .route(
            "/cloud/platform/resellers",
            get(platform::list_resellers).post(platform::create_reseller),
        )
        .route(
            "/cloud/platform/resellers/:id/accounts",
            post(platform::create_reseller_account),
        )
        .route(
            "/cloud/platform/resellers/:id/tenants",
            post(platform::create_tenant_under_reseller),
        )
        .route(
            "/cloud/platform/tenants",
            get(platform::list_tenants).post(platform::create_tenant),
        )
        .route(
            "/cloud/platform/tenants/:id/accounts",
            post(platform::create_tenant_account),
        )
        .route(
            "/cloud/platform/stores",
            get(platform::list_stores).post(platform::create_store),
        )
        .route(
            "/cloud/platform/stores/:id/bootstrap-tokens",
            post(platform::create_bootstrap_token),
        )
        .route("/cloud/stores/:id/revisions", post(revisions::publish_revision))
        .route("/cloud/stores/:id/revisions/latest", get(revisions::latest_revision))
        .route("/cloud/stores/:id/commands", get(commands::list_for_store))
        .route("/cloud/commands/:id/retry", post(commands::retry))
        .route("/cloud/commands/:id/logs", get(commands::logs))
        .route("/cloud/platform/network", get(network::network_summary))
        .route(
            "/cloud/platform/network/nodes/:id/rotate-token",
            post(network::rotate_token),
        )
        .route(
            "/cloud/platform/network/actions",
            get(network::list_actions).post(network::dispatch_action),
        )
        .route(
            "/cloud/platform/network/actions/:id/retry",
            post(network::retry_action),
        )
        .route(
            "/cloud/platform/network/actions/:id/cancel",
            post(network::cancel_action),
        )
        .route("/cloud/platform/onsite/claim", post(claim::claim))
        .route(
            "/cloud/platform/stores/:id/impersonation-link",
            post(impersonation::create_impersonation_link),
        );

    // The node-facing and operator-facing routers share two literal paths
    // (`/cloud/nodes/register` is node-only; `/cloud/commands/:id/ack` vs.
    // `/cloud/commands/:id/retry` differ in method/suffix), so merging is
    // conflict-free.
    let edge_routes = Router::new()
        .route("/cloud/nodes/register", post(edge::register_node))
        .route("/cloud/nodes/:node_id/commands", get(edge::pull_commands))
        .route("/cloud/commands/:id/ack", post(edge::ack_command))
        .route("/cloud/nodes/:node_id/heartbeat", post(edge::heartbeat));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(operator_routes)
        .merge(edge_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
