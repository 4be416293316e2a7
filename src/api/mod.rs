mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;
use crate::sync::{TracingSync, TreeSync};

pub use middleware::SecurityConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sync: Arc<dyn TreeSync>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self::with_sync(db, Arc::new(TracingSync))
    }

    pub fn with_sync(db: Database, sync: Arc<dyn TreeSync>) -> Self {
        Self { db, sync }
    }
}

/// Router with authentication disabled.
pub fn create_router(db: Database) -> Router {
    create_router_with_config(db, SecurityConfig::disabled())
}

pub fn create_router_with_config(db: Database, config: SecurityConfig) -> Router {
    create_router_with_state(AppState::new(db), config)
}

pub fn create_router_with_state(state: AppState, config: SecurityConfig) -> Router {
    let protected = Router::new()
        // Trees
        .route("/orgs/{org_id}/trees", get(handlers::list_trees))
        .route(
            "/orgs/{org_id}/trees/{label}",
            get(handlers::get_tree).put(handlers::update_tree),
        )
        // Profiles and keys
        .route("/orgs/{org_id}/crypto-keys", get(handlers::list_crypto_keys))
        .route(
            "/orgs/{org_id}/profiles/{id}/command-names",
            get(handlers::list_command_names),
        )
        // Sessions
        .route("/sessions/fail", post(handlers::fail_sessions))
        .route("/sessions/{id}", get(handlers::get_session))
        // Reference data
        .route("/install-types", get(handlers::list_install_types))
        .route(
            "/virtualization-types",
            get(handlers::list_virtualization_types),
        )
        .route_layer(from_fn_with_state(
            config.clone(),
            middleware::auth_middleware,
        ));

    let api = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config)),
        )
        .with_state(state)
}

fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        None => CorsLayer::permissive(),
    }
}
