use axum::{middleware, routing::get, Json, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tenantry::{
    CollectionsEngine, DocumentStore, EngineConfig, EngineHooks, EngineManager, EngineManifest,
    LockProvider, MemoryLockProvider, MemoryStore,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use crate::handlers::{
    create_engine, delete_engine, engine_exists, health, list_engines, update_engine, AppState,
};
use crate::middleware::normalize_content_type;
use crate::openapi::ApiDoc;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub plugin_name: String,
    /// JSON manifest of the collections provisioned per tenant.
    pub manifest: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7800".to_string(),
            plugin_name: "collections".to_string(),
            manifest: None,
        }
    }
}

/// In-memory store and locks, a collections engine over `manifest`, initialized.
pub async fn build_state(
    plugin_name: &str,
    manifest: EngineManifest,
) -> tenantry::Result<Arc<AppState>> {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let locks: Arc<dyn LockProvider> = Arc::new(MemoryLockProvider::new());
    let hooks: Arc<dyn EngineHooks> = Arc::new(CollectionsEngine::new(store.clone(), manifest));

    let engine = EngineManager::new(plugin_name, hooks, store, locks, &EngineConfig::from_env())?;
    engine.init().await?;

    Ok(Arc::new(AppState {
        engine: Arc::new(engine),
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let plugin = state.plugin_name().to_string();

    let engine_routes = Router::new()
        .route(
            &format!("/{}/engine/:index", plugin),
            axum::routing::post(create_engine)
                .put(update_engine)
                .delete(delete_engine),
        )
        .route(
            &format!("/{}/engine/:index/_exists", plugin),
            get(engine_exists),
        )
        .route(&format!("/{}/engines", plugin), get(list_engines))
        .with_state(state.clone());

    let health_route = Router::new()
        .route("/health", get(health))
        .with_state(state);

    Router::new()
        .merge(health_route)
        .merge(engine_routes)
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(middleware::from_fn(normalize_content_type))
        .layer(CorsLayer::very_permissive().max_age(std::time::Duration::from_secs(86400)))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let manifest = match &config.manifest {
        Some(path) => EngineManifest::load(path)?,
        None => {
            tracing::warn!("No engine manifest given, engines will provision no collections");
            EngineManifest::default()
        }
    };

    let state = build_state(&config.plugin_name, manifest).await?;
    let app = router(state);

    tracing::info!(
        "Starting Tenantry server on {} (plugin {})",
        config.bind_addr,
        config.plugin_name
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
