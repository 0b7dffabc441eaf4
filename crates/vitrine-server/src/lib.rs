#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::{middleware, Router};
use std::sync::Arc;
use tokio::sync::Mutex;
use vitrine_core::{AdminCredentials, AuditLog, CatalogTree};

mod config;
mod http;
mod regen;
pub mod sessions;

pub use config::{validate_startup_config_contract, ApiConfig};
pub use regen::{CatalogRegenerator, RegenOutput};
pub use sessions::SessionStore;

/// Shared per-request state. Cloning is cheap; everything mutable lives
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiConfig,
    pub tree: Arc<CatalogTree>,
    pub audit: Arc<Mutex<AuditLog>>,
    pub credentials: Arc<AdminCredentials>,
    pub sessions: Arc<SessionStore>,
    pub regen: Arc<CatalogRegenerator>,
    /// Serializes catalog mutations: concurrent renames could otherwise race
    /// past each other's existence checks, so every tree mutation holds this
    /// single-writer lock.
    pub(crate) mutations: Arc<Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(api: ApiConfig, credentials: AdminCredentials) -> Self {
        let tree = CatalogTree::new(api.catalog_root.clone());
        let audit = AuditLog::open(api.catalog_root.as_path());
        let regen = CatalogRegenerator::new(
            api.regen_program.clone(),
            api.regen_args.clone(),
            api.catalog_root.clone(),
        );
        let sessions = SessionStore::new(api.session_ttl);
        Self {
            tree: Arc::new(tree),
            audit: Arc::new(Mutex::new(audit)),
            credentials: Arc::new(credentials),
            sessions: Arc::new(sessions),
            regen: Arc::new(regen),
            mutations: Arc::new(Mutex::new(())),
            api,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/audit-logs", get(http::handlers::audit_logs_handler))
        .route(
            "/api/create-category",
            post(http::handlers::create_category_handler),
        )
        .route("/api/add-product", post(http::handlers::add_product_handler))
        .route(
            "/api/rename-product",
            put(http::handlers::rename_product_handler),
        )
        .route(
            "/api/delete-product",
            delete(http::handlers::delete_product_handler),
        )
        .route(
            "/api/regenerate-html",
            post(http::handlers::regenerate_html_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            http::handlers::require_admin,
        ));

    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/api/login", post(http::handlers::login_handler))
        .route("/api/logout", post(http::handlers::logout_handler))
        .route("/api/auth-status", get(http::handlers::auth_status_handler))
        .merge(admin)
        .fallback(get(http::static_files::serve_catalog_file))
        .layer(DefaultBodyLimit::max(state.api.max_upload_bytes))
        .with_state(state)
}
