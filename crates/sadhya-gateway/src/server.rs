// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use sadhya_core::{CatalogSnapshot, Clock, SadhyaError, StorageAdapter, SystemClock};
use sadhya_flow::{FlowEngine, SnapshotCatalog, VerificationService};

use crate::admin;
use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::verify;

/// Re-reads the catalog from its source for `POST /admin/catalog/reload`.
pub type CatalogReloader = Arc<dyn Fn() -> Result<CatalogSnapshot, SadhyaError> + Send + Sync>;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            prometheus_render,
        }
    }
}

/// Webhook subscription and signing secrets.
#[derive(Clone, Default)]
pub struct WebhookConfig {
    /// Expected `hub.verify_token` of the subscription handshake.
    pub verify_token: Option<String>,
    /// When set, every POST must carry a valid `X-Hub-Signature-256`.
    pub app_secret: Option<String>,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("verify_token", &self.verify_token.as_ref().map(|_| "[redacted]"))
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<FlowEngine>,
    pub verification: Arc<VerificationService>,
    pub storage: Arc<dyn StorageAdapter>,
    pub catalog: Arc<SnapshotCatalog>,
    pub clock: Arc<dyn Clock>,
    pub webhook: WebhookConfig,
    /// Authentication configuration for the admin routes.
    pub auth: AuthConfig,
    pub health: HealthState,
    pub catalog_reloader: Option<CatalogReloader>,
    /// Webhook batches processed in the background; drained on shutdown.
    pub tasks: TaskTracker,
}

impl GatewayState {
    pub fn new(
        engine: Arc<FlowEngine>,
        verification: Arc<VerificationService>,
        storage: Arc<dyn StorageAdapter>,
        catalog: Arc<SnapshotCatalog>,
    ) -> Self {
        Self {
            engine,
            verification,
            storage,
            catalog,
            clock: Arc::new(SystemClock),
            webhook: WebhookConfig::default(),
            auth: AuthConfig::default(),
            health: HealthState::new(None),
            catalog_reloader: None,
            tasks: TaskTracker::new(),
        }
    }

    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.webhook = webhook;
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_health(mut self, health: HealthState) -> Self {
        self.health = health;
        self
    }

    pub fn with_catalog_reloader(mut self, reloader: CatalogReloader) -> Self {
        self.catalog_reloader = Some(reloader);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Gateway bind address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the full route table.
///
/// - `GET|POST /webhook/` (signature checked in the handler)
/// - `GET /verify/{token}/`, `GET /reject/{token}/`
/// - `GET /health/`, `GET /order/{order_id}/`, `GET /metrics`
/// - `/admin/...` behind bearer auth
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route(
            "/webhook/",
            get(handlers::webhook_handshake).post(handlers::webhook_receive),
        )
        .route("/verify/{token}/", get(verify::verify_payment))
        .route("/reject/{token}/", get(verify::reject_payment))
        .route("/health/", get(handlers::get_health))
        .route("/order/{order_id}/", get(handlers::get_order_status))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/catalog", get(admin::get_catalog))
        .route("/admin/catalog/reload", post(admin::reload_catalog))
        .route(
            "/admin/locations/{id}/activate",
            post(admin::activate_location),
        )
        .route(
            "/admin/locations/{id}/deactivate",
            post(admin::deactivate_location),
        )
        .route("/admin/locations/{id}/fee", post(admin::set_location_fee))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), SadhyaError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SadhyaError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| SadhyaError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }

    #[test]
    fn webhook_config_debug_redacts_secrets() {
        let config = WebhookConfig {
            verify_token: Some("hub-token".into()),
            app_secret: Some("app-secret".into()),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hub-token"));
        assert!(!debug.contains("app-secret"));
        assert!(debug.contains("[redacted]"));
    }
}
