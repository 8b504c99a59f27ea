use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{
    extract::DefaultBodyLimit, extract::Extension, response::IntoResponse, routing::delete,
    routing::get, routing::post, Router,
};
use jobgate_config::{Config, CorsConfig};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::tasks;
use crate::state::{AppState, EMAIL_HEADER};

/// HTTP-level settings for [`build_router_with_options`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub cors: CorsConfig,
    pub body_limit_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RouterOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            cors: cfg.cors.clone(),
            body_limit_bytes: cfg.server.body_limit_bytes,
        }
    }
}

/// Build the primary axum router with the provided shared application state.
///
/// Uses default CORS and body limit settings.
pub fn build_router(state: Arc<AppState>) -> Router {
    build_router_with_options(state, RouterOptions::default())
}

pub fn build_router_with_options(state: Arc<AppState>, options: RouterOptions) -> Router {
    Router::new()
        .route("/executar", post(tasks::submit::submit))
        .route("/minhas-tarefas", get(tasks::list::list))
        .route("/status/{id}", get(tasks::status::status))
        .route("/excluir/{id}", delete(tasks::delete::delete))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(options.body_limit_bytes))
        .layer(Extension(state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(build_cors_layer(&options.cors))
}

/// Build the CORS middleware layer from configuration.
///
/// Origins that are not valid header values are skipped with a warning;
/// `validate_config` rejects them before startup.
pub fn build_cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let allow_all = cfg.allow_all_origins || cfg.allowed_origins.iter().any(|o| o == "*");
    let origin = if allow_all {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(EMAIL_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

async fn health_handler() -> impl IntoResponse {
    // Liveness: always return 200 OK when process is alive.
    (axum::http::StatusCode::OK, "OK")
}
