//! HTTP API server for Orquestulator.
//!
//! This crate provides the REST layer of the expression sandbox.
//!
//! # Features
//!
//! - Passphrase authentication with cookie-bound sessions
//! - Per-session key/value storage for UI state
//! - Expression evaluation (Orquesta, YAQL, Jinja2)
//! - StackStorm connection selection and execution lookup
//! - Rate limiting of authentication attempts
//! - Request logging
//!
//! # Example
//!
//! ```ignore
//! use orquestulator_server::{AppState, Server, ServerConfig};
//!
//! let config = ServerConfig::new(Some("passphrase".to_string()))
//!     .with_bind_address("127.0.0.1:8000".parse()?);
//!
//! let state = AppState::in_memory(config, connections)?;
//! Server::from_state(state).run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use auth::{CurrentSession, session_middleware};
pub use config::{CookieSettings, ServerConfig};
pub use error::{ErrorResponse, Result, ServerError};
pub use ratelimit::{auth_rate_limit_middleware, request_logging_middleware, spawn_limiter_cleanup};
pub use routes::{EvaluateRequest, EvaluateResponse};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// The Orquestulator HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        use axum::routing::get;

        let router = Router::new()
            // Health routes (no auth required)
            .merge(routes::health_routes())
            .route("/api/openapi.json", get(routes::openapi_handler))
            .nest("/api", self.api_routes())
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::request_logging_middleware,
            ))
            // TraceLayer for detailed HTTP tracing
            .layer(TraceLayer::new_for_http());

        let router = match self.cors_layer() {
            Some(cors) => router.layer(cors),
            None => router,
        };

        router.with_state(self.state.clone())
    }

    /// API routes under `/api`.
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        let public = Router::new()
            .route(
                "/session/auth",
                post(routes::authenticate_handler).layer(middleware::from_fn_with_state(
                    self.state.clone(),
                    ratelimit::auth_rate_limit_middleware,
                )),
            )
            .route("/session/status", get(routes::status_handler));

        let protected = Router::new()
            // Session endpoints
            .route(
                "/session/data",
                get(routes::get_data_handler).post(routes::store_data_handler),
            )
            .route("/session/count", get(routes::count_handler))
            // Evaluation
            .route("/evaluate/{query_type}", post(routes::evaluate_handler))
            // StackStorm endpoints
            .route(
                "/stackstorm/connection",
                get(routes::get_connection_handler).put(routes::set_connection_handler),
            )
            .route(
                "/stackstorm/connection/test",
                post(routes::test_connection_handler),
            )
            .route(
                "/stackstorm/executions",
                get(routes::list_executions_handler),
            )
            .route(
                "/stackstorm/executions/{id}",
                get(routes::get_execution_handler),
            )
            // Session middleware for protected routes only, so unknown paths
            // still 404
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::session_middleware,
            ));

        public.merge(protected)
    }

    /// CORS for the configured origins. Credentials are allowed so browsers
    /// send the session cookie.
    fn cors_layer(&self) -> Option<CorsLayer> {
        let origins: Vec<HeaderValue> = self
            .state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        if origins.is_empty() {
            return None;
        }

        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION]),
        )
    }

    /// Run the server on the configured bind address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();

        if let Ok(addr) = listener.local_addr() {
            info!("Starting server on {}", addr);
        }

        let sweeper = spawn_limiter_cleanup(
            self.state.auth_limiter.clone(),
            self.state.config.auth_rate_limit.period.duration(),
        );
        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
        sweeper.abort();

        result.map_err(|e| ServerError::Internal(format!("Server error: {}", e)))
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header::ORIGIN},
    };
    use orquestulator_config::ConnectionsFile;
    use tower::ServiceExt;

    fn create_test_server(config: ServerConfig) -> Server {
        Server::from_state(AppState::in_memory(config, ConnectionsFile::default()).unwrap())
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let app = create_test_server(ServerConfig::new(Some("pw".to_string()))).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = create_test_server(ServerConfig::new(None)).router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let app = create_test_server(ServerConfig::new(None)).router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_with_credentials() {
        let config = ServerConfig::new(None)
            .with_cors_origins(vec!["http://localhost:5173".to_string()]);
        let app = create_test_server(config).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(
            headers["access-control-allow-origin"],
            "http://localhost:5173"
        );
        assert_eq!(headers["access-control-allow-credentials"], "true");
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new(Some("pw".to_string()))
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_request_logging(false);

        assert_eq!(config.passphrase, "pw");
        assert_eq!(config.bind_address.port(), 9000);
        assert!(!config.request_logging);
        assert_eq!(create_test_server(config).bind_address().port(), 9000);
    }
}
