//! OpenAPI documentation configuration.

use axum::Json;
use utoipa::OpenApi;

use super::{evaluate, health, session, stackstorm};
use crate::error::ErrorResponse;

/// OpenAPI documentation for the Orquestulator API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Orquestulator API",
        description = "Expression sandbox for StackStorm Orquesta, YAQL and Jinja2",
        version = "1.0.0",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Local server"),
    ),
    paths(
        // Health
        health::health,
        health::banner,
        // Session
        session::authenticate_handler,
        session::status_handler,
        session::get_data_handler,
        session::store_data_handler,
        session::count_handler,
        // Evaluate
        evaluate::evaluate_handler,
        // StackStorm
        stackstorm::get_connection_handler,
        stackstorm::set_connection_handler,
        stackstorm::test_connection_handler,
        stackstorm::list_executions_handler,
        stackstorm::get_execution_handler,
    ),
    components(
        schemas(
            ErrorResponse,
            // Health
            health::HealthResponse,
            health::BannerResponse,
            // Session
            session::AuthRequest,
            session::AuthResponse,
            session::AuthStatusResponse,
            session::SessionDataRequest,
            session::SessionDataResponse,
            session::SessionCountResponse,
            // Evaluate
            evaluate::EvaluateRequest,
            evaluate::EvaluateResponse,
            // StackStorm
            stackstorm::ConnectionSummary,
            stackstorm::CustomConnectionSummary,
            stackstorm::ConnectionsResponse,
            stackstorm::CustomConnectionRequest,
            stackstorm::ConnectionRequest,
            stackstorm::ConnectionStatusResponse,
            stackstorm::ExecutionsResponse,
            stackstorm::ExecutionResponse,
        )
    ),
    modifiers(&SessionCookieAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Authentication and per-session data"),
        (name = "evaluate", description = "Expression evaluation"),
        (name = "stackstorm", description = "StackStorm connections and executions"),
    )
)]
pub struct ApiDoc;

/// Add the session cookie security scheme.
struct SessionCookieAddon;

impl utoipa::Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Cookie(
                        utoipa::openapi::security::ApiKeyValue::new("session_id"),
                    ),
                ),
            );
        }
    }
}

/// Serve the OpenAPI document.
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
