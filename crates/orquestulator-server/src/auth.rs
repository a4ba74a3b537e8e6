//! Session authentication.
//!
//! A client authenticates once with the shared passphrase and receives an
//! opaque session cookie. Protected routes resolve that cookie through the
//! session store; a missing, unknown or expired session always produces the
//! same 401 response.
//!
//! # Security
//!
//! Passphrase comparison uses constant-time comparison to prevent timing attacks.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use orquestulator_config::SameSitePolicy;
use orquestulator_session::{SessionId, SessionInfo};
use subtle::ConstantTimeEq;

use crate::config::{CookieSettings, ServerConfig};
use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Current Session
// ─────────────────────────────────────────────────────────────────────────────

/// The session attached to a request by [`session_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub info: SessionInfo,
}

impl CurrentSession {
    pub fn id(&self) -> &str {
        self.info.id.as_str()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Security Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Compare two strings in constant time.
///
/// Differing lengths still perform a comparison of equal cost before
/// returning false.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Check a submitted passphrase against the configured one.
///
/// Always succeeds when the server does not require a passphrase.
pub fn verify_passphrase(config: &ServerConfig, submitted: Option<&str>) -> bool {
    if !config.passphrase_required {
        return true;
    }
    match submitted {
        Some(submitted) => constant_time_eq(submitted, &config.passphrase),
        None => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cookies
// ─────────────────────────────────────────────────────────────────────────────

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::None => SameSite::None,
    }
}

/// Build the `HttpOnly` cookie that carries a session token.
pub fn session_cookie(settings: &CookieSettings, id: SessionId) -> Cookie<'static> {
    let max_age = time::Duration::try_from(settings.max_age).unwrap_or(time::Duration::MAX);
    Cookie::build((settings.name.clone(), id.into_inner()))
        .path("/")
        .http_only(true)
        // Browsers reject SameSite=None without Secure.
        .secure(settings.secure || settings.same_site == SameSitePolicy::None)
        .same_site(same_site(settings.same_site))
        .max_age(max_age)
        .build()
}

/// The session token sent with a request, if any.
pub fn session_token<'a>(jar: &'a CookieJar, settings: &CookieSettings) -> Option<&'a str> {
    jar.get(&settings.name)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Session middleware function.
///
/// Resolves the session cookie, records activity, and injects the
/// [`CurrentSession`] into request extensions.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = session_token(&jar, &state.config.cookie).ok_or(ServerError::Unauthorized)?;
    let info = state.sessions.touch(token).await?;

    request.extensions_mut().insert(CurrentSession { info });

    Ok(next.run(request).await)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Extension, Router,
        http::{Request, StatusCode, header::COOKIE},
        middleware,
        routing::get,
    };
    use orquestulator_config::ConnectionsFile;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        AppState::in_memory(ServerConfig::new(Some("pw".into())), ConnectionsFile::default())
            .unwrap()
    }

    async fn protected_handler(Extension(session): Extension<CurrentSession>) -> String {
        session.id().to_string()
    }

    fn create_test_router(state: AppState) -> Router {
        Router::new()
            .route("/protected", get(protected_handler))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                session_middleware,
            ))
            .with_state(state)
    }

    async fn request(app: Router, cookie: Option<String>) -> Response {
        let mut builder = Request::builder().uri("/protected");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secret-longer"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_verify_passphrase() {
        let config = ServerConfig::new(Some("pw".into()));
        assert!(verify_passphrase(&config, Some("pw")));
        assert!(!verify_passphrase(&config, Some("nope")));
        assert!(!verify_passphrase(&config, None));

        let open = ServerConfig::new(None);
        assert!(verify_passphrase(&open, None));
        assert!(verify_passphrase(&open, Some("anything")));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&CookieSettings::default(), SessionId::from("abc".to_string()));
        assert_eq!(cookie.name(), "session_id");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(4)));

        let settings = CookieSettings {
            same_site: SameSitePolicy::None,
            ..Default::default()
        };
        let cookie = session_cookie(&settings, SessionId::from("abc".to_string()));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[tokio::test]
    async fn test_valid_session_passes() {
        let state = create_test_state();
        let id = state.sessions.create_session().await;
        let app = create_test_router(state);

        let response = request(app, Some(format!("session_id={id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, id.as_str().as_bytes());
    }

    #[tokio::test]
    async fn test_missing_and_unknown_sessions_match() {
        let state = create_test_state();
        let app = create_test_router(state);

        let missing = request(app.clone(), None).await;
        let unknown = request(app, Some("session_id=forged".into())).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        let missing = axum::body::to_bytes(missing.into_body(), usize::MAX)
            .await
            .unwrap();
        let unknown = axum::body::to_bytes(unknown.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(missing, unknown);
    }
}
