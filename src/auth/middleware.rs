//! Auth middleware for Axum routes.
//!
//! Validates JWTs and injects Claims into request extensions.
//! Implements deny-by-default: if `auth_config` is None, all requests are rejected.

use crate::api::handlers::{ApiState, AppError};
use crate::auth::jwt::decode_jwt;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Cookie carrying the JWT for browser WebSocket upgrades
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Extract a named cookie value from a `Cookie` header
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookie_header
        .split(';')
        .filter_map(|part| part.trim().strip_prefix(&prefix))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(String::from)
}

/// Bearer header first, then the `access_token` cookie
fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    if let Some(auth_header) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        return auth_header
            .strip_prefix("Bearer ")
            .map(String::from)
            .ok_or_else(|| {
                AppError::Unauthorized("Invalid Authorization header format".to_string())
            });
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| cookie_value(cookies, ACCESS_TOKEN_COOKIE))
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))
}

/// Middleware that requires a valid JWT.
///
/// # Behavior
/// 1. If `auth_config` is `None` → 403 Forbidden (deny-by-default)
/// 2. Take the token from `Authorization: Bearer` or the `access_token` cookie → 401 if missing
/// 3. Validate JWT with the configured secret → 401 if invalid/expired
/// 4. Inject `Claims` into request extensions for downstream handlers
pub async fn require_auth(
    State(state): State<ApiState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_config = state.auth_config.as_ref().ok_or_else(|| {
        AppError::Forbidden("Authentication not configured — access denied".to_string())
    })?;

    let token = extract_token(req.headers())?;

    let claims = decode_jwt(&token, &auth_config.jwt_secret)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{encode_jwt, Claims};
    use crate::neo4j::mock::MockGraphStore;
    use crate::test_helpers::{mock_api_state, test_auth_config, TEST_JWT_SECRET};
    use crate::AuthConfig;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`
    use uuid::Uuid;

    fn test_app(auth_config: Option<AuthConfig>) -> Router {
        let state = mock_api_state(Arc::new(MockGraphStore::new()), auth_config);

        async fn ok_handler() -> &'static str {
            "ok"
        }

        Router::new()
            .route("/test", get(ok_handler))
            .layer(from_fn_with_state(state.clone(), require_auth))
            .with_state(state)
    }

    fn get_test(header: Option<(&str, String)>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/test");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_cookie_value() {
        assert_eq!(
            cookie_value("theme=dark; access_token=abc.def ; x=1", "access_token").as_deref(),
            Some("abc.def")
        );
        assert_eq!(cookie_value("access_token=", "access_token"), None);
        assert_eq!(cookie_value("my_access_token=zzz", "access_token"), None);
    }

    #[tokio::test]
    async fn test_no_auth_config_returns_403() {
        let resp = test_app(None).oneshot(get_test(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_no_credentials_returns_401() {
        let resp = test_app(Some(test_auth_config()))
            .oneshot(get_test(None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_token_returns_401() {
        let resp = test_app(Some(test_auth_config()))
            .oneshot(get_test(Some((
                "authorization",
                "Bearer invalid.token.here".to_string(),
            ))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_token_returns_401() {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            username: "late".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .unwrap();

        let resp = test_app(Some(test_auth_config()))
            .oneshot(get_test(Some(("authorization", format!("Bearer {}", token)))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_bearer_passes() {
        let token = encode_jwt(Uuid::new_v4(), "alice", TEST_JWT_SECRET, 3600).unwrap();
        let resp = test_app(Some(test_auth_config()))
            .oneshot(get_test(Some(("authorization", format!("Bearer {}", token)))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_valid_cookie_passes() {
        let token = encode_jwt(Uuid::new_v4(), "alice", TEST_JWT_SECRET, 3600).unwrap();
        let resp = test_app(Some(test_auth_config()))
            .oneshot(get_test(Some((
                "cookie",
                format!("theme=dark; access_token={}", token),
            ))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_returns_401() {
        let resp = test_app(Some(test_auth_config()))
            .oneshot(get_test(Some(("authorization", "Basic dXNlcjpwYXNz".to_string()))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
