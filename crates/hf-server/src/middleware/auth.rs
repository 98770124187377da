//! API-key authentication.
//!
//! When `auth.api_key` is configured, protected routes accept the key in any
//! of the header forms media-server clients send:
//!
//! 1. `Authorization: MediaBrowser ..., Token="<key>"` (also `Emby ...`)
//! 2. `X-Emby-Token: <key>`
//! 3. `Authorization: Bearer <key>`

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use hf_core::config::AuthConfig;

use crate::context::AppContext;
use crate::error::AppError;

/// Check raw header values against the configured key.
///
/// Always succeeds when auth is disabled.
pub fn validate_auth_headers(
    auth_config: &AuthConfig,
    authorization: Option<&str>,
    x_emby_token: Option<&str>,
) -> bool {
    let Some(ref api_key) = auth_config.api_key else {
        return true;
    };

    if let Some(auth_value) = authorization {
        if auth_value.starts_with("MediaBrowser ") || auth_value.starts_with("Emby ") {
            if extract_mediabrowser_token(auth_value).as_deref() == Some(api_key.as_str()) {
                return true;
            }
        }
    }

    if x_emby_token == Some(api_key.as_str()) {
        return true;
    }

    authorization
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == api_key)
}

/// Extract the Token value from a MediaBrowser/Emby authorization header.
/// Format: `MediaBrowser Client="...", Device="...", Token="<token>"`
pub fn extract_mediabrowser_token(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let part = part.trim();
        let part = part
            .strip_prefix("MediaBrowser ")
            .or_else(|| part.strip_prefix("Emby "))
            .unwrap_or(part);
        part.strip_prefix("Token=")
            .map(|rest| rest.trim_matches('"').to_string())
    })
}

/// Rejects requests without a valid key. Applied to protected routes only.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let x_emby_token = request
        .headers()
        .get("X-Emby-Token")
        .and_then(|v| v.to_str().ok());

    if validate_auth_headers(&ctx.config.auth, authorization, x_emby_token) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated request");
    AppError::new(hf_core::Error::Unauthorized("missing or invalid API key".into()))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> AuthConfig {
        AuthConfig {
            api_key: Some("s3cret".into()),
        }
    }

    #[test]
    fn disabled_auth_accepts_everything() {
        assert!(validate_auth_headers(&AuthConfig::default(), None, None));
    }

    #[test]
    fn bearer_token() {
        assert!(validate_auth_headers(&enabled(), Some("Bearer s3cret"), None));
        assert!(!validate_auth_headers(&enabled(), Some("Bearer nope"), None));
    }

    #[test]
    fn emby_token_header() {
        assert!(validate_auth_headers(&enabled(), None, Some("s3cret")));
        assert!(!validate_auth_headers(&enabled(), None, Some("other")));
    }

    #[test]
    fn mediabrowser_authorization() {
        let header = r#"MediaBrowser Client="Infuse", Device="tv", DeviceId="abc", Token="s3cret""#;
        assert!(validate_auth_headers(&enabled(), Some(header), None));
        let bad = r#"MediaBrowser Client="Infuse", Token="wrong""#;
        assert!(!validate_auth_headers(&enabled(), Some(bad), None));
    }

    #[test]
    fn missing_credentials_rejected() {
        assert!(!validate_auth_headers(&enabled(), None, None));
    }

    #[test]
    fn token_as_first_field() {
        assert_eq!(
            extract_mediabrowser_token(r#"MediaBrowser Token="abc""#).as_deref(),
            Some("abc")
        );
        assert_eq!(extract_mediabrowser_token("MediaBrowser Client=\"x\""), None);
    }
}
