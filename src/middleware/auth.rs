use crate::errors::auth_error::AuthError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Auth context inserted into request extensions.
#[derive(Debug, Clone, Default)]
pub struct Auth {
    pub authenticated: bool,
    /// Set when the token arrived as a WebSocket subprotocol; the upgrade
    /// must echo it back.
    pub subprotocol: Option<String>,
}

impl Auth {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Where a presented token came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenSource {
    Header(String),
    Query(String),
    /// Every offered subprotocol; any one may be the token.
    Subprotocols(Vec<String>),
}

/// Extract authentication token candidates from the request
///
/// Supported sources, in priority order:
/// 1. Authorization header: `Authorization: Bearer <token>`
/// 2. Query parameter: `?token=<token>` (browser WebSocket clients)
/// 3. `Sec-WebSocket-Protocol` values (clients that can set neither)
fn extract_token(request: &Request) -> Result<TokenSource, AuthError> {
    if let Some(auth_header) = request.headers().get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            tracing::debug!("Token extracted from Authorization header");
            return Ok(TokenSource::Header(token.trim().to_string()));
        }
        return Err(AuthError::InvalidAuthHeader);
    }

    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" {
                tracing::debug!("Token extracted from query parameter");
                return Ok(TokenSource::Query(value.to_string()));
            }
        }
    }

    let offered = offered_subprotocols(request.headers());
    if !offered.is_empty() {
        tracing::debug!("Token candidates extracted from Sec-WebSocket-Protocol");
        return Ok(TokenSource::Subprotocols(offered));
    }

    Err(AuthError::MissingAuthHeader)
}

fn offered_subprotocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all("sec-websocket-protocol")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Constant-time token comparison.
pub fn token_matches(candidate: &str, expected: &str) -> bool {
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Shared-token authentication middleware
///
/// When no token is configured every request passes with an empty [`Auth`].
/// Otherwise the presented token must match, or the request is rejected
/// with 401 before any upgrade happens.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(expected) = state.config.auth_token.as_deref() else {
        tracing::debug!("Authentication disabled, inserting empty Auth context");
        request.extensions_mut().insert(Auth::empty());
        return Ok(next.run(request).await);
    };

    let request_method = request.method().to_string();
    let request_path = request.uri().path().to_string();

    let auth = match extract_token(&request)? {
        TokenSource::Header(token) | TokenSource::Query(token) => {
            token_matches(&token, expected).then(|| Auth {
                authenticated: true,
                subprotocol: None,
            })
        }
        TokenSource::Subprotocols(offered) => offered
            .into_iter()
            .find(|p| token_matches(p, expected))
            .map(|p| Auth {
                authenticated: true,
                subprotocol: Some(p),
            }),
    };

    match auth {
        Some(auth) => {
            tracing::info!(
                method = %request_method,
                path = %request_path,
                "Token authentication successful"
            );
            request.extensions_mut().insert(auth);
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(
                method = %request_method,
                path = %request_path,
                "Token authentication failed: token mismatch"
            );
            Err(AuthError::Unauthorized("Invalid token".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(builder: http::request::Builder) -> Request {
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_bearer() {
        let req = request(
            Request::builder()
                .uri("/ws")
                .header("authorization", "Bearer abc"),
        );
        assert_eq!(
            extract_token(&req).unwrap(),
            TokenSource::Header("abc".to_string())
        );
    }

    #[test]
    fn test_extract_malformed_header() {
        let req = request(
            Request::builder()
                .uri("/ws")
                .header("authorization", "Basic abc"),
        );
        assert!(matches!(
            extract_token(&req),
            Err(AuthError::InvalidAuthHeader)
        ));
    }

    #[test]
    fn test_extract_query_and_subprotocol() {
        let req = request(Request::builder().uri("/ws?sample_rate=8000&token=q1"));
        assert_eq!(
            extract_token(&req).unwrap(),
            TokenSource::Query("q1".to_string())
        );

        let req = request(
            Request::builder()
                .uri("/ws")
                .header("sec-websocket-protocol", "audio.v1, secret-token"),
        );
        assert_eq!(
            extract_token(&req).unwrap(),
            TokenSource::Subprotocols(vec!["audio.v1".to_string(), "secret-token".to_string()])
        );
    }

    #[test]
    fn test_missing_token() {
        let req = request(Request::builder().uri("/ws"));
        assert!(matches!(
            extract_token(&req),
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secret", "secreT"));
        assert!(!token_matches("secret", "secret-longer"));
        assert!(!token_matches("", "secret"));
    }
}
