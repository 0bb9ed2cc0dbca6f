// src/api/auth.rs — Access guard: request headers -> verified caller

use axum::http::HeaderMap;

use crate::api::ApiState;
use crate::infra::errors::SessionError;
use crate::session::types::Caller;

/// Resolve the caller of a request.
///
/// The upstream auth proxy asserts the caller's provider id in the identity
/// header; when an API token is configured the proxy must also present it.
pub async fn resolve_caller(state: &ApiState, headers: &HeaderMap) -> Result<Caller, SessionError> {
    check_token(state.api_token.as_deref(), headers)?;

    let provider_id = headers
        .get(state.identity_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SessionError::Auth("missing caller identity".into()))?;

    let profile = state
        .profiles
        .find_profile_by_provider_id(provider_id)
        .await?
        .ok_or_else(|| SessionError::Auth("no profile for caller".into()))?;

    Ok(Caller::from_profile(&profile))
}

/// Verify the bearer token if one is configured.
fn check_token(expected: Option<&str>, headers: &HeaderMap) -> Result<(), SessionError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header.strip_prefix("Bearer ").unwrap_or("");

    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(SessionError::Auth("invalid or missing bearer token".into()))
    }
}

/// Constant-time byte comparison to prevent timing attacks on token auth.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_no_token_configured_allows_all() {
        assert!(check_token(None, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn test_token_must_match() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        assert!(check_token(Some("secret"), &headers).is_ok());
        assert!(check_token(Some("other!"), &headers).is_err());
        assert!(check_token(Some("secret"), &HeaderMap::new()).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
