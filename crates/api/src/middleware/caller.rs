//! Caller resolution for quota accounting.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use webopt_core::error::CoreError;
use webopt_core::hashing::{caller_fingerprint, sha256_hex};
use webopt_core::quota::Caller;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Header carrying a raw API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The caller behind a request.
///
/// Resolution order:
///
/// 1. `Authorization: Bearer <jwt>` -- a subscriber session. A present but
///    invalid token is rejected rather than downgraded to anonymous.
/// 2. `X-Api-Key: <key>` -- looked up by its SHA-256 digest.
/// 3. Otherwise anonymous, fingerprinted by client address and user agent.
#[derive(Debug, Clone)]
pub struct ResolvedCaller(pub Caller);

impl FromRequestParts<AppState> for ResolvedCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth_header) = parts.headers.get(AUTHORIZATION) {
            let token = auth_header
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    AppError::Core(CoreError::Unauthorized(
                        "Invalid Authorization format. Expected: Bearer <token>".into(),
                    ))
                })?;

            let claims = validate_token(token, &state.config.jwt).map_err(|_| {
                AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
            })?;

            return Ok(Self(Caller::Subscriber {
                account_id: claims.sub,
            }));
        }

        let fingerprint = fingerprint(parts);

        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty());

        Ok(Self(match api_key {
            Some(key) => Caller::ApiKey {
                key_hash: sha256_hex(key.as_bytes()),
                fingerprint,
            },
            None => Caller::Anonymous { fingerprint },
        }))
    }
}

fn fingerprint(parts: &Parts) -> String {
    let address = client_address(&parts.headers).unwrap_or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    });
    let user_agent = parts
        .headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    caller_fingerprint(&address, user_agent)
}

/// Client address as reported by a fronting proxy, if any.
fn client_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    forwarded.or_else(real_ip).map(str::to_string)
}
