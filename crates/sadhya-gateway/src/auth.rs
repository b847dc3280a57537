// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer authentication for the admin routes.
//!
//! When no admin token is configured, all admin requests are rejected
//! (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Both sides are reduced to fixed-length tags under this key, so the
/// comparison takes the same time whatever the presented token is.
const COMPARE_KEY: &[u8] = b"sadhya-admin-bearer";

/// Authentication configuration for the gateway.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Expected bearer token. `None` disables the admin API.
    pub bearer_token: Option<String>,
}

impl AuthConfig {
    pub fn bearer(token: Option<String>) -> Self {
        Self {
            bearer_token: token.filter(|t| !t.is_empty()),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Middleware that validates `Authorization: Bearer <token>`.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected_token) = auth.bearer_token.as_deref() else {
        tracing::warn!("admin API has no token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if tokens_match(token, expected_token) => Ok(next.run(request).await),
        _ => {
            tracing::debug!(path = %request.uri().path(), "admin request with bad credentials");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn tag(value: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(COMPARE_KEY).ok()?;
    mac.update(value.as_bytes());
    Some(mac)
}

/// Constant-time token equality.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (Some(presented), Some(expected)) = (tag(presented), tag(expected)) else {
        return false;
    };
    presented
        .verify_slice(&expected.finalize().into_bytes())
        .is_ok()
}
