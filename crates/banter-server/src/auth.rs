//! Stateless credential validation.
//!
//! Tokens are issued by the external auth service; this module only
//! verifies them. The same check runs at two points: once when a
//! connection presents a credential in the WebSocket handshake, and
//! independently on every REST request that names an authenticated
//! operation.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use banter_shared::types::{Principal, UserId};

use crate::error::ServerError;

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric principal id.
    pub sub: i64,
    pub username: String,
    #[serde(default = "default_role")]
    pub role: String,
    /// Expiry as a unix timestamp.
    pub exp: usize,
}

fn default_role() -> String {
    "user".to_string()
}

/// Validate a token and return the principal it names.
pub fn verify_token(token: &str, secret: &str) -> Result<Principal, ServerError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ServerError::Unauthorized(format!("Invalid token: {e}")))?;

    Ok(Principal {
        id: UserId(data.claims.sub),
        username: data.claims.username,
        role: data.claims.role,
    })
}

/// Extract the bearer token from an `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Per-request credential check for authenticated REST operations.
pub fn require_auth(headers: &HeaderMap, jwt_secret: &str) -> Result<Principal, ServerError> {
    let token =
        bearer_token(headers).ok_or_else(|| ServerError::Unauthorized("Missing token".into()))?;
    verify_token(token, jwt_secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn make_token(sub: i64, exp_offset_secs: i64, secret: &str) -> String {
        let claims = Claims {
            sub,
            username: "alice".to_string(),
            role: "user".to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset_secs) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_principal() {
        let token = make_token(7, 3600, SECRET);
        let principal = verify_token(&token, SECRET).unwrap();
        assert_eq!(principal.id, UserId(7));
        assert_eq!(principal.username, "alice");
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = make_token(7, -86_400, SECRET);
        assert!(matches!(
            verify_token(&token, SECRET),
            Err(ServerError::Unauthorized(_))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = make_token(7, 3600, "other-secret");
        assert!(matches!(
            verify_token(&token, SECRET),
            Err(ServerError::Unauthorized(_))
        ));
    }

    #[test]
    fn missing_header_is_rejected() {
        let headers = HeaderMap::new();
        assert!(matches!(
            require_auth(&headers, SECRET),
            Err(ServerError::Unauthorized(_))
        ));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        headers.insert(
            "authorization",
            format!("Bearer {}", make_token(7, 3600, SECRET)).parse().unwrap(),
        );
        assert!(bearer_token(&headers).is_some());
    }
}
