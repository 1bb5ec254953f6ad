//! Bearer-token verification for the external auth provider.
//!
//! Session issuance, refresh and role administration live outside this
//! service; all that remains here is validating the JWT the storefront
//! forwards and exposing the caller's identity to handlers.

use crate::errors::ApiError;
use crate::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Claims carried by the auth provider's tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// User email, forwarded to payment gateways as customer contact
    pub email: String,
    /// Display name, when the provider includes one
    #[serde(default)]
    pub name: Option<String>,
    /// Expiry (seconds since epoch)
    pub exp: usize,
}

/// The authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl AuthenticatedUser {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.email.clone())
    }
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthorized)
}

/// Issue a token for the given claims. Test and tooling helper; production
/// tokens come from the external provider.
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, ApiError> {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| ApiError::InternalServerError)
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
        let claims = verify_token(token, &state.config.jwt_secret)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

    fn claims(exp_offset_secs: i64) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "reader@example.com".to_string(),
            name: Some("Test Reader".to_string()),
            exp: (Utc::now().timestamp() + exp_offset_secs) as usize,
        }
    }

    #[test]
    fn round_trips_a_valid_token() {
        let claims = claims(3600);
        let token = issue_token(&claims, SECRET).unwrap();
        let verified = verify_token(&token, SECRET).unwrap();
        assert_eq!(verified.sub, claims.sub);
        assert_eq!(verified.email, "reader@example.com");
    }

    #[test]
    fn rejects_expired_tokens() {
        let claims = claims(-3600);
        let token = issue_token(&claims, SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = issue_token(&claims(3600), SECRET).unwrap();
        assert!(verify_token(&token, "another_secret_that_is_long_enough_here").is_err());
    }
}
