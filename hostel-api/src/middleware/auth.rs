use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use hostel_core::user::{Actor, Role};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// JWT Claims
// ============================================================================

/// Tokens are issued by the account service; this API only verifies them.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub exp: usize,
}

/// The verified caller, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Actor);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Unknown role {0}")]
    UnknownRole(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::AuthenticationError(err.to_string())
    }
}

pub fn verify_token(secret: &str, token: &str) -> Result<Actor, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AuthError::InvalidToken)?;

    let claims = data.claims;
    let role: Role = claims.role.parse().map_err(|_| AuthError::UnknownRole(claims.role.clone()))?;
    Ok(Actor {
        id: claims.sub,
        email: claims.email,
        name: claims.name,
        role,
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(b)| b.token().to_string())
}

/// Resolves the caller when a valid token is present. Public routes that
/// show more to owners use this; a bad token is treated as anonymous.
pub fn optional_actor(state: &AppState, headers: &HeaderMap) -> Option<Actor> {
    let token = bearer(headers)?;
    verify_token(&state.auth.secret, &token).ok()
}

// ============================================================================
// Authentication Middleware
// ============================================================================

pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let token = bearer(req.headers()).ok_or(AuthError::MissingToken)?;
    let actor = verify_token(&state.auth.secret, &token)?;

    req.extensions_mut().insert(AuthUser(actor));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(role: &str, exp: usize) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "ama@example.com".into(),
            name: "Ama".into(),
            role: role.into(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn in_an_hour() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_valid_token_yields_actor() {
        let actor = verify_token(SECRET, &token("landlord", in_an_hour())).unwrap();
        assert_eq!(actor.role, Role::Landlord);
        assert_eq!(actor.email, "ama@example.com");
    }

    #[test]
    fn test_expired_token_rejected() {
        let expired = (chrono::Utc::now().timestamp() - 3600) as usize;
        assert!(matches!(verify_token(SECRET, &token("student", expired)), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        assert!(matches!(
            verify_token("other-secret", &token("student", in_an_hour())),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(matches!(
            verify_token(SECRET, &token("superuser", in_an_hour())),
            Err(AuthError::UnknownRole(_))
        ));
    }
}
