use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::response::ApiError;
use crate::state::AppState;

pub const ADMIN_ROLE: &str = "ADMIN";

/// Claims of an access token issued by the account service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

impl TokenClaims {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

fn unauthorized(message: &str) -> ApiError {
    ApiError(format!("Unauthorized: {}", message), StatusCode::UNAUTHORIZED)
}

pub fn verify_token(token: &str, secret: &str) -> Result<TokenClaims, ApiError> {
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| unauthorized("Invalid token"))
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Verify the bearer token and expose its claims to handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or_else(|| unauthorized("Missing or invalid token"))?;

    let claims = verify_token(token, &state.config.jwt_secret)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Like `auth_middleware`, but lets anonymous requests through without
/// claims. A token that is present must still be valid.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if req.headers().contains_key(header::AUTHORIZATION) {
        let token = bearer_token(&req).ok_or_else(|| unauthorized("Missing or invalid token"))?;
        let claims = verify_token(token, &state.config.jwt_secret)?;
        req.extensions_mut().insert(claims);
    }

    Ok(next.run(req).await)
}
