use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response, Extension};

use super::auth::TokenClaims;
use crate::common::response::ApiError;

/// Must run after `auth_middleware`.
pub async fn admin_guard(
    Extension(claims): Extension<TokenClaims>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !claims.is_admin() {
        return Err(ApiError(
            "Forbidden: Admin access required".to_string(),
            StatusCode::FORBIDDEN,
        ));
    }

    Ok(next.run(req).await)
}
