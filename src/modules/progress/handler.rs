use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use super::dto::UpdateProgressRequest;
use super::model::WatchProgress;
use super::service::{ProgressError, ProgressService};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::middleware::auth::TokenClaims;
use crate::state::AppState;

impl From<ProgressError> for ApiError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::VideoNotFound(_) => ApiError::not_found("Video not found"),
            ProgressError::Store(e) => ApiError::internal(e),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/progress",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Caller's progress, or null if never started", body = ApiResponse<WatchProgress>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Video Not Found")
    ),
    tag = "Progress",
    security(("bearer_auth" = []))
)]
pub async fn get_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(video_id): Path<Uuid>,
) -> impl IntoResponse {
    match ProgressService::get_progress(&state, claims.sub, video_id).await {
        Ok(Some(progress)) => {
            ApiSuccess(ApiResponse::success(progress, "Progress retrieved successfully"), StatusCode::OK).into_response()
        }
        Ok(None) => ApiSuccess(ApiResponse::<WatchProgress>::empty("No progress recorded"), StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/videos/{id}/progress",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    request_body = UpdateProgressRequest,
    responses(
        (status = 200, description = "Resulting progress record", body = ApiResponse<WatchProgress>),
        (status = 400, description = "Bad Request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Video Not Found")
    ),
    tag = "Progress",
    security(("bearer_auth" = []))
)]
pub async fn update_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(video_id): Path<Uuid>,
    Json(req): Json<UpdateProgressRequest>,
) -> impl IntoResponse {
    if let Err(e) = req.validate() {
        return ApiError::bad_request(e.to_string()).into_response();
    }

    match ProgressService::record_progress(&state, claims.sub, video_id, req.into()).await {
        Ok(progress) => {
            ApiSuccess(ApiResponse::success(progress, "Progress saved successfully"), StatusCode::OK).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
