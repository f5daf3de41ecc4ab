use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::dto::{SubmitResponse, UploadResponse, VideoResponse};
use super::model::NewVideo;
use super::service::VideoService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::{stream_to_file, stream_to_s3};
use crate::config::settings::SourceBackend;
use crate::middleware::auth::TokenClaims;
use crate::state::AppState;
use crate::transcode::{SubmitError, SubmitOutcome};

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::VideoNotFound(_) => ApiError::not_found(err.to_string()),
            SubmitError::Queue(_) | SubmitError::Guard(_) => {
                ApiError(err.to_string(), StatusCode::SERVICE_UNAVAILABLE)
            }
            SubmitError::Store(_) => ApiError::internal(err),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos",
    responses(
        (status = 200, description = "List Videos", body = ApiResponse<Vec<VideoResponse>>),
        (status = 401, description = "Invalid token"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos",
    security((), ("bearer_auth" = []))
)]
pub async fn list_videos(
    State(state): State<AppState>,
    claims: Option<Extension<TokenClaims>>,
) -> impl IntoResponse {
    let viewer = claims.map(|Extension(claims)| claims.sub);
    match VideoService::list_videos(&state, viewer).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Videos retrieved successfully"), StatusCode::OK).into_response(),
        Err(e) => ApiError::internal(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Get Video", body = ApiResponse<VideoResponse>),
        (status = 401, description = "Invalid token"),
        (status = 404, description = "Video Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos",
    security((), ("bearer_auth" = []))
)]
pub async fn get_video(
    State(state): State<AppState>,
    claims: Option<Extension<TokenClaims>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let viewer = claims.map(|Extension(claims)| claims.sub);
    match VideoService::get_video(&state, id, viewer).await {
        Ok(Some(res)) => ApiSuccess(ApiResponse::success(res, "Video retrieved successfully"), StatusCode::OK).into_response(),
        Ok(None) => ApiError::not_found("Video not found").into_response(),
        Err(e) => ApiError::internal(e).into_response(),
    }
}

/// Text fields of the upload form.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UploadForm {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

fn safe_file_name(name: Option<&str>, fallback: &str) -> String {
    let cleaned: String = name
        .unwrap_or(fallback)
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(fallback)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

async fn store_field(
    state: &AppState,
    field: axum::extract::multipart::Field<'_>,
    location: String,
    expected_prefix: &str,
) -> anyhow::Result<String> {
    match (&state.config.source_backend, &state.storage) {
        (SourceBackend::S3, Some(storage)) => stream_to_s3(storage, field, location, expected_prefix).await,
        (SourceBackend::S3, None) => Err(anyhow::anyhow!("Object storage is not configured")),
        (SourceBackend::Local, _) => {
            stream_to_file(&state.config.media_root, field, location, expected_prefix).await
        }
    }
}

/// Remove files stored for an upload that was rejected.
async fn discard_stored(state: &AppState, locations: &[String]) {
    for location in locations {
        let removed = match (&state.config.source_backend, &state.storage) {
            (SourceBackend::S3, Some(storage)) => storage.delete_object(location).await,
            (SourceBackend::S3, None) => Ok(()),
            (SourceBackend::Local, _) => tokio::fs::remove_file(state.config.media_root.join(location))
                .await
                .map_err(anyhow::Error::from),
        };
        if let Err(e) = removed {
            warn!(location = %location, error = %e, "Failed to remove rejected upload");
        }
    }
}

/// Reads the form, storing file fields as they arrive. Every stored
/// location is pushed to `stored`, even when a later field fails.
async fn read_upload_form(
    state: &AppState,
    multipart: &mut Multipart,
    stored: &mut Vec<String>,
) -> Result<NewVideo, ApiError> {
    let upload_id = Uuid::new_v4();
    let mut form = UploadForm::default();
    let mut source_location: Option<String> = None;
    let mut thumbnail_location: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(ApiError::bad_request(format!("Malformed multipart body: {}", e))),
        };

        match field.name().unwrap_or("") {
            "title" => match field.text().await {
                Ok(text) => form.title = text.trim().to_string(),
                Err(e) => return Err(ApiError::bad_request(e.to_string())),
            },
            "description" => match field.text().await {
                Ok(text) if !text.trim().is_empty() => form.description = Some(text),
                Ok(_) => {}
                Err(e) => return Err(ApiError::bad_request(e.to_string())),
            },
            "video" => {
                let name = safe_file_name(field.file_name(), "video.mp4");
                let location = format!("videos/originals/{}-{}", upload_id, name);
                info!("Starting upload {}: {}", upload_id, name);
                match store_field(state, field, location, "video/").await {
                    Ok(location) => {
                        stored.push(location.clone());
                        source_location = Some(location);
                    }
                    Err(e) => return Err(ApiError::bad_request(format!("Upload failed: {}", e))),
                }
            }
            "thumbnail" => {
                let name = safe_file_name(field.file_name(), "thumbnail.jpg");
                let location = format!("thumbnails/{}-{}", upload_id, name);
                match store_field(state, field, location, "image/").await {
                    Ok(location) => {
                        stored.push(location.clone());
                        thumbnail_location = Some(location);
                    }
                    Err(e) => return Err(ApiError::bad_request(format!("Thumbnail upload failed: {}", e))),
                }
            }
            other => warn!("Ignoring unknown upload field '{}'", other),
        }
    }

    if let Err(e) = form.validate() {
        return Err(ApiError::bad_request(e.to_string()));
    }
    let Some(source_location) = source_location else {
        return Err(ApiError::bad_request("No video field found in multipart request"));
    };

    Ok(NewVideo {
        title: form.title,
        description: form.description,
        source_location,
        thumbnail_location,
    })
}

/// Upload a source video
/// Multipart form: `title`, `description`, `video`, optional `thumbnail`.
#[utoipa::path(
    post,
    path = "/api/v1/videos/upload",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Video stored and submitted for transcoding", body = ApiResponse<UploadResponse>),
        (status = 400, description = "Bad Request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Stored but not queued")
    ),
    tag = "Videos",
    security(("bearer_auth" = []))
)]
pub async fn upload_video(State(state): State<AppState>, mut multipart: Multipart) -> impl IntoResponse {
    let mut stored = Vec::new();
    let new_video = match read_upload_form(&state, &mut multipart, &mut stored).await {
        Ok(video) => video,
        Err(e) => {
            discard_stored(&state, &stored).await;
            return e.into_response();
        }
    };

    match VideoService::register_upload(&state, new_video).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Video uploaded successfully"), StatusCode::CREATED).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Submit a video for (re)transcoding
#[utoipa::path(
    post,
    path = "/api/v1/videos/{id}/transcode",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 202, description = "Transcode job accepted", body = ApiResponse<SubmitResponse>),
        (status = 200, description = "A job for this video is already in flight", body = ApiResponse<SubmitResponse>),
        (status = 404, description = "Video Not Found"),
        (status = 503, description = "Queue unavailable")
    ),
    tag = "Videos",
    security(("bearer_auth" = []))
)]
pub async fn request_transcode(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match VideoService::request_transcode(&state, id).await {
        Ok(outcome) => {
            let (status, message) = match outcome {
                SubmitOutcome::Accepted(_) => (StatusCode::ACCEPTED, "Transcode job accepted"),
                SubmitOutcome::Deduplicated => (StatusCode::OK, "Transcode already in progress"),
            };
            ApiSuccess(ApiResponse::success(SubmitResponse::new(id, &outcome), message), status).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
