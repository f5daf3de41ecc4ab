use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::modules::progress::dto::UpdateProgressRequest;
use crate::modules::progress::model::WatchProgress;
use crate::modules::video::dto::{SubmitResponse, SubmitResult, UploadResponse, VideoResponse};
use crate::modules::video::model::VideoStatus;
use crate::transcode::FailureReason;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::list_videos,
        crate::modules::video::handler::get_video,
        crate::modules::video::handler::upload_video,
        crate::modules::video::handler::request_transcode,
        crate::modules::progress::handler::get_progress,
        crate::modules::progress::handler::update_progress,
    ),
    components(
        schemas(
            VideoResponse, VideoStatus, FailureReason, UploadResponse,
            SubmitResponse, SubmitResult,
            WatchProgress, UpdateProgressRequest,
        )
    ),
    tags(
        (name = "Videos", description = "Video catalog and transcoding"),
        (name = "Progress", description = "Per-user watch progress")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
