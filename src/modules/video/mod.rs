use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

pub mod dto;
pub mod events;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024 * 1024;

pub fn router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/videos", get(handler::list_videos))
        .route("/videos/{id}", get(handler::get_video))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::optional_auth_middleware,
        ));

    let admin_routes = Router::new()
        .route(
            "/videos/upload",
            post(handler::upload_video)
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES)),
        )
        .route("/videos/{id}/transcode", post(handler::request_transcode))
        .route_layer(middleware::from_fn(crate::middleware::role::admin_guard))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ));

    public_routes.merge(admin_routes)
}
