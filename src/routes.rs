use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::state::AppState;

pub fn configure_routes(state: AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // HLS players fetch the master, variants and segments from here.
    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes(state))
        .nest_service("/media", media)
        .layer(cors)
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(crate::modules::video::router(state.clone()))
        .merge(crate::modules::progress::router(state))
}
