use axum::{middleware, routing::get, Router};

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/videos/{id}/progress",
            get(handler::get_progress).put(handler::update_progress),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
