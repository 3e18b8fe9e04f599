pub mod activities;
pub mod auth;
pub mod feed;
pub mod images;
pub mod profile;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Multipart framing on top of the largest accepted image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Full HTTP surface with tracing and the upload size limit applied.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.storage.max_image_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .merge(auth::router())
        .merge(profile::router())
        .merge(activities::router())
        .merge(feed::router())
        .merge(images::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
