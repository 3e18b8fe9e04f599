use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/images/{name}", get(serve))
}

/// Stored names are immutable, so responses can be cached for a long time.
async fn serve(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Response> {
    let data = state.images.get(&name).await?;
    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        data,
    )
        .into_response())
}
