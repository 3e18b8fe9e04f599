use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::SessionUser;
use crate::identity::{ProfileChanges, User, AVATAR_IDS};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).patch(edit_profile))
        .route("/avatars", get(avatars))
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub display_name: Option<String>,
    pub avatar_id: Option<String>,
    pub new_password: Option<String>,
}

async fn me(SessionUser(session): SessionUser) -> Json<User> {
    Json(session.user)
}

async fn edit_profile(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    Json(req): Json<ProfileRequest>,
) -> AppResult<Json<User>> {
    let changes = ProfileChanges {
        display_name: req.display_name,
        avatar_id: req.avatar_id,
        new_password: req.new_password,
    };
    let user = state.identity.update_profile(&session, changes).await?;
    Ok(Json(user))
}

async fn avatars() -> Json<Vec<&'static str>> {
    Json(AVATAR_IDS.to_vec())
}
