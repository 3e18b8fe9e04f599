use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::{ProxyPrincipal, SessionUser};
use crate::identity::User;
use crate::state::AppState;

// -- Request / response types --

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub user_id: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_id: String,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse<'a> {
    pub user: &'a User,
    pub expires_at: &'a str,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

/// Open a session for `user` and answer with its cookie.
fn start_session(state: &AppState, user: User, status: StatusCode) -> AppResult<Response> {
    let hours = state.config.auth.session_hours;
    let session = session::create_session(&state.db, user, hours)?;
    let cookie = session_cookie(&state.config.auth.cookie_name, &session.token, hours);

    let body = SessionResponse {
        user: &session.user,
        expires_at: &session.expires_at,
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

// -- Handlers --

/// POST /auth/signup - create a local account and sign it in
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> AppResult<Response> {
    let user = state
        .identity
        .create_user(&req.user_id, &req.password, &req.display_name, &req.avatar_id)
        .await?;
    start_session(&state, user, StatusCode::CREATED)
}

/// POST /auth/signin - exchange a local credential pair for a session
pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> AppResult<Response> {
    let user = match state.identity.authenticate(&req.user_id, &req.password).await {
        Ok(user) => user,
        Err(AppError::NotFound) => {
            tracing::info!(user_id = %req.user_id.trim(), "Sign-in for unknown user");
            return Err(AppError::InvalidCredential);
        }
        Err(AppError::InvalidCredential) => {
            tracing::info!(user_id = %req.user_id.trim(), "Sign-in with wrong password");
            return Err(AppError::InvalidCredential);
        }
        Err(e) => return Err(e),
    };
    start_session(&state, user, StatusCode::OK)
}

/// POST /auth/principal - reconcile a proxy-asserted principal into a session
pub async fn principal(
    State(state): State<AppState>,
    ProxyPrincipal(principal): ProxyPrincipal,
) -> AppResult<Response> {
    let user = state.identity.resolve_or_create_user(&principal).await?;
    start_session(&state, user, StatusCode::OK)
}

/// POST /auth/signout - invalidate the current session
pub async fn signout(
    State(state): State<AppState>,
    SessionUser(current): SessionUser,
) -> AppResult<Response> {
    session::sign_out(&state.db, current)?;
    Ok((
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
    )
        .into_response())
}
