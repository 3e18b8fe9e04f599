use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use crate::auth::session::{self, Session};
use crate::error::AppError;
use crate::identity::Principal;
use crate::state::AppState;

/// The signed-in user's session. Returns 401 if no live session cookie is found.
#[derive(Debug, Clone)]
pub struct SessionUser(pub Session);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        session::load_session(&state.db, token)?
            .map(SessionUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// A principal asserted by the fronting proxy through request headers.
/// Only honoured when `auth.trust_proxy_headers` is enabled.
#[derive(Debug, Clone)]
pub struct ProxyPrincipal(pub Principal);

impl FromRequestParts<AppState> for ProxyPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = &state.config.auth;
        if !auth.trust_proxy_headers {
            tracing::warn!("Principal sign-in attempted without trusted proxy headers");
            return Err(AppError::Unauthorized);
        }

        let identity = header_value(&parts.headers, &auth.identity_header)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?;
        let email = header_value(&parts.headers, &auth.email_header);

        Ok(ProxyPrincipal(Principal::new(identity, email)))
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

pub(crate) fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (key, val) = cookie.split_once('=')?;
            if key.trim() == name {
                Some(val.trim())
            } else {
                None
            }
        })
        .filter(|v| !v.is_empty())
}
