use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::activity::{Activity, ActivityDraft, ActivityId, ActivityPatch};
use crate::error::{AppError, AppResult};
use crate::extractors::SessionUser;
use crate::identity::UserId;
use crate::images::ImageUpload;
use crate::state::AppState;
use crate::time_utils;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activities", get(list).post(create))
        .route(
            "/activities/{id}",
            get(fetch).patch(update).delete(remove),
        )
}

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub user: Option<String>,
    #[serde(default)]
    pub all: bool,
}

/// Which owner a listing or feed is scoped to. An explicit `user` wins,
/// `all` drops the filter, and the default is the caller's own entries.
pub(crate) fn owner_filter(
    user: Option<&str>,
    all: bool,
    session_user: &UserId,
) -> Option<UserId> {
    match user.map(str::trim).filter(|u| !u.is_empty()) {
        Some(u) => Some(UserId::new(u)),
        None if all => None,
        None => Some(session_user.clone()),
    }
}

/// Text and file parts of an activity form.
#[derive(Default)]
struct ActivityForm {
    name: Option<String>,
    category: Option<String>,
    duration_minutes: Option<i64>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    timezone: Option<String>,
    remove_image: bool,
    image: Option<ImageUpload>,
}

fn non_blank(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_form(mut multipart: Multipart) -> AppResult<ActivityForm> {
    let mut form = ActivityForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await?;
            // Browsers send an empty, unnamed part when no file was chosen
            if data.is_empty() && file_name.as_deref().map_or(true, str::is_empty) {
                continue;
            }
            form.image = Some(ImageUpload {
                data,
                file_name,
                content_type,
            });
            continue;
        }

        let Some(value) = non_blank(field.text().await?) else {
            continue;
        };
        match name.as_str() {
            "name" => form.name = Some(value),
            "category" => form.category = Some(value),
            "duration_minutes" => {
                form.duration_minutes = Some(value.parse().map_err(|_| {
                    AppError::Validation("Duration must be a whole number of minutes".into())
                })?)
            }
            "date" => {
                form.date = Some(NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(
                    |_| AppError::Validation(format!("Invalid date: {}", value)),
                )?)
            }
            "time" => {
                form.time = Some(
                    time_utils::parse_time_of_day(&value)
                        .ok_or_else(|| AppError::Validation(format!("Invalid time: {}", value)))?,
                )
            }
            "timezone" => form.timezone = Some(value),
            "remove_image" => form.remove_image = matches!(value.as_str(), "true" | "on" | "1"),
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

async fn list(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Activity>>> {
    let owner = owner_filter(query.user.as_deref(), query.all, &session.user.user_id);
    let activities = state.activities.list_activities(owner.as_ref()).await?;
    Ok(Json(activities))
}

async fn create(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = read_form(multipart).await?;
    let draft = ActivityDraft {
        name: form.name.unwrap_or_default(),
        category: form.category.unwrap_or_default(),
        duration_minutes: form.duration_minutes.unwrap_or(0),
        date: form.date,
        time: form.time,
        timezone: form.timezone,
    };

    let activity = state
        .activities
        .create_activity(&session, draft, form.image)
        .await?;
    Ok((StatusCode::CREATED, Json(activity)).into_response())
}

async fn fetch(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    Path(id): Path<String>,
) -> AppResult<Json<Activity>> {
    let activity = state
        .activities
        .get_activity(&session, &ActivityId::new(id))
        .await?;
    Ok(Json(activity))
}

async fn update(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<Activity>> {
    let form = read_form(multipart).await?;
    let patch = ActivityPatch {
        name: form.name,
        category: form.category,
        duration_minutes: form.duration_minutes,
        date: form.date,
        time: form.time,
        timezone: form.timezone,
        remove_image: form.remove_image,
    };

    let activity = state
        .activities
        .update_activity(&session, &ActivityId::new(id), patch, form.image)
        .await?;
    Ok(Json(activity))
}

async fn remove(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .activities
        .delete_activity(&session, &ActivityId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_filter_defaults_to_caller() {
        let me = UserId::new("alex");
        assert_eq!(owner_filter(None, false, &me), Some(me.clone()));
        assert_eq!(owner_filter(Some("  "), false, &me), Some(me.clone()));
        assert_eq!(owner_filter(None, true, &me), None);
        assert_eq!(
            owner_filter(Some("sam"), true, &me),
            Some(UserId::new("sam"))
        );
    }
}
