use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::SessionUser;
use crate::feed::{self, DailyCategoryTotal, GalleryItem};
use crate::identity::UserId;
use crate::state::AppState;
use crate::time_utils;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed/chart", get(chart))
        .route("/feed/gallery", get(gallery))
}

/// Feed queries cover every user unless `user` narrows them.
#[derive(Deserialize, Default)]
pub struct FeedQuery {
    pub user: Option<String>,
    pub tz: Option<String>,
    /// Return the full day x category grid instead of sparse totals
    #[serde(default)]
    pub dense: bool,
}

impl FeedQuery {
    fn user(&self) -> Option<UserId> {
        self.user
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(UserId::new)
    }

    fn timezone(&self) -> AppResult<Option<Tz>> {
        time_utils::parse_timezone(self.tz.as_deref()).map_err(AppError::Validation)
    }
}

async fn chart(
    State(state): State<AppState>,
    SessionUser(_session): SessionUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<Vec<DailyCategoryTotal>>> {
    let tz = query.timezone()?;
    let user = query.user();
    let activities = state.activities.list_activities(user.as_ref()).await?;

    let totals = feed::aggregate_minutes_by_day_and_category(&activities, user.as_ref(), tz);
    if query.dense {
        return Ok(Json(feed::densify(&totals)));
    }
    Ok(Json(totals))
}

async fn gallery(
    State(state): State<AppState>,
    SessionUser(_session): SessionUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<Vec<GalleryItem>>> {
    let tz = query.timezone()?;
    let user = query.user();
    let activities = state.activities.list_activities(user.as_ref()).await?;
    Ok(Json(feed::image_gallery(&activities, user.as_ref(), tz)))
}
