// Repository pattern - isolates all activity-table side effects
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::activity::domain::*;
use crate::db::RepositoryError;
use crate::identity::domain::owner_label;
use crate::identity::UserId;
use crate::state::DbPool;
use crate::time_utils;

const ACTIVITY_SELECT: &str = "SELECT a.id, a.owner_user_id, COALESCE(u.display_name, ''),
            a.name, a.category, a.duration_minutes, a.occurred_at, a.image_url
     FROM activities a
     LEFT JOIN users u ON u.user_id = a.owner_user_id";

/// Repository trait - all activity-table operations
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn insert(&self, record: &ActivityRecord) -> Result<(), RepositoryError>;

    /// Overwrite an activity owned by `record.owner`. Returns false when no
    /// such activity exists for that owner.
    async fn update(&self, record: &ActivityRecord) -> Result<bool, RepositoryError>;

    async fn find(&self, id: &ActivityId) -> Result<Option<Activity>, RepositoryError>;

    /// Delete an activity owned by `owner`. Returns whether a row was removed.
    async fn delete(&self, id: &ActivityId, owner: &UserId) -> Result<bool, RepositoryError>;

    /// Activities newest first, optionally restricted to one owner.
    async fn list(&self, owner: Option<&UserId>) -> Result<Vec<Activity>, RepositoryError>;
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynActivityRepository = Arc<dyn ActivityRepository>;

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let id: String = row.get(0)?;
    let display_name: String = row.get(2)?;
    let category: String = row.get(4)?;
    let duration: i64 = row.get(5)?;
    let occurred_at: String = row.get(6)?;

    let occurred = time_utils::parse_stored_instant(&occurred_at);
    if occurred.is_none() {
        tracing::warn!(activity_id = %id, value = %occurred_at, "Unreadable activity timestamp");
    }

    Ok(Activity {
        id: ActivityId::new(id),
        owner: UserId::new(row.get::<_, String>(1)?),
        owner_label: owner_label(&display_name).to_string(),
        name: row.get(3)?,
        category: category.parse().unwrap_or(Category::Others),
        duration_minutes: u32::try_from(duration).unwrap_or(0),
        occurred_at: occurred,
        image_url: row.get(7)?,
    })
}

/// SQLite implementation
pub struct SqliteActivityRepository {
    pool: DbPool,
}

impl SqliteActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for SqliteActivityRepository {
    async fn insert(&self, record: &ActivityRecord) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO activities
               (id, owner_user_id, name, category, duration_minutes, occurred_at, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.as_str(),
                record.owner.as_str(),
                record.name,
                record.category.as_str(),
                record.duration_minutes,
                time_utils::format_utc_rfc3339(record.occurred_at),
                record.image_url,
            ],
        )
        .map_err(RepositoryError::from_write)?;
        Ok(())
    }

    async fn update(&self, record: &ActivityRecord) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE activities SET
                   name = ?1, category = ?2, duration_minutes = ?3,
                   occurred_at = ?4, image_url = ?5, updated_at = datetime('now')
                 WHERE id = ?6 AND owner_user_id = ?7",
                params![
                    record.name,
                    record.category.as_str(),
                    record.duration_minutes,
                    time_utils::format_utc_rfc3339(record.occurred_at),
                    record.image_url,
                    record.id.as_str(),
                    record.owner.as_str(),
                ],
            )
            .map_err(RepositoryError::from_write)?;
        Ok(rows > 0)
    }

    async fn find(&self, id: &ActivityId) -> Result<Option<Activity>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("{} WHERE a.id = ?1", ACTIVITY_SELECT);
        let activity = conn
            .query_row(&sql, params![id.as_str()], activity_from_row)
            .optional()?;
        Ok(activity)
    }

    async fn delete(&self, id: &ActivityId, owner: &UserId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM activities WHERE id = ?1 AND owner_user_id = ?2",
            params![id.as_str(), owner.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn list(&self, owner: Option<&UserId>) -> Result<Vec<Activity>, RepositoryError> {
        let conn = self.pool.get()?;
        let activities = match owner {
            Some(owner) => {
                let sql = format!(
                    "{} WHERE a.owner_user_id = ?1 ORDER BY a.occurred_at DESC, a.id DESC",
                    ACTIVITY_SELECT
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![owner.as_str()], activity_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("{} ORDER BY a.occurred_at DESC, a.id DESC", ACTIVITY_SELECT);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], activity_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(activities)
    }
}
