// Repository pattern - isolates all user-table side effects
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::db::RepositoryError;
use crate::identity::domain::*;
use crate::state::DbPool;

/// Column list shared by every query that materializes a `User`.
pub(crate) const USER_COLUMNS: &str =
    "user_id, display_name, avatar_id, email, auth_identity, password_hash";

/// Field changes applied by a profile edit. `None` leaves a column untouched.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_id: Option<AvatarId>,
    pub password_hash: Option<PasswordHash>,
}

/// Repository trait - all user-table operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_by_identity(&self, identity: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Existence probe used while picking a fresh identifier
    async fn exists(&self, user_id: &UserId) -> Result<bool, RepositoryError>;

    /// Insert a new user. A taken `user_id`, email or identity is a `Conflict`.
    async fn insert(&self, user: &User) -> Result<(), RepositoryError>;

    /// Attach an external identity to an existing user (idempotent)
    async fn link_identity(&self, user_id: &UserId, identity: &str)
        -> Result<(), RepositoryError>;

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError>;
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynUserRepository = Arc<dyn UserRepository>;

/// Map a row selected with `USER_COLUMNS` onto a `User`.
pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    user_from_row_at(row, 0)
}

/// Same as `user_from_row`, for rows whose user columns start at `base`.
pub(crate) fn user_from_row_at(row: &Row<'_>, base: usize) -> rusqlite::Result<User> {
    let avatar: String = row.get(base + 2)?;
    Ok(User {
        user_id: UserId::new(row.get::<_, String>(base)?),
        display_name: row.get(base + 1)?,
        avatar_id: AvatarId::parse(&avatar).unwrap_or_default(),
        email: row.get(base + 3)?,
        auth_identity: row.get(base + 4)?,
        password_hash: row
            .get::<_, Option<String>>(base + 5)?
            .map(PasswordHash::from_stored),
    })
}

/// SQLite implementation
pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn find_where(&self, column: &str, value: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM users WHERE {} = ?1 LIMIT 1",
            USER_COLUMNS, column
        );
        let user = conn
            .query_row(&sql, params![value], user_from_row)
            .optional()?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.find_where("user_id", user_id.as_str())
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<User>, RepositoryError> {
        self.find_where("auth_identity", identity)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.find_where("email", email)
    }

    async fn exists(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE user_id = ?1",
            params![user_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (user_id, display_name, avatar_id, email, auth_identity, password_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.user_id.as_str(),
                user.display_name,
                user.avatar_id.as_str(),
                user.email,
                user.auth_identity,
                user.password_hash.as_ref().map(|h| h.as_str()),
            ],
        )
        .map_err(RepositoryError::from_write)?;
        Ok(())
    }

    async fn link_identity(
        &self,
        user_id: &UserId,
        identity: &str,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE users SET auth_identity = ?1, updated_at = datetime('now')
                 WHERE user_id = ?2",
                params![identity, user_id.as_str()],
            )
            .map_err(RepositoryError::from_write)?;

        if rows == 0 {
            return Err(RepositoryError::NotFound(user_id.to_string()));
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE users SET
               display_name = COALESCE(?1, display_name),
               avatar_id = COALESCE(?2, avatar_id),
               password_hash = COALESCE(?3, password_hash),
               updated_at = datetime('now')
             WHERE user_id = ?4",
            params![
                update.display_name,
                update.avatar_id.as_ref().map(|a| a.as_str()),
                update.password_hash.as_ref().map(|h| h.as_str()),
                user_id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound(user_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn sample_user(id: &str, identity: Option<&str>, email: Option<&str>) -> User {
        User {
            user_id: UserId::new(id),
            display_name: id.to_string(),
            avatar_id: AvatarId::default(),
            email: email.map(str::to_string),
            auth_identity: identity.map(str::to_string),
            password_hash: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (pool, _tmp) = db::test_pool();
        let repo = SqliteUserRepository::new(pool);

        let user = sample_user("alex", Some("auth-1"), Some("alex@example.com"));
        repo.insert(&user).await.unwrap();

        assert_eq!(
            repo.find_by_id(&UserId::new("alex")).await.unwrap(),
            Some(user.clone())
        );
        assert_eq!(repo.find_by_identity("auth-1").await.unwrap(), Some(user.clone()));
        assert_eq!(
            repo.find_by_email("alex@example.com").await.unwrap(),
            Some(user)
        );
        assert!(repo.exists(&UserId::new("alex")).await.unwrap());
        assert!(!repo.exists(&UserId::new("alex2")).await.unwrap());
        assert_eq!(repo.find_by_identity("auth-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_conflicts() {
        let (pool, _tmp) = db::test_pool();
        let repo = SqliteUserRepository::new(pool);

        repo.insert(&sample_user("alex", Some("auth-1"), Some("a@x.io")))
            .await
            .unwrap();

        let same_id = repo.insert(&sample_user("alex", None, None)).await;
        assert!(matches!(same_id, Err(RepositoryError::Conflict(_))));

        let same_identity = repo
            .insert(&sample_user("other", Some("auth-1"), None))
            .await;
        assert!(matches!(same_identity, Err(RepositoryError::Conflict(_))));

        let same_email = repo
            .insert(&sample_user("third", None, Some("a@x.io")))
            .await;
        assert!(matches!(same_email, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_many_users_without_email_or_identity() {
        let (pool, _tmp) = db::test_pool();
        let repo = SqliteUserRepository::new(pool);

        // NULLs never collide under UNIQUE
        repo.insert(&sample_user("a", None, None)).await.unwrap();
        repo.insert(&sample_user("b", None, None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_link_identity_is_idempotent() {
        let (pool, _tmp) = db::test_pool();
        let repo = SqliteUserRepository::new(pool);
        repo.insert(&sample_user("alex", None, Some("a@x.io")))
            .await
            .unwrap();

        let id = UserId::new("alex");
        repo.link_identity(&id, "auth-9").await.unwrap();
        repo.link_identity(&id, "auth-9").await.unwrap();

        let user = repo.find_by_identity("auth-9").await.unwrap().unwrap();
        assert_eq!(user.user_id, id);

        let missing = repo.link_identity(&UserId::new("ghost"), "auth-0").await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_profile_leaves_unset_fields() {
        let (pool, _tmp) = db::test_pool();
        let repo = SqliteUserRepository::new(pool);
        repo.insert(&sample_user("alex", None, None)).await.unwrap();

        let id = UserId::new("alex");
        repo.update_profile(
            &id,
            &ProfileUpdate {
                avatar_id: AvatarId::parse("a4.png"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let user = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(user.avatar_id.as_str(), "a4.png");
        assert_eq!(user.display_name, "alex");
        assert!(user.password_hash.is_none());
    }
}
