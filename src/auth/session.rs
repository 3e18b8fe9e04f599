use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::RepositoryError;
use crate::identity::repository::user_from_row_at;
use crate::identity::User;
use crate::state::DbPool;

/// The acting user for one request, backed by a row in `sessions`.
///
/// Only built from a verified credential or principal (`create_session`) or
/// from a live token (`load_session`); `sign_out` consumes it.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub expires_at: String,
}

/// Create a new session for a user.
pub fn create_session(pool: &DbPool, user: User, hours: u64) -> Result<Session, RepositoryError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user.user_id.as_str(), token, format!("+{} hours", hours)],
    )?;

    let expires_at: String = conn.query_row(
        "SELECT expires_at FROM sessions WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;

    tracing::info!(user_id = %user.user_id, "Session created");
    Ok(Session {
        token,
        user,
        expires_at,
    })
}

/// Look up a live session by token. Unknown or expired tokens yield `None`.
pub fn load_session(pool: &DbPool, token: &str) -> Result<Option<Session>, RepositoryError> {
    let conn = pool.get()?;

    let sql = "SELECT s.expires_at, u.user_id, u.display_name, u.avatar_id, u.email,
                      u.auth_identity, u.password_hash
               FROM sessions s
               JOIN users u ON u.user_id = s.user_id
               WHERE s.token = ?1 AND s.expires_at > datetime('now')";

    let session = conn
        .query_row(sql, params![token], |row| {
            let expires_at: String = row.get(0)?;
            let user = user_from_row_at(row, 1)?;
            Ok(Session {
                token: token.to_string(),
                user,
                expires_at,
            })
        })
        .optional()?;

    Ok(session)
}

/// Invalidate a session. The value is consumed so it cannot be reused.
pub fn sign_out(pool: &DbPool, session: Session) -> Result<(), RepositoryError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![session.token])?;
    tracing::info!(user_id = %session.user.user_id, "Session ended");
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}
