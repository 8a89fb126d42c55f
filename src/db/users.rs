// Users and refresh-token sessions

use super::{is_unique_violation, now, DbResult};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub login: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// What a client is allowed to see about a user
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub login: String,
}

impl From<&User> for UserPublic {
    fn from(user: &User) -> Self {
        UserPublic {
            id: user.id,
            email: user.email.clone(),
            login: user.login.clone(),
        }
    }
}

pub struct NewUser {
    pub email: String,
    pub login: String,
    pub password_hash: String,
}

const USER_COLUMNS: &str = "id, email, login, password_hash, is_active, is_verified,
     created_at, updated_at, last_login_at";

fn user_from_row(row: &Row) -> DbResult<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        login: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        is_verified: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        last_login_at: row.get(8)?,
    })
}

// ============================================================================
// USERS
// ============================================================================

/// Insert a user. Email and login must both be unused.
pub fn create_user(conn: &Connection, new: &NewUser) -> AppResult<User> {
    if let Some(existing) = find_by_identifier(conn, &new.email)? {
        if existing.email == new.email {
            return Err(AppError::bad_request("Email already registered"));
        }
    }
    if let Some(existing) = find_by_identifier(conn, &new.login)? {
        if existing.login == new.login {
            return Err(AppError::bad_request("Login already taken"));
        }
    }

    let id = Uuid::new_v4();
    let ts = now();
    let result = conn.execute(
        "INSERT INTO users (id, email, login, password_hash, is_active, is_verified, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, 0, ?5, ?5)",
        params![id, new.email, new.login, new.password_hash, ts],
    );

    match result {
        Ok(_) => {}
        // Lost a race against a concurrent registration
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::bad_request("Email already registered"))
        }
        Err(e) => return Err(e.into()),
    }

    get_user(conn, id)?.ok_or_else(|| AppError::not_found("User not found"))
}

pub fn get_user(conn: &Connection, id: Uuid) -> DbResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        user_from_row,
    )
    .optional()
}

/// Look a user up by email or login
pub fn find_by_identifier(conn: &Connection, identifier: &str) -> DbResult<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM users WHERE email = ?1 OR login = ?1 LIMIT 1",
            USER_COLUMNS
        ),
        [identifier],
        user_from_row,
    )
    .optional()
}

pub fn touch_last_login(conn: &Connection, id: Uuid) -> DbResult<()> {
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

// ============================================================================
// REFRESH TOKENS
// ============================================================================

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn token_from_row(row: &Row) -> DbResult<RefreshToken> {
    Ok(RefreshToken {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token_hash: row.get(2)?,
        expires_at: row.get(3)?,
        revoked_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_refresh_token(
    conn: &Connection,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> DbResult<RefreshToken> {
    let token = RefreshToken {
        id: Uuid::new_v4(),
        user_id,
        token_hash: token_hash.to_string(),
        expires_at,
        revoked_at: None,
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            token.id,
            token.user_id,
            token.token_hash,
            token.expires_at,
            token.created_at
        ],
    )?;
    Ok(token)
}

/// A token that is neither revoked nor expired
pub fn find_active_refresh_token(
    conn: &Connection,
    token_hash: &str,
) -> DbResult<Option<RefreshToken>> {
    conn.query_row(
        "SELECT id, user_id, token_hash, expires_at, revoked_at, created_at
         FROM refresh_tokens
         WHERE token_hash = ?1 AND revoked_at IS NULL AND expires_at > ?2",
        params![token_hash, now()],
        token_from_row,
    )
    .optional()
}

pub fn revoke_refresh_token(conn: &Connection, id: Uuid) -> DbResult<()> {
    conn.execute(
        "UPDATE refresh_tokens SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
        params![now(), id],
    )?;
    Ok(())
}

/// Revoke by hash; unknown or already revoked tokens are ignored
pub fn revoke_refresh_token_by_hash(conn: &Connection, token_hash: &str) -> DbResult<bool> {
    let changed = conn.execute(
        "UPDATE refresh_tokens SET revoked_at = ?1 WHERE token_hash = ?2 AND revoked_at IS NULL",
        params![now(), token_hash],
    )?;
    Ok(changed > 0)
}

/// Revoke the oldest active sessions so that at most `keep` remain
pub fn limit_active_sessions(conn: &Connection, user_id: Uuid, keep: usize) -> DbResult<usize> {
    let mut stmt = conn.prepare(
        "SELECT id FROM refresh_tokens
         WHERE user_id = ?1 AND revoked_at IS NULL AND expires_at > ?2
         ORDER BY created_at DESC",
    )?;
    let active = stmt
        .query_map(params![user_id, now()], |row| row.get::<_, Uuid>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let stale: Vec<Uuid> = active.into_iter().skip(keep).collect();
    for id in &stale {
        revoke_refresh_token(conn, *id)?;
    }
    Ok(stale.len())
}

/// Delete expired or revoked refresh tokens, returning how many went
pub fn cleanup_refresh_tokens(conn: &Connection) -> DbResult<usize> {
    conn.execute(
        "DELETE FROM refresh_tokens WHERE expires_at < ?1 OR revoked_at IS NOT NULL",
        [now()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use chrono::Duration;

    #[test]
    fn test_create_user_rejects_duplicates() {
        let conn = test_support::conn();
        test_support::user(&conn, "alice");

        let dup_email = create_user(
            &conn,
            &NewUser {
                email: "alice@example.com".into(),
                login: "alice2".into(),
                password_hash: "x".into(),
            },
        )
        .unwrap_err();
        assert_eq!(dup_email.to_string(), "Email already registered");

        let dup_login = create_user(
            &conn,
            &NewUser {
                email: "other@example.com".into(),
                login: "alice".into(),
                password_hash: "x".into(),
            },
        )
        .unwrap_err();
        assert_eq!(dup_login.to_string(), "Login already taken");
    }

    #[test]
    fn test_find_by_email_or_login() {
        let conn = test_support::conn();
        let id = test_support::user(&conn, "bob");

        assert_eq!(find_by_identifier(&conn, "bob").unwrap().unwrap().id, id);
        assert_eq!(
            find_by_identifier(&conn, "bob@example.com").unwrap().unwrap().id,
            id
        );
        assert!(find_by_identifier(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn test_refresh_token_lifecycle() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "carol");

        insert_refresh_token(&conn, user, "h1", now() + Duration::days(1)).unwrap();
        assert!(find_active_refresh_token(&conn, "h1").unwrap().is_some());

        assert!(revoke_refresh_token_by_hash(&conn, "h1").unwrap());
        assert!(find_active_refresh_token(&conn, "h1").unwrap().is_none());
        assert!(!revoke_refresh_token_by_hash(&conn, "h1").unwrap());

        insert_refresh_token(&conn, user, "old", now() - Duration::days(1)).unwrap();
        assert!(find_active_refresh_token(&conn, "old").unwrap().is_none());
    }

    #[test]
    fn test_limit_active_sessions_revokes_oldest() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "dave");

        for i in 0..6 {
            insert_refresh_token(&conn, user, &format!("t{}", i), now() + Duration::days(1))
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let revoked = limit_active_sessions(&conn, user, 4).unwrap();
        assert_eq!(revoked, 2);
        assert!(find_active_refresh_token(&conn, "t0").unwrap().is_none());
        assert!(find_active_refresh_token(&conn, "t1").unwrap().is_none());
        assert!(find_active_refresh_token(&conn, "t5").unwrap().is_some());
    }

    #[test]
    fn test_cleanup_removes_expired_and_revoked() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "erin");

        insert_refresh_token(&conn, user, "live", now() + Duration::days(1)).unwrap();
        insert_refresh_token(&conn, user, "expired", now() - Duration::hours(1)).unwrap();
        insert_refresh_token(&conn, user, "revoked", now() + Duration::days(1)).unwrap();
        revoke_refresh_token_by_hash(&conn, "revoked").unwrap();

        assert_eq!(cleanup_refresh_tokens(&conn).unwrap(), 2);
        assert!(find_active_refresh_token(&conn, "live").unwrap().is_some());
    }
}
