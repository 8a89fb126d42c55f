// Authentication: password hashing, JWT issue/verify, refresh-token sessions

use crate::config::Settings;
use crate::db::users;
use crate::error::{AppError, AppResult};
use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const REFRESH_TOKEN_TYPE: &str = "refresh";

// ============================================================================
// PASSWORDS
// ============================================================================

/// Argon2id PHC string for a plaintext password
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {}", e))
}

/// False for a wrong password and for a malformed stored hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Refresh tokens are stored only as their SHA-256 hex digest
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// JWT
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    /// Unique per token so two tokens minted in the same second differ
    pub jti: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Claims {
    pub fn is_refresh(&self) -> bool {
        self.token_type.as_deref() == Some(REFRESH_TOKEN_TYPE)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Signs and verifies tokens with the configured HMAC secret
#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let secret = settings.jwt_secret_key.as_bytes();
        Ok(TokenIssuer {
            algorithm: settings.algorithm()?,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::minutes(settings.access_token_expire_minutes),
            refresh_ttl: Duration::days(settings.refresh_token_expire_days),
        })
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn sign(&self, user_id: Uuid, ttl: Duration, token_type: Option<&str>) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.map(str::to_string),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| anyhow!("Failed to sign token: {}", e))
    }

    pub fn create_access_token(&self, user_id: Uuid) -> Result<String> {
        self.sign(user_id, self.access_ttl, None)
    }

    pub fn create_refresh_token(&self, user_id: Uuid) -> Result<String> {
        self.sign(user_id, self.refresh_ttl, Some(REFRESH_TOKEN_TYPE))
    }

    /// Verify signature and expiry
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Invalid token: {}", e))
    }

    /// User id carried by a valid access token
    pub fn access_subject(&self, token: &str) -> AppResult<Uuid> {
        let claims = self.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            AppError::credentials()
        })?;
        if claims.is_refresh() {
            return Err(AppError::credentials());
        }
        claims.user_id().ok_or_else(AppError::credentials)
    }
}

// ============================================================================
// SESSIONS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user_id: Uuid,
    pub message: String,
}

/// Mint an access/refresh pair and persist the refresh token's hash
pub fn issue_session(
    conn: &Connection,
    issuer: &TokenIssuer,
    user_id: Uuid,
    message: String,
) -> AppResult<TokenResponse> {
    let access_token = issuer.create_access_token(user_id)?;
    let refresh_token = issuer.create_refresh_token(user_id)?;

    users::insert_refresh_token(
        conn,
        user_id,
        &hash_token(&refresh_token),
        Utc::now() + issuer.refresh_ttl(),
    )?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
        user_id,
        message,
    })
}

/// Post-verification half of login: cap sessions, mint tokens, stamp the login time
pub fn start_session(
    conn: &Connection,
    issuer: &TokenIssuer,
    user: &users::User,
    max_sessions: usize,
) -> AppResult<TokenResponse> {
    let tx = conn.unchecked_transaction()?;
    // Leave room for the session about to be created
    let revoked = users::limit_active_sessions(&tx, user.id, max_sessions.saturating_sub(1))?;
    if revoked > 0 {
        tracing::info!(user_id = %user.id, revoked, "revoked oldest sessions");
    }

    let response = issue_session(&tx, issuer, user.id, format!("User logged in {}", user.login))?;
    users::touch_last_login(&tx, user.id)?;
    tx.commit()?;
    Ok(response)
}

/// Exchange an active refresh token for a new pair, revoking the old one
pub fn rotate_session(
    conn: &Connection,
    issuer: &TokenIssuer,
    refresh_token: &str,
) -> AppResult<TokenResponse> {
    let tx = conn.unchecked_transaction()?;
    let stored = users::find_active_refresh_token(&tx, &hash_token(refresh_token))?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    users::revoke_refresh_token(&tx, stored.id)?;
    let response = issue_session(&tx, issuer, stored.user_id, "Refreshed token".to_string())?;
    tx.commit()?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use clap::Parser;

    fn issuer() -> TokenIssuer {
        let settings = Settings::parse_from(["test", "--jwt-secret-key", "unit-test-secret"]);
        TokenIssuer::from_settings(&settings).unwrap()
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "garbage"));
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_access_and_refresh_tokens() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();

        let access = issuer.create_access_token(user_id).unwrap();
        assert_eq!(issuer.access_subject(&access).unwrap(), user_id);

        let refresh = issuer.create_refresh_token(user_id).unwrap();
        assert!(issuer.decode(&refresh).unwrap().is_refresh());
        assert!(
            issuer.access_subject(&refresh).is_err(),
            "Refresh tokens must not authenticate requests"
        );

        let again = issuer.create_refresh_token(user_id).unwrap();
        assert_ne!(refresh, again);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = TokenIssuer::from_settings(&Settings::parse_from([
            "test",
            "--jwt-secret-key",
            "another-secret",
        ]))
        .unwrap();
        let token = other.create_access_token(Uuid::new_v4()).unwrap();
        assert!(issuer().access_subject(&token).is_err());
    }

    #[test]
    fn test_rotate_session_revokes_old_token() {
        let conn = test_support::conn();
        let user_id = test_support::user(&conn, "frank");
        let issuer = issuer();

        let first = issue_session(&conn, &issuer, user_id, "hi".into()).unwrap();
        let second = rotate_session(&conn, &issuer, &first.refresh_token).unwrap();
        assert_eq!(second.message, "Refreshed token");
        assert_eq!(second.user_id, user_id);

        let reuse = rotate_session(&conn, &issuer, &first.refresh_token).unwrap_err();
        assert_eq!(reuse.status_code(), 401);
        assert!(rotate_session(&conn, &issuer, &second.refresh_token).is_ok());
    }

    #[test]
    fn test_start_session_caps_active_sessions() {
        let conn = test_support::conn();
        let user_id = test_support::user(&conn, "gina");
        let user = users::get_user(&conn, user_id).unwrap().unwrap();
        let issuer = issuer();

        for _ in 0..4 {
            start_session(&conn, &issuer, &user, 2).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let active: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM refresh_tokens WHERE revoked_at IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(active, 2);
        assert!(users::get_user(&conn, user_id)
            .unwrap()
            .unwrap()
            .last_login_at
            .is_some());
    }
}
