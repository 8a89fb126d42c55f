// 🧹 Background purge of expired and revoked refresh tokens

use crate::db::users;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One cleanup pass; returns the number of deleted tokens
pub fn run_once(db: &Mutex<Connection>) -> anyhow::Result<usize> {
    let conn = db.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(users::cleanup_refresh_tokens(&conn)?)
}

/// Run cleanup forever, sleeping `interval` between passes
pub async fn cleanup_loop(db: Arc<Mutex<Connection>>, interval: Duration) {
    loop {
        match run_once(&db) {
            Ok(deleted) => tracing::info!(deleted, "Cleanup: removed expired or revoked refresh tokens"),
            Err(e) => tracing::error!(error = %e, "Cleanup: refresh token purge failed"),
        }
        tokio::time::sleep(interval).await;
    }
}

/// Spawn the cleanup loop on the current runtime
pub fn spawn(db: Arc<Mutex<Connection>>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    tracing::info!(interval_secs = interval.as_secs(), "token cleanup scheduled");
    tokio::spawn(cleanup_loop(db, interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use chrono::{Duration as ChronoDuration, Utc};

    #[test]
    fn test_run_once_purges_expired_tokens() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "sleepy");
        users::insert_refresh_token(&conn, user, "expired", Utc::now() - ChronoDuration::hours(1)).unwrap();
        users::insert_refresh_token(&conn, user, "live", Utc::now() + ChronoDuration::days(1)).unwrap();

        let db = Mutex::new(conn);
        assert_eq!(run_once(&db).unwrap(), 1);
        assert_eq!(run_once(&db).unwrap(), 0);
    }
}
