//! Best-effort sqlite mirror of moderation-relevant state.
//!
//! The in-memory [`crate::core::CommunityState`] is authoritative; the mirror
//! exists so operators can inspect bans and activity with plain sql after a
//! restart. Writes are fire-and-forget from the handler layer and failures
//! are logged, never surfaced to chat.

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::core::UserProfile;
use crate::error::MirrorError;

/// Sink for registry snapshots. Object-safe so the bot can hold
/// `Option<Arc<dyn StateMirror>>` and run without a database at all.
#[async_trait]
pub trait StateMirror: Send + Sync {
    /// Upsert one user row with the profile's current moderation state.
    async fn record_user(&self, profile: &UserProfile) -> Result<(), MirrorError>;
}

/// sqlite-backed mirror.
pub struct SqliteMirror {
    pool: SqlitePool,
}

impl SqliteMirror {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, MirrorError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                joined_at INTEGER NOT NULL,
                last_active_at INTEGER NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                banned INTEGER NOT NULL DEFAULT 0,
                ban_reason TEXT,
                banned_at INTEGER,
                muted_until INTEGER
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl StateMirror for SqliteMirror {
    async fn record_user(&self, profile: &UserProfile) -> Result<(), MirrorError> {
        sqlx::query(
            "INSERT INTO users
                (id, display_name, joined_at, last_active_at, message_count,
                 banned, ban_reason, banned_at, muted_until)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                last_active_at = excluded.last_active_at,
                message_count = excluded.message_count,
                banned = excluded.banned,
                ban_reason = excluded.ban_reason,
                banned_at = excluded.banned_at,
                muted_until = excluded.muted_until",
        )
        .bind(profile.id)
        .bind(&profile.display_name)
        .bind(profile.joined_at.timestamp())
        .bind(profile.last_active_at.timestamp())
        .bind(profile.message_count as i64)
        .bind(profile.banned)
        .bind(profile.ban_reason.as_deref())
        .bind(profile.banned_at.map(|at| at.timestamp()))
        .bind(profile.muted_until.map(|at| at.timestamp()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(id: i64) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id,
            display_name: format!("user{id}"),
            joined_at: now,
            last_active_at: now,
            message_count: 3,
            banned: false,
            ban_reason: None,
            banned_at: None,
            muted_until: None,
        }
    }

    async fn mirror() -> SqliteMirror {
        SqliteMirror::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_record_user_inserts_row() {
        let mirror = mirror().await;
        mirror.record_user(&profile(1)).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mirror.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_record_user_upserts() {
        let mirror = mirror().await;
        let mut p = profile(1);
        mirror.record_user(&p).await.unwrap();

        p.banned = true;
        p.ban_reason = Some("spam".to_owned());
        p.banned_at = Some(Utc::now());
        mirror.record_user(&p).await.unwrap();

        let (count, reason): (i64, Option<String>) =
            sqlx::query_as("SELECT COUNT(*), MAX(ban_reason) FROM users")
                .fetch_one(&mirror.pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
        assert_eq!(reason.as_deref(), Some("spam"));
    }
}
