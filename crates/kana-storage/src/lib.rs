//! kana-storage: SQLite-based persistence for reminder subscriptions.
//!
//! One row per (user, AniList id) pair. Rows are only created and removed by
//! toggling; there is no update path.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;

use kana_reminders::{ReminderError, SubscriptionStore};
use kana_types::{CatalogId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Blocking task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS anime_reminders (
    user_id INTEGER NOT NULL,
    anilist_id INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, anilist_id)
);

CREATE INDEX IF NOT EXISTS idx_anime_reminders_anilist
    ON anime_reminders (anilist_id);";

/// A stored reminder subscription.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Subscription {
    pub user_id: UserId,
    pub catalog_id: CatalogId,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// SQLite-backed subscription store.
pub struct KanaStorage {
    conn: Arc<Mutex<Connection>>,
}

impl KanaStorage {
    /// Open (or create) the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("Storage opened: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Remove the row if present, insert it otherwise. Returns whether the
    /// user is subscribed afterwards.
    pub async fn toggle(&self, user_id: UserId, catalog_id: CatalogId) -> Result<bool> {
        let conn = self.conn.clone();
        let now = chrono::Utc::now().timestamp_millis();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM anime_reminders WHERE user_id = ?1 AND anilist_id = ?2",
                rusqlite::params![user_id as i64, catalog_id],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO anime_reminders (user_id, anilist_id, created_at)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![user_id as i64, catalog_id, now],
                )?;
            }
            tx.commit()?;
            Ok(removed == 0)
        })
        .await?
    }

    pub async fn is_subscribed(&self, user_id: UserId, catalog_id: CatalogId) -> Result<bool> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let found = conn
                .query_row(
                    "SELECT 1 FROM anime_reminders WHERE user_id = ?1 AND anilist_id = ?2",
                    rusqlite::params![user_id as i64, catalog_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await?
    }

    pub async fn count_subscribers(&self, catalog_id: CatalogId) -> Result<u64> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM anime_reminders WHERE anilist_id = ?1",
                rusqlite::params![catalog_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await?
    }

    /// Subscribers of `catalog_id`, oldest subscription first.
    pub async fn list_subscriber_ids(&self, catalog_id: CatalogId) -> Result<Vec<UserId>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT user_id FROM anime_reminders WHERE anilist_id = ?1
                 ORDER BY created_at ASC, user_id ASC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![catalog_id], |row| {
                    Ok(row.get::<_, i64>(0)? as UserId)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?
    }

    /// Every subscription held by `user_id`, newest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Subscription>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT user_id, anilist_id, created_at FROM anime_reminders
                 WHERE user_id = ?1 ORDER BY created_at DESC, anilist_id ASC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id as i64], |row| {
                    Ok(Subscription {
                        user_id: row.get::<_, i64>(0)? as UserId,
                        catalog_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?
    }
}

#[async_trait]
impl SubscriptionStore for KanaStorage {
    async fn toggle(&self, user_id: UserId, catalog_id: CatalogId) -> kana_reminders::Result<bool> {
        KanaStorage::toggle(self, user_id, catalog_id)
            .await
            .map_err(ReminderError::store)
    }

    async fn is_subscribed(
        &self,
        user_id: UserId,
        catalog_id: CatalogId,
    ) -> kana_reminders::Result<bool> {
        KanaStorage::is_subscribed(self, user_id, catalog_id)
            .await
            .map_err(ReminderError::store)
    }

    async fn count_subscribers(&self, catalog_id: CatalogId) -> kana_reminders::Result<u64> {
        KanaStorage::count_subscribers(self, catalog_id)
            .await
            .map_err(ReminderError::store)
    }

    async fn list_subscriber_ids(
        &self,
        catalog_id: CatalogId,
    ) -> kana_reminders::Result<Vec<UserId>> {
        KanaStorage::list_subscriber_ids(self, catalog_id)
            .await
            .map_err(ReminderError::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRIEREN: CatalogId = 154587;
    const DUNGEON_MESHI: CatalogId = 153518;
    // Discord snowflakes are well past i32.
    const ALICE: UserId = 301_234_567_890_123_456;
    const BOB: UserId = 402_345_678_901_234_567;

    #[tokio::test]
    async fn test_toggle_flips_state() {
        let storage = KanaStorage::open_in_memory().unwrap();

        assert!(!storage.is_subscribed(ALICE, FRIEREN).await.unwrap());
        assert!(storage.toggle(ALICE, FRIEREN).await.unwrap());
        assert!(storage.is_subscribed(ALICE, FRIEREN).await.unwrap());
        assert!(!storage.toggle(ALICE, FRIEREN).await.unwrap());
        assert!(!storage.is_subscribed(ALICE, FRIEREN).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_and_list_subscribers() {
        let storage = KanaStorage::open_in_memory().unwrap();
        storage.toggle(ALICE, FRIEREN).await.unwrap();
        storage.toggle(BOB, FRIEREN).await.unwrap();
        storage.toggle(BOB, DUNGEON_MESHI).await.unwrap();

        assert_eq!(storage.count_subscribers(FRIEREN).await.unwrap(), 2);
        assert_eq!(storage.count_subscribers(DUNGEON_MESHI).await.unwrap(), 1);
        assert_eq!(storage.count_subscribers(1).await.unwrap(), 0);

        let mut ids = storage.list_subscriber_ids(FRIEREN).await.unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![ALICE, BOB]);
        assert!(storage.list_subscriber_ids(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let storage = KanaStorage::open_in_memory().unwrap();
        storage.toggle(BOB, FRIEREN).await.unwrap();
        storage.toggle(BOB, DUNGEON_MESHI).await.unwrap();
        storage.toggle(ALICE, FRIEREN).await.unwrap();

        let subs = storage.list_for_user(BOB).await.unwrap();
        let mut ids: Vec<_> = subs.iter().map(|s| s.catalog_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![DUNGEON_MESHI, FRIEREN]);
        assert!(subs.iter().all(|s| s.user_id == BOB && s.created_at > 0));
    }

    #[tokio::test]
    async fn test_store_trait_maps_errors() {
        let storage = KanaStorage::open_in_memory().unwrap();
        storage
            .conn
            .lock()
            .await
            .execute_batch("DROP TABLE anime_reminders;")
            .unwrap();

        let store: &dyn SubscriptionStore = &storage;
        let err = store.count_subscribers(FRIEREN).await.unwrap_err();
        assert!(matches!(err, ReminderError::Store(_)));
        assert!(err.to_string().contains("no such table"));
    }

    #[tokio::test]
    async fn test_open_file_persists() {
        let dir = std::env::temp_dir().join(format!("kana-storage-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("kana.db");
        let _ = std::fs::remove_file(&path);

        {
            let storage = KanaStorage::open(&path).unwrap();
            storage.toggle(ALICE, FRIEREN).await.unwrap();
        }
        let storage = KanaStorage::open(&path).unwrap();
        assert!(storage.is_subscribed(ALICE, FRIEREN).await.unwrap());

        drop(storage);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
