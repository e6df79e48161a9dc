//! SQLite-backed list of tracked locations.
//!
//! The screens and workers only read identifiers through `LocationStore`;
//! adding and removing happens through `SqliteLocationStore` directly. Every
//! effective add or remove bumps a revision that observers can follow.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tokio::sync::watch;

use skycast_core::{RusqliteErrorExt, StoreError};

/// Read-only view of the tracked locations.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Identifiers in the order they were added.
    async fn list_identifiers(&self) -> Result<Vec<String>, StoreError>;

    /// Revision counter, bumped whenever the tracked set changes.
    fn observe(&self) -> watch::Receiver<u64>;
}

#[derive(Clone)]
pub struct SqliteLocationStore {
    conn: Arc<Mutex<Connection>>,
    revision: Arc<watch::Sender<u64>>,
}

impl SqliteLocationStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| e.into_store_error())?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| e.into_store_error())?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier TEXT NOT NULL UNIQUE,
                added_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| e.into_store_error())?;

        let (revision, _rx) = watch::channel(0);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            revision: Arc::new(revision),
        })
    }

    /// Track `identifier`. Returns false if it was already tracked.
    pub async fn add(&self, identifier: &str) -> Result<bool, StoreError> {
        let identifier = identifier.to_string();
        let inserted = self
            .blocking(move |conn| {
                let inserted = conn
                    .execute(
                        "INSERT OR IGNORE INTO locations (identifier, added_at) VALUES (?1, ?2)",
                        params![identifier, chrono::Utc::now().to_rfc3339()],
                    )
                    .map_err(|e| e.into_store_error())?;
                if inserted > 0 {
                    tracing::info!("Tracking location {}", identifier);
                }
                Ok(inserted > 0)
            })
            .await?;
        self.bump_if(inserted);
        Ok(inserted)
    }

    /// Stop tracking `identifier`. Returns false if it was not tracked.
    pub async fn remove(&self, identifier: &str) -> Result<bool, StoreError> {
        let identifier = identifier.to_string();
        let deleted = self
            .blocking(move |conn| {
                let deleted = conn
                    .execute("DELETE FROM locations WHERE identifier = ?1", params![identifier])
                    .map_err(|e| e.into_store_error())?;
                if deleted > 0 {
                    tracing::info!("Stopped tracking location {}", identifier);
                }
                Ok(deleted > 0)
            })
            .await?;
        self.bump_if(deleted);
        Ok(deleted)
    }

    fn bump_if(&self, changed: bool) {
        if changed {
            self.revision.send_modify(|r| *r += 1);
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl LocationStore for SqliteLocationStore {
    async fn list_identifiers(&self) -> Result<Vec<String>, StoreError> {
        self.blocking(|conn| {
            let mut stmt = conn
                .prepare("SELECT identifier FROM locations ORDER BY id ASC")
                .map_err(|e| e.into_store_error())?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| e.into_store_error())?;
            let identifiers =
                rows.collect::<Result<Vec<_>, _>>().map_err(|e| e.into_store_error())?;
            Ok(identifiers)
        })
        .await
    }

    fn observe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[tokio::test]
    async fn test_insertion_order() {
        let store = SqliteLocationStore::in_memory().unwrap();
        store.add("Oslo, Oslo").await.unwrap();
        store.add("Austin, Texas").await.unwrap();
        store.add("Perth, Western Australia").await.unwrap();

        assert_eq!(
            store.list_identifiers().await.unwrap(),
            vec!["Oslo, Oslo", "Austin, Texas", "Perth, Western Australia"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_is_ignored() {
        let store = SqliteLocationStore::in_memory().unwrap();
        assert!(store.add("Oslo, Oslo").await.unwrap());
        assert!(!store.add("Oslo, Oslo").await.unwrap());
        assert_eq!(store.list_identifiers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SqliteLocationStore::in_memory().unwrap();
        store.add("Oslo, Oslo").await.unwrap();
        assert!(store.remove("Oslo, Oslo").await.unwrap());
        assert!(!store.remove("Oslo, Oslo").await.unwrap());
        assert!(store.list_identifiers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_effective_changes_notify() {
        let store = SqliteLocationStore::in_memory().unwrap();
        let mut rx = store.observe();

        store.add("Oslo, Oslo").await.unwrap();
        assert!(rx.has_changed().unwrap());
        rx.mark_unchanged();

        store.add("Oslo, Oslo").await.unwrap();
        store.remove("Lima, Lima").await.unwrap();
        assert!(!rx.has_changed().unwrap());

        store.remove("Oslo, Oslo").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[tokio::test]
    async fn test_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("locations.db");

        SqliteLocationStore::open(&path).unwrap().add("Lima, Lima").await.unwrap();

        let reopened = SqliteLocationStore::open(&path).unwrap();
        assert_eq!(reopened.list_identifiers().await.unwrap(), vec!["Lima, Lima"]);
    }
}
