use std::sync::Arc;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::{Mutex, MutexGuard};

use super::models::{Entry, EntryRecord};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Entry table plus the lock every writer goes through.
///
/// Clones share the pool and the lock, so all inserts in the process are
/// totally ordered. Reads never touch the lock.
#[derive(Debug, Clone)]
pub struct EntryStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

/// Exclusive write access, held for as long as the value lives.
pub struct EntryWriter<'a> {
    pool: &'a SqlitePool,
    _guard: MutexGuard<'a, ()>,
}

impl EntryStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        // An in-memory database lives only as long as its one connection.
        let options = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = options.connect(database_url).await?;
        let store = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Creates the schema if missing. Safe on every start.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn writer(&self) -> EntryWriter<'_> {
        EntryWriter {
            pool: &self.pool,
            _guard: self.write_lock.lock().await,
        }
    }

    /// Inserts one entry under the write lock.
    pub async fn insert(&self, entry: &Entry) -> Result<i64, StorageError> {
        self.writer().await.insert(entry).await
    }

    /// Most recent first; equal dates come back in insertion order.
    /// A non-positive `limit` yields an empty list without querying.
    pub async fn latest(&self, limit: i64) -> Result<Vec<EntryRecord>, StorageError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EntryRecord>(
            r#"
            SELECT id, title, description, pub_date, link
            FROM news
            ORDER BY pub_date DESC, id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl EntryWriter<'_> {
    pub async fn insert(&mut self, entry: &Entry) -> Result<i64, StorageError> {
        let id = sqlx::query(
            r#"
            INSERT INTO news (title, description, pub_date, link)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.published_at)
        .bind(&entry.link)
        .execute(self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}
