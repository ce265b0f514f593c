pub mod render;

use crate::core::storage::models::EntryRecord;
use crate::core::storage::{EntryStore, StorageError};

/// Read side of the store. Never waits on the write lock.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: EntryStore,
}

impl QueryService {
    pub fn new(store: EntryStore) -> Self {
        Self { store }
    }

    pub async fn latest(&self, count: i64) -> Result<Vec<EntryRecord>, StorageError> {
        self.store.latest(count).await
    }
}
