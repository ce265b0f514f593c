pub mod models;
pub mod repository;

pub use repository::{EntryStore, EntryWriter, StorageError};
