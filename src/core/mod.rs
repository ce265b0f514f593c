pub mod config;
pub mod feed;
pub mod query;
pub mod storage;
pub mod sync;
