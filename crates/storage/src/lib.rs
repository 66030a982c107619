#![forbid(unsafe_code)]

pub mod progress_store;
pub mod repository;
pub mod sqlite;

pub use progress_store::{GuestProgressStore, ProgressStore, UserProgressStore, store_for};
pub use repository::{InMemoryRepository, Storage, StorageError, TagJob};
