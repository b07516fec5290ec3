#![forbid(unsafe_code)]

pub mod distribution;
pub mod repository;
pub mod sqlite;

pub use repository::{
    CardRepository, ChapterRepository, DeckRepository, InMemoryRepository, ProgressRepository,
    Storage, StorageError,
};
