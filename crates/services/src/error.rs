//! Shared error types for the services crate.
//!
//! Each service lifts `StorageError::NotFound` into its own `NotFound`
//! variant and wraps every other storage failure unchanged.

use thiserror::Error;

use deck_core::model::{AccessError, CardError, ChapterError, DeckError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ChapterService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChapterServiceError {
    #[error("deck already holds the maximum of {limit} chapters")]
    LimitExceeded { limit: usize },
    #[error(transparent)]
    Chapter(#[from] ChapterError),
    #[error("chapter or deck not found")]
    NotFound,
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ChapterServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `DistributionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DistributionError {
    #[error("no target chapters given for distribution")]
    NoChaptersAvailable,
    #[error("chapter or deck not found")]
    NotFound,
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for DistributionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// Errors surfaced by `ProgressService::try_*` methods. The non-`try`
/// methods swallow these and return zero statistics instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DeckService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeckServiceError {
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("deck not found")]
    NotFound,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for DeckServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `CardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CardServiceError {
    #[error(transparent)]
    Card(#[from] CardError),
    #[error("deck or chapter not found")]
    NotFound,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for CardServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
