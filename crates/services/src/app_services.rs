use storage::repository::Storage;

use crate::Clock;
use crate::card_service::CardService;
use crate::chapter_service::ChapterService;
use crate::deck_service::DeckService;
use crate::distribution_service::DistributionService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Shared service wiring for front ends.
#[derive(Clone)]
pub struct AppServices {
    decks: DeckService,
    cards: CardService,
    chapters: ChapterService,
    distribution: DistributionService,
    progress: ProgressService,
}

impl AppServices {
    /// Build app services backed by `SQLite`, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or
    /// migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock))
    }

    /// Build app services backed by the in-memory repository.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        Self {
            decks: DeckService::new(clock, storage.decks.clone()),
            cards: CardService::new(clock, storage.cards.clone()),
            chapters: ChapterService::new(clock, storage.chapters.clone(), storage.cards.clone()),
            distribution: DistributionService::new(storage.chapters.clone(), storage.cards.clone()),
            progress: ProgressService::new(storage.cards, storage.progress),
        }
    }

    #[must_use]
    pub fn decks(&self) -> &DeckService {
        &self.decks
    }

    #[must_use]
    pub fn cards(&self) -> &CardService {
        &self.cards
    }

    #[must_use]
    pub fn chapters(&self) -> &ChapterService {
        &self.chapters
    }

    #[must_use]
    pub fn distribution(&self) -> &DistributionService {
        &self.distribution
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressService {
        &self.progress
    }
}
