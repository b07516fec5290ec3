use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deck_core::model::{
    Card, CardId, CardPlacement, Chapter, ChapterId, Deck, DeckId, MAX_CHAPTERS_PER_DECK,
    ProgressStatus, UserId, sort_for_listing,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::distribution::plan_even_distribution;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert payload for a deck; storage assigns the id.
#[derive(Debug, Clone)]
pub struct NewDeckRecord {
    pub owner_id: UserId,
    pub name: String,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
}

impl NewDeckRecord {
    #[must_use]
    pub fn from_deck(deck: &Deck) -> Self {
        Self {
            owner_id: deck.owner_id(),
            name: deck.name().to_owned(),
            is_shared: deck.is_shared(),
            created_at: deck.created_at(),
        }
    }
}

/// Insert payload for a chapter; storage assigns the id.
#[derive(Debug, Clone, Copy)]
pub struct NewChapterRecord {
    pub deck_id: DeckId,
    pub ordinal: u32,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a card; storage assigns the id.
#[derive(Debug, Clone)]
pub struct NewCardRecord {
    pub deck_id: DeckId,
    pub chapter_id: Option<ChapterId>,
    pub prompt: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for decks.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Insert a new deck and return its storage-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck cannot be stored.
    async fn insert_new_deck(&self, deck: NewDeckRecord) -> Result<DeckId, StorageError>;

    /// Update name and sharing flag of an existing deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the deck does not exist.
    async fn update_deck(&self, deck: &Deck) -> Result<(), StorageError>;

    /// Fetch a deck by ID. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError>;

    /// Decks owned by `owner`, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_decks(&self, owner: UserId, limit: u32) -> Result<Vec<Deck>, StorageError>;
}

/// Repository contract for chapters.
#[async_trait]
pub trait ChapterRepository: Send + Sync {
    /// Chapters of a deck ordered by ordinal, then creation time, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_chapters(&self, deck_id: DeckId) -> Result<Vec<Chapter>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_chapters(&self, deck_id: DeckId) -> Result<u32, StorageError>;

    /// Store a chapter unless the deck already holds `MAX_CHAPTERS_PER_DECK`.
    /// The count and the insert happen as one step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the deck is full,
    /// `StorageError::NotFound` if the deck does not exist.
    async fn insert_chapter(&self, chapter: NewChapterRecord) -> Result<Chapter, StorageError>;

    /// Rewrite one chapter's ordinal.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the chapter does not exist.
    async fn update_ordinal(&self, id: ChapterId, ordinal: u32) -> Result<(), StorageError>;

    /// Remove the chapter row. Cards still pointing at it become unassigned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the chapter does not exist.
    async fn delete_chapter(&self, id: ChapterId) -> Result<(), StorageError>;
}

/// Repository contract for cards and their chapter placement.
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the deck does not exist or the
    /// chapter is not a chapter of that deck.
    async fn insert_new_card(&self, card: NewCardRecord) -> Result<CardId, StorageError>;

    /// Cards of a deck, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_cards(&self, deck_id: DeckId, limit: u32) -> Result<Vec<Card>, StorageError>;

    /// Every card id of a deck with its chapter reference, in one read.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn card_placements(&self, deck_id: DeckId) -> Result<Vec<CardPlacement>, StorageError>;

    /// Point the given cards of `deck_id` at `chapter_id` (or unassign them).
    /// Ids outside the deck are ignored. Returns the number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if `chapter_id` is not a chapter of
    /// the deck.
    async fn move_cards(
        &self,
        deck_id: DeckId,
        card_ids: &[CardId],
        chapter_id: Option<ChapterId>,
    ) -> Result<u64, StorageError>;

    /// Unassign every card that references `chapter_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_chapter(&self, chapter_id: ChapterId) -> Result<u64, StorageError>;

    /// Spread the deck's unassigned cards evenly and randomly over
    /// `chapter_ids` as one atomic operation. Returns the number of cards
    /// assigned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if a target is not a chapter of the
    /// deck, or another `StorageError` on backend failures. Nothing is
    /// assigned then.
    async fn distribute_unassigned(
        &self,
        deck_id: DeckId,
        chapter_ids: &[ChapterId],
    ) -> Result<u64, StorageError>;
}

/// Repository contract for per-user learning status.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// The subset of `card_ids` for which `user` has exactly `status` stored.
    ///
    /// One round trip regardless of how many ids are passed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn card_ids_with_status(
        &self,
        user: UserId,
        status: ProgressStatus,
        card_ids: &[CardId],
    ) -> Result<HashSet<CardId>, StorageError>;

    /// Record a status for `(user, card)`. Written by the review flow, never
    /// by aggregation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the status cannot be stored.
    async fn set_status(
        &self,
        user: UserId,
        card_id: CardId,
        status: ProgressStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ensure_in_deck(
    chapters: &HashMap<ChapterId, Chapter>,
    deck_id: DeckId,
    ids: &[ChapterId],
) -> Result<(), StorageError> {
    let all_owned = ids
        .iter()
        .all(|id| chapters.get(id).is_some_and(|c| c.deck_id() == deck_id));
    if all_owned {
        Ok(())
    } else {
        Err(StorageError::NotFound)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    next_id: Arc<AtomicU64>,
    decks: Arc<Mutex<HashMap<DeckId, Deck>>>,
    chapters: Arc<Mutex<HashMap<ChapterId, Chapter>>>,
    cards: Arc<Mutex<HashMap<CardId, Card>>>,
    progress: Arc<Mutex<HashMap<(UserId, CardId), ProgressStatus>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl DeckRepository for InMemoryRepository {
    async fn insert_new_deck(&self, deck: NewDeckRecord) -> Result<DeckId, StorageError> {
        let id = DeckId::new(self.allocate_id());
        let deck = Deck::from_persisted(
            id,
            deck.owner_id,
            deck.name,
            deck.is_shared,
            0,
            deck.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.decks.lock().map_err(poisoned)?.insert(id, deck);
        Ok(id)
    }

    async fn update_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let mut guard = self.decks.lock().map_err(poisoned)?;
        let stored = guard.get_mut(&deck.id()).ok_or(StorageError::NotFound)?;
        // card_count is owned by storage; keep the stored value
        let card_count = stored.card_count();
        *stored = Deck::from_persisted(
            deck.id(),
            deck.owner_id(),
            deck.name(),
            deck.is_shared(),
            card_count,
            deck.created_at(),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(())
    }

    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError> {
        let guard = self.decks.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_decks(&self, owner: UserId, limit: u32) -> Result<Vec<Deck>, StorageError> {
        let guard = self.decks.lock().map_err(poisoned)?;
        let mut decks: Vec<Deck> = guard
            .values()
            .filter(|d| d.owner_id() == owner)
            .cloned()
            .collect();
        decks.sort_by_key(Deck::id);
        decks.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(decks)
    }
}

#[async_trait]
impl ChapterRepository for InMemoryRepository {
    async fn list_chapters(&self, deck_id: DeckId) -> Result<Vec<Chapter>, StorageError> {
        let guard = self.chapters.lock().map_err(poisoned)?;
        let mut chapters: Vec<Chapter> = guard
            .values()
            .filter(|c| c.deck_id() == deck_id)
            .cloned()
            .collect();
        sort_for_listing(&mut chapters);
        Ok(chapters)
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError> {
        let guard = self.chapters.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn count_chapters(&self, deck_id: DeckId) -> Result<u32, StorageError> {
        let guard = self.chapters.lock().map_err(poisoned)?;
        let count = guard.values().filter(|c| c.deck_id() == deck_id).count();
        u32::try_from(count).map_err(|_| StorageError::Serialization("count overflow".into()))
    }

    async fn insert_chapter(&self, chapter: NewChapterRecord) -> Result<Chapter, StorageError> {
        if !self
            .decks
            .lock()
            .map_err(poisoned)?
            .contains_key(&chapter.deck_id)
        {
            return Err(StorageError::NotFound);
        }
        let mut guard = self.chapters.lock().map_err(poisoned)?;
        let count = guard
            .values()
            .filter(|c| c.deck_id() == chapter.deck_id)
            .count();
        if count >= MAX_CHAPTERS_PER_DECK {
            return Err(StorageError::Conflict);
        }

        let id = ChapterId::new(self.allocate_id());
        let chapter = Chapter::new(id, chapter.deck_id, chapter.ordinal, chapter.created_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.insert(id, chapter.clone());
        Ok(chapter)
    }

    async fn update_ordinal(&self, id: ChapterId, ordinal: u32) -> Result<(), StorageError> {
        let mut guard = self.chapters.lock().map_err(poisoned)?;
        let chapter = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        chapter
            .set_ordinal(ordinal)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn delete_chapter(&self, id: ChapterId) -> Result<(), StorageError> {
        let mut guard = self.chapters.lock().map_err(poisoned)?;
        guard.remove(&id).ok_or(StorageError::NotFound)?;

        // same effect as ON DELETE SET NULL in the SQLite schema
        let mut cards = self.cards.lock().map_err(poisoned)?;
        for card in cards.values_mut() {
            if card.chapter_id() == Some(id) {
                card.set_chapter(None);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CardRepository for InMemoryRepository {
    async fn insert_new_card(&self, card: NewCardRecord) -> Result<CardId, StorageError> {
        let mut decks = self.decks.lock().map_err(poisoned)?;
        let deck = decks.get_mut(&card.deck_id).ok_or(StorageError::NotFound)?;

        let chapters = self.chapters.lock().map_err(poisoned)?;
        if let Some(chapter_id) = card.chapter_id {
            ensure_in_deck(&chapters, card.deck_id, &[chapter_id])?;
        }

        let id = CardId::new(self.allocate_id());
        let stored = Card::new(
            id,
            card.deck_id,
            card.chapter_id,
            card.prompt,
            card.answer,
            card.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.cards.lock().map_err(poisoned)?.insert(id, stored);

        *deck = Deck::from_persisted(
            deck.id(),
            deck.owner_id(),
            deck.name(),
            deck.is_shared(),
            deck.card_count().saturating_add(1),
            deck.created_at(),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(id)
    }

    async fn list_cards(&self, deck_id: DeckId, limit: u32) -> Result<Vec<Card>, StorageError> {
        let guard = self.cards.lock().map_err(poisoned)?;
        let mut cards: Vec<Card> = guard
            .values()
            .filter(|c| c.deck_id() == deck_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| (c.created_at(), c.id()));
        cards.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(cards)
    }

    async fn card_placements(&self, deck_id: DeckId) -> Result<Vec<CardPlacement>, StorageError> {
        let guard = self.cards.lock().map_err(poisoned)?;
        let mut placements: Vec<CardPlacement> = guard
            .values()
            .filter(|c| c.deck_id() == deck_id)
            .map(CardPlacement::from)
            .collect();
        placements.sort_by_key(|p| p.card_id);
        Ok(placements)
    }

    async fn move_cards(
        &self,
        deck_id: DeckId,
        card_ids: &[CardId],
        chapter_id: Option<ChapterId>,
    ) -> Result<u64, StorageError> {
        let chapters = self.chapters.lock().map_err(poisoned)?;
        if let Some(target) = chapter_id {
            ensure_in_deck(&chapters, deck_id, &[target])?;
        }

        let mut guard = self.cards.lock().map_err(poisoned)?;
        let wanted: HashSet<CardId> = card_ids.iter().copied().collect();
        let mut updated = 0;
        for card in guard.values_mut() {
            if card.deck_id() == deck_id && wanted.contains(&card.id()) {
                card.set_chapter(chapter_id);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn clear_chapter(&self, chapter_id: ChapterId) -> Result<u64, StorageError> {
        let mut guard = self.cards.lock().map_err(poisoned)?;
        let mut updated = 0;
        for card in guard.values_mut() {
            if card.chapter_id() == Some(chapter_id) {
                card.set_chapter(None);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn distribute_unassigned(
        &self,
        deck_id: DeckId,
        chapter_ids: &[ChapterId],
    ) -> Result<u64, StorageError> {
        let chapters = self.chapters.lock().map_err(poisoned)?;
        ensure_in_deck(&chapters, deck_id, chapter_ids)?;

        let mut guard = self.cards.lock().map_err(poisoned)?;
        let unassigned: Vec<CardId> = guard
            .values()
            .filter(|c| c.deck_id() == deck_id && c.chapter_id().is_none())
            .map(Card::id)
            .collect();

        let plan = plan_even_distribution(unassigned, chapter_ids, &mut rand::rng());
        for assignment in &plan {
            if let Some(card) = guard.get_mut(&assignment.card_id) {
                card.set_chapter(Some(assignment.chapter_id));
            }
        }
        Ok(plan.len() as u64)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn card_ids_with_status(
        &self,
        user: UserId,
        status: ProgressStatus,
        card_ids: &[CardId],
    ) -> Result<HashSet<CardId>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(card_ids
            .iter()
            .copied()
            .filter(|id| guard.get(&(user, *id)) == Some(&status))
            .collect())
    }

    async fn set_status(
        &self,
        user: UserId,
        card_id: CardId,
        status: ProgressStatus,
        _at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert((user, card_id), status);
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub decks: Arc<dyn DeckRepository>,
    pub chapters: Arc<dyn ChapterRepository>,
    pub cards: Arc<dyn CardRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wires one repository type that implements every contract.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: DeckRepository
            + ChapterRepository
            + CardRepository
            + ProgressRepository
            + Clone
            + 'static,
    {
        Self {
            decks: Arc::new(repo.clone()),
            chapters: Arc::new(repo.clone()),
            cards: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}
