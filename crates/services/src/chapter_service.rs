use std::sync::Arc;

use deck_core::model::{
    CardId, Chapter, ChapterError, ChapterId, DeckId, DeckPermit, MAX_CHAPTERS_PER_DECK,
    next_ordinal, renumber_plan,
};
use storage::repository::{CardRepository, ChapterRepository, NewChapterRecord, StorageError};

use crate::Clock;
use crate::error::ChapterServiceError;

/// Chapter CRUD and maintenance of the per-deck ordinal sequence.
///
/// Mutating calls take a [`DeckPermit`]; the service never looks up who is
/// calling.
#[derive(Clone)]
pub struct ChapterService {
    clock: Clock,
    chapters: Arc<dyn ChapterRepository>,
    cards: Arc<dyn CardRepository>,
}

impl ChapterService {
    #[must_use]
    pub fn new(
        clock: Clock,
        chapters: Arc<dyn ChapterRepository>,
        cards: Arc<dyn CardRepository>,
    ) -> Self {
        Self {
            clock,
            chapters,
            cards,
        }
    }

    /// Chapters of a deck in display order: ordinal ascending, oldest first
    /// among equal ordinals.
    ///
    /// # Errors
    ///
    /// Returns `ChapterServiceError::Storage` if repository access fails.
    pub async fn list_chapters(&self, deck_id: DeckId) -> Result<Vec<Chapter>, ChapterServiceError> {
        Ok(self.chapters.list_chapters(deck_id).await?)
    }

    /// The ordinal a newly appended chapter should get: one past the highest
    /// existing ordinal, or 1 for an empty deck.
    ///
    /// # Errors
    ///
    /// Returns `ChapterServiceError::Storage` if repository access fails.
    pub async fn next_ordinal(&self, deck_id: DeckId) -> Result<u32, ChapterServiceError> {
        let chapters = self.chapters.list_chapters(deck_id).await?;
        Ok(next_ordinal(&chapters))
    }

    /// Create a chapter at `ordinal`.
    ///
    /// The count read here only short-circuits the common case; storage
    /// enforces the cap again as part of the insert, so concurrent creates
    /// cannot push a deck past it.
    ///
    /// # Errors
    ///
    /// Returns `ChapterServiceError::LimitExceeded` when the deck already has
    /// `MAX_CHAPTERS_PER_DECK` chapters, `ChapterServiceError::Chapter` for a
    /// zero ordinal, `ChapterServiceError::Access` for a permit of another
    /// deck and `ChapterServiceError::NotFound` if the deck is gone.
    pub async fn create_chapter(
        &self,
        permit: &DeckPermit,
        deck_id: DeckId,
        ordinal: u32,
    ) -> Result<Chapter, ChapterServiceError> {
        permit.check(deck_id)?;
        if ordinal == 0 {
            return Err(ChapterError::InvalidOrdinal.into());
        }

        let count = self.chapters.count_chapters(deck_id).await?;
        ensure_below_cap(count as usize)?;

        self.insert(deck_id, ordinal).await
    }

    /// Create a chapter appended after the current last one.
    ///
    /// # Errors
    ///
    /// Same as [`ChapterService::create_chapter`].
    pub async fn create_next_chapter(
        &self,
        permit: &DeckPermit,
        deck_id: DeckId,
    ) -> Result<Chapter, ChapterServiceError> {
        permit.check(deck_id)?;

        let existing = self.chapters.list_chapters(deck_id).await?;
        ensure_below_cap(existing.len())?;

        self.insert(deck_id, next_ordinal(&existing)).await
    }

    async fn insert(&self, deck_id: DeckId, ordinal: u32) -> Result<Chapter, ChapterServiceError> {
        let chapter = self
            .chapters
            .insert_chapter(NewChapterRecord {
                deck_id,
                ordinal,
                created_at: self.clock.now(),
            })
            .await
            .map_err(|err| match err {
                StorageError::Conflict => ChapterServiceError::LimitExceeded {
                    limit: MAX_CHAPTERS_PER_DECK,
                },
                other => other.into(),
            })?;
        log::info!(
            "chapter created deck_id={deck_id} chapter_id={} ordinal={ordinal}",
            chapter.id()
        );
        Ok(chapter)
    }

    /// Delete a chapter. Its cards move to the unassigned bucket first; no
    /// card is ever deleted. Ordinals of the remaining chapters are left
    /// as-is; call [`ChapterService::reorder_ordinals`] to close the gap.
    ///
    /// Returns the number of cards that were unassigned.
    ///
    /// # Errors
    ///
    /// Returns `ChapterServiceError::NotFound` if the chapter does not exist
    /// or belongs to a deck the permit does not cover, and
    /// `ChapterServiceError::Storage` on repository failures.
    pub async fn delete_chapter(
        &self,
        permit: &DeckPermit,
        chapter_id: ChapterId,
    ) -> Result<u64, ChapterServiceError> {
        let chapter = self
            .chapters
            .get_chapter(chapter_id)
            .await?
            .ok_or(ChapterServiceError::NotFound)?;
        if chapter.deck_id() != permit.deck_id() {
            return Err(ChapterServiceError::NotFound);
        }

        let unassigned = self.cards.clear_chapter(chapter_id).await?;
        self.chapters.delete_chapter(chapter_id).await?;

        log::info!(
            "chapter deleted deck_id={} chapter_id={chapter_id} unassigned_cards={unassigned}",
            chapter.deck_id()
        );
        Ok(unassigned)
    }

    /// Rewrite ordinals to `1..N` following display order.
    ///
    /// Writes happen one chapter at a time, in display order, and only for
    /// chapters whose ordinal changes. The sequence is not atomic: if a write
    /// fails the deck is left partially renumbered, listing stays
    /// deterministic through the creation-time tiebreak, and running the
    /// reorder again finishes the job. Running it twice in a row is a no-op
    /// the second time.
    ///
    /// # Errors
    ///
    /// Returns `ChapterServiceError::Access` for a permit of another deck or
    /// the first repository error encountered.
    pub async fn reorder_ordinals(
        &self,
        permit: &DeckPermit,
        deck_id: DeckId,
    ) -> Result<Vec<Chapter>, ChapterServiceError> {
        permit.check(deck_id)?;

        let mut chapters = self.chapters.list_chapters(deck_id).await?;
        let plan = renumber_plan(&chapters);

        for change in &plan {
            self.chapters
                .update_ordinal(change.chapter_id, change.to)
                .await?;
            log::debug!(
                "chapter ordinal rewritten chapter_id={} from={} to={}",
                change.chapter_id,
                change.from,
                change.to
            );
        }

        // list_chapters already returns display order, so positions line up
        // with the targets of the plan
        for (chapter, position) in chapters.iter_mut().zip(1u32..) {
            chapter.set_ordinal(position)?;
        }

        if !plan.is_empty() {
            log::info!(
                "chapters reordered deck_id={deck_id} rewritten={} total={}",
                plan.len(),
                chapters.len()
            );
        }
        Ok(chapters)
    }

    /// Move cards of a deck into `target`, or back to the unassigned bucket
    /// when `target` is `None`. Cards of other decks are ignored.
    ///
    /// Returns the number of cards updated.
    ///
    /// # Errors
    ///
    /// Returns `ChapterServiceError::NotFound` if `target` is not a chapter of
    /// the deck, `ChapterServiceError::Access` for a permit of another deck.
    pub async fn move_cards(
        &self,
        permit: &DeckPermit,
        deck_id: DeckId,
        card_ids: &[CardId],
        target: Option<ChapterId>,
    ) -> Result<u64, ChapterServiceError> {
        permit.check(deck_id)?;

        if let Some(chapter_id) = target {
            let chapter = self
                .chapters
                .get_chapter(chapter_id)
                .await?
                .ok_or(ChapterServiceError::NotFound)?;
            if chapter.deck_id() != deck_id {
                return Err(ChapterServiceError::NotFound);
            }
        }

        let moved = self.cards.move_cards(deck_id, card_ids, target).await?;
        log::debug!(
            "cards moved deck_id={deck_id} target={} moved={moved}",
            target.map_or_else(|| "unassigned".to_owned(), |id| id.to_string())
        );
        Ok(moved)
    }
}

fn ensure_below_cap(count: usize) -> Result<(), ChapterServiceError> {
    if count >= MAX_CHAPTERS_PER_DECK {
        return Err(ChapterServiceError::LimitExceeded {
            limit: MAX_CHAPTERS_PER_DECK,
        });
    }
    Ok(())
}
