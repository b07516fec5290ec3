use std::collections::HashSet;
use std::sync::Arc;

use deck_core::model::{ChapterId, DeckId, DeckPermit};
use storage::repository::{CardRepository, ChapterRepository};

use crate::error::DistributionError;

/// Spreads a deck's unassigned cards across chapters.
#[derive(Clone)]
pub struct DistributionService {
    chapters: Arc<dyn ChapterRepository>,
    cards: Arc<dyn CardRepository>,
}

impl DistributionService {
    #[must_use]
    pub fn new(chapters: Arc<dyn ChapterRepository>, cards: Arc<dyn CardRepository>) -> Self {
        Self { chapters, cards }
    }

    /// Assign every unassigned card of the deck to one of `targets`.
    ///
    /// Cards are shuffled and dealt round-robin, so chapter sizes differ by
    /// at most one. Cards that already belong to a chapter are not touched.
    /// Repeated targets count once.
    ///
    /// Returns the number of cards assigned.
    ///
    /// # Errors
    ///
    /// Returns `DistributionError::NoChaptersAvailable` for an empty target
    /// list, `DistributionError::NotFound` when a target is not a chapter of
    /// the deck, `DistributionError::Access` for a permit of another deck.
    pub async fn distribute_unassigned_evenly(
        &self,
        permit: &DeckPermit,
        deck_id: DeckId,
        targets: &[ChapterId],
    ) -> Result<u64, DistributionError> {
        permit.check(deck_id)?;

        let mut seen = HashSet::with_capacity(targets.len());
        let targets: Vec<ChapterId> = targets
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if targets.is_empty() {
            return Err(DistributionError::NoChaptersAvailable);
        }

        let owned: HashSet<ChapterId> = self
            .chapters
            .list_chapters(deck_id)
            .await?
            .iter()
            .map(|c| c.id())
            .collect();
        if let Some(stray) = targets.iter().find(|id| !owned.contains(id)) {
            log::warn!("distribution target outside deck deck_id={deck_id} chapter_id={stray}");
            return Err(DistributionError::NotFound);
        }

        let assigned = self.cards.distribute_unassigned(deck_id, &targets).await?;
        log::info!(
            "unassigned cards distributed deck_id={deck_id} assigned={assigned} chapters={}",
            targets.len()
        );
        Ok(assigned)
    }
}
