use std::sync::Arc;

use deck_core::model::{Card, CardId, ChapterId, DeckId, validate_text};
use storage::repository::{CardRepository, NewCardRecord};

use crate::Clock;
use crate::error::CardServiceError;

/// Orchestrates card creation and listing.
#[derive(Clone)]
pub struct CardService {
    clock: Clock,
    cards: Arc<dyn CardRepository>,
}

impl CardService {
    #[must_use]
    pub fn new(clock: Clock, cards: Arc<dyn CardRepository>) -> Self {
        Self { clock, cards }
    }

    /// Create a card, optionally placed straight into a chapter.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Card` for blank text,
    /// `CardServiceError::NotFound` if the deck is gone or the chapter is not
    /// one of its chapters.
    pub async fn create_card(
        &self,
        deck_id: DeckId,
        chapter_id: Option<ChapterId>,
        prompt: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<CardId, CardServiceError> {
        let prompt = prompt.into();
        let answer = answer.into();
        validate_text(&prompt, &answer)?;

        let card_id = self
            .cards
            .insert_new_card(NewCardRecord {
                deck_id,
                chapter_id,
                prompt,
                answer,
                created_at: self.clock.now(),
            })
            .await?;
        log::debug!("card created deck_id={deck_id} card_id={card_id}");
        Ok(card_id)
    }

    /// List cards for a deck, oldest first, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if repository access fails.
    pub async fn list_cards(&self, deck_id: DeckId, limit: u32) -> Result<Vec<Card>, CardServiceError> {
        Ok(self.cards.list_cards(deck_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use deck_core::model::{CardError, UserId};
    use deck_core::time::fixed_now;
    use storage::repository::{
        ChapterRepository, DeckRepository, InMemoryRepository, NewChapterRecord, NewDeckRecord,
    };

    async fn deck(repo: &InMemoryRepository) -> DeckId {
        repo.insert_new_deck(NewDeckRecord {
            owner_id: UserId::random(),
            name: "Italian".into(),
            is_shared: false,
            created_at: fixed_now(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_card_validates_and_persists() {
        let repo = InMemoryRepository::new();
        let deck_id = repo
            .insert_new_deck(NewDeckRecord {
                owner_id: UserId::random(),
                name: "Spanish".into(),
                is_shared: false,
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        let service = CardService::new(Clock::Fixed(fixed_now()), Arc::new(repo.clone()));

        let err = service
            .create_card(deck_id, None, "hola", " ")
            .await
            .unwrap_err();
        assert!(matches!(err, CardServiceError::Card(CardError::EmptyAnswer)));

        let id = service.create_card(deck_id, None, "hola", "hello").await.unwrap();
        let cards = service.list_cards(deck_id, 10).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id(), id);
        assert_eq!(cards[0].chapter_id(), None);

        let deck = repo.get_deck(deck_id).await.unwrap().unwrap();
        assert_eq!(deck.card_count(), 1);
    }

    #[tokio::test]
    async fn card_for_missing_deck_is_not_found() {
        let service = CardService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(InMemoryRepository::new()),
        );
        let err = service
            .create_card(DeckId::new(77), None, "q", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, CardServiceError::NotFound));
    }

    #[tokio::test]
    async fn card_cannot_join_a_chapter_of_another_deck() {
        let repo = InMemoryRepository::new();
        let mine = deck(&repo).await;
        let theirs = deck(&repo).await;
        let foreign = repo
            .insert_chapter(NewChapterRecord {
                deck_id: theirs,
                ordinal: 1,
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        let service = CardService::new(Clock::Fixed(fixed_now()), Arc::new(repo.clone()));

        let err = service
            .create_card(mine, Some(foreign.id()), "ciao", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, CardServiceError::NotFound));

        let err = service
            .create_card(mine, Some(ChapterId::new(9999)), "ciao", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, CardServiceError::NotFound));

        assert!(repo.card_placements(mine).await.unwrap().is_empty());
        assert_eq!(repo.get_deck(mine).await.unwrap().unwrap().card_count(), 0);
    }

    #[tokio::test]
    async fn card_can_start_in_a_chapter_of_its_deck() {
        let repo = InMemoryRepository::new();
        let deck_id = deck(&repo).await;
        let chapter = repo
            .insert_chapter(NewChapterRecord {
                deck_id,
                ordinal: 1,
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        let service = CardService::new(Clock::Fixed(fixed_now()), Arc::new(repo.clone()));

        service
            .create_card(deck_id, Some(chapter.id()), "ciao", "hi")
            .await
            .unwrap();
        let cards = service.list_cards(deck_id, 10).await.unwrap();
        assert_eq!(cards[0].chapter_id(), Some(chapter.id()));
    }
}
