use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::chapter::ChapterKey;
use crate::model::ids::{CardId, ChapterId, DeckId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardError {
    #[error("card prompt cannot be empty")]
    EmptyPrompt,

    #[error("card answer cannot be empty")]
    EmptyAnswer,
}

/// Checks that both sides of a card carry some text.
///
/// # Errors
///
/// Returns `CardError::EmptyPrompt` or `CardError::EmptyAnswer`.
pub fn validate_text(prompt: &str, answer: &str) -> Result<(), CardError> {
    if prompt.trim().is_empty() {
        return Err(CardError::EmptyPrompt);
    }
    if answer.trim().is_empty() {
        return Err(CardError::EmptyAnswer);
    }
    Ok(())
}

/// A question/answer card.
///
/// Prompt and answer are opaque to chapter bookkeeping; only the deck and the
/// optional chapter reference matter here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    id: CardId,
    deck_id: DeckId,
    chapter_id: Option<ChapterId>,
    prompt: String,
    answer: String,
    created_at: DateTime<Utc>,
}

impl Card {
    /// # Errors
    ///
    /// Returns `CardError` if the prompt or answer is blank.
    pub fn new(
        id: CardId,
        deck_id: DeckId,
        chapter_id: Option<ChapterId>,
        prompt: impl Into<String>,
        answer: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CardError> {
        let prompt = prompt.into();
        let answer = answer.into();
        validate_text(&prompt, &answer)?;
        Ok(Self {
            id,
            deck_id,
            chapter_id,
            prompt,
            answer,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> CardId {
        self.id
    }

    #[must_use]
    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    /// `None` means the card sits in the unassigned bucket.
    #[must_use]
    pub fn chapter_id(&self) -> Option<ChapterId> {
        self.chapter_id
    }

    #[must_use]
    pub fn chapter_key(&self) -> ChapterKey {
        ChapterKey::from_chapter_ref(self.chapter_id)
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn set_chapter(&mut self, chapter_id: Option<ChapterId>) {
        self.chapter_id = chapter_id;
    }
}

/// Lightweight projection of a card used by aggregation: which bucket it is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardPlacement {
    pub card_id: CardId,
    pub chapter_id: Option<ChapterId>,
}

impl CardPlacement {
    #[must_use]
    pub fn key(&self) -> ChapterKey {
        ChapterKey::from_chapter_ref(self.chapter_id)
    }
}

impl From<&Card> for CardPlacement {
    fn from(card: &Card) -> Self {
        Self {
            card_id: card.id,
            chapter_id: card.chapter_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn blank_prompt_is_rejected() {
        let err = Card::new(CardId::new(1), DeckId::new(1), None, "  ", "a", fixed_now())
            .unwrap_err();
        assert_eq!(err, CardError::EmptyPrompt);
    }

    #[test]
    fn new_card_without_chapter_is_unassigned() {
        let card = Card::new(CardId::new(1), DeckId::new(1), None, "q", "a", fixed_now()).unwrap();
        assert_eq!(card.chapter_key(), ChapterKey::Unassigned);
        assert_eq!(CardPlacement::from(&card).key(), ChapterKey::Unassigned);
    }
}
