use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{DeckId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck name cannot be empty")]
    EmptyName,
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// A named collection of cards owned by a single user.
///
/// A shared deck is published to other users and is immutable: its chapter
/// layout cannot be changed while it stays shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    id: DeckId,
    owner_id: UserId,
    name: String,
    is_shared: bool,
    card_count: u32,
    created_at: DateTime<Utc>,
}

impl Deck {
    /// Creates a new, private and empty deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if name is empty or whitespace-only.
    pub fn new(
        id: DeckId,
        owner_id: UserId,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DeckError> {
        Self::from_persisted(id, owner_id, name, false, 0, created_at)
    }

    /// Rehydrates a deck loaded from storage.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if the stored name is blank.
    pub fn from_persisted(
        id: DeckId,
        owner_id: UserId,
        name: impl Into<String>,
        is_shared: bool,
        card_count: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DeckError> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(DeckError::EmptyName);
        }

        Ok(Self {
            id,
            owner_id,
            name: name.to_owned(),
            is_shared,
            card_count,
            created_at,
        })
    }

    /// Returns a copy of this deck carrying a storage-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: DeckId) -> Self {
        self.id = id;
        self
    }

    /// Renames the deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if the new name is blank.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), DeckError> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(DeckError::EmptyName);
        }
        name.clone_into(&mut self.name);
        Ok(())
    }

    pub fn set_shared(&mut self, shared: bool) {
        self.is_shared = shared;
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> DeckId {
        self.id
    }

    #[must_use]
    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.is_shared
    }

    /// Denormalized number of cards in the deck, maintained by storage.
    #[must_use]
    pub fn card_count(&self) -> u32 {
        self.card_count
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn deck_new_rejects_empty_name() {
        let err = Deck::new(DeckId::new(1), UserId::random(), "   ", fixed_now()).unwrap_err();
        assert_eq!(err, DeckError::EmptyName);
    }

    #[test]
    fn deck_new_is_private_and_empty() {
        let owner = UserId::random();
        let deck = Deck::new(DeckId::new(3), owner, "  Spanish  ", fixed_now()).unwrap();

        assert_eq!(deck.name(), "Spanish");
        assert_eq!(deck.owner_id(), owner);
        assert!(!deck.is_shared());
        assert_eq!(deck.card_count(), 0);
    }

    #[test]
    fn rename_keeps_old_name_on_error() {
        let mut deck = Deck::new(DeckId::new(1), UserId::random(), "French", fixed_now()).unwrap();
        assert!(deck.rename(" ").is_err());
        assert_eq!(deck.name(), "French");

        deck.rename("French A2").unwrap();
        assert_eq!(deck.name(), "French A2");
    }
}
