use std::sync::Arc;

use deck_core::model::{AccessError, Deck, DeckId, DeckPermit, UserId};
use storage::repository::{DeckRepository, NewDeckRecord};

use crate::Clock;
use crate::error::DeckServiceError;

/// Orchestrates deck creation, ownership checks and persistence.
#[derive(Clone)]
pub struct DeckService {
    clock: Clock,
    decks: Arc<dyn DeckRepository>,
}

impl DeckService {
    #[must_use]
    pub fn new(clock: Clock, decks: Arc<dyn DeckRepository>) -> Self {
        Self { clock, decks }
    }

    /// Create a new private deck owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Deck` for validation failures.
    /// Returns `DeckServiceError::Storage` if persistence fails.
    pub async fn create_deck(
        &self,
        owner: UserId,
        name: impl Into<String>,
    ) -> Result<DeckId, DeckServiceError> {
        let deck = Deck::new(DeckId::new(1), owner, name, self.clock.now())?;
        let deck_id = self
            .decks
            .insert_new_deck(NewDeckRecord::from_deck(&deck))
            .await?;
        log::info!("deck created deck_id={deck_id} owner={owner}");
        Ok(deck_id)
    }

    /// Fetch a deck by ID.
    ///
    /// Returns `Ok(None)` when the deck does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn get_deck(&self, deck_id: DeckId) -> Result<Option<Deck>, DeckServiceError> {
        Ok(self.decks.get_deck(deck_id).await?)
    }

    /// List decks owned by `owner`, ordered by ID, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn list_decks(&self, owner: UserId, limit: u32) -> Result<Vec<Deck>, DeckServiceError> {
        Ok(self.decks.list_decks(owner, limit).await?)
    }

    /// Issue a permit to change the chapter layout of a deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::NotFound` for an unknown deck and
    /// `DeckServiceError::Access` when `user` is not the owner or the deck is
    /// shared.
    pub async fn permit(&self, deck_id: DeckId, user: UserId) -> Result<DeckPermit, DeckServiceError> {
        let deck = self.load(deck_id).await?;
        DeckPermit::grant(&deck, user).map_err(|err| {
            log::warn!("deck permit refused deck_id={deck_id} user_id={user}: {err}");
            err.into()
        })
    }

    /// Rename a deck the permit covers.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Deck` if the new name is blank, or
    /// `DeckServiceError::Access` for a permit of another deck.
    pub async fn rename_deck(
        &self,
        permit: &DeckPermit,
        deck_id: DeckId,
        name: impl Into<String>,
    ) -> Result<(), DeckServiceError> {
        permit.check(deck_id)?;
        let mut deck = self.load(deck_id).await?;
        deck.rename(name)?;
        self.decks.update_deck(&deck).await?;
        Ok(())
    }

    /// Toggle sharing. Only the owner may do this; a shared deck can be made
    /// private again, which is why no permit is required here.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Access` when `user` is not the owner.
    pub async fn set_shared(
        &self,
        deck_id: DeckId,
        user: UserId,
        shared: bool,
    ) -> Result<(), DeckServiceError> {
        let mut deck = self.load(deck_id).await?;
        if deck.owner_id() != user {
            return Err(AccessError::NotOwner {
                deck: deck_id,
                user,
            }
            .into());
        }
        deck.set_shared(shared);
        self.decks.update_deck(&deck).await?;
        log::info!("deck sharing changed deck_id={deck_id} shared={shared}");
        Ok(())
    }

    async fn load(&self, deck_id: DeckId) -> Result<Deck, DeckServiceError> {
        self.decks
            .get_deck(deck_id)
            .await?
            .ok_or(DeckServiceError::NotFound)
    }
}
