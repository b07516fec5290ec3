use thiserror::Error;

use crate::model::deck::Deck;
use crate::model::ids::{DeckId, UserId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    #[error("user {user} does not own deck {deck}")]
    NotOwner { deck: DeckId, user: UserId },

    #[error("deck {0} is shared and cannot be modified")]
    SharedDeck(DeckId),

    #[error("permit for deck {permit} used on deck {target}")]
    WrongDeck { permit: DeckId, target: DeckId },
}

/// Capability to change the chapter layout of one deck.
///
/// Only [`DeckPermit::grant`] creates one, and it does so only for the deck
/// owner while the deck is private. Mutating chapter operations take a
/// `&DeckPermit` instead of consulting any session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckPermit {
    deck_id: DeckId,
    user_id: UserId,
}

impl DeckPermit {
    /// # Errors
    ///
    /// Returns `AccessError::NotOwner` when `user` is not the owner, or
    /// `AccessError::SharedDeck` when the deck is shared.
    pub fn grant(deck: &Deck, user: UserId) -> Result<Self, AccessError> {
        if deck.owner_id() != user {
            return Err(AccessError::NotOwner {
                deck: deck.id(),
                user,
            });
        }
        if deck.is_shared() {
            return Err(AccessError::SharedDeck(deck.id()));
        }
        Ok(Self {
            deck_id: deck.id(),
            user_id: user,
        })
    }

    #[must_use]
    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// # Errors
    ///
    /// Returns `AccessError::WrongDeck` when the permit covers another deck.
    pub fn check(&self, deck_id: DeckId) -> Result<(), AccessError> {
        if self.deck_id == deck_id {
            Ok(())
        } else {
            Err(AccessError::WrongDeck {
                permit: self.deck_id,
                target: deck_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn deck(owner: UserId) -> Deck {
        Deck::new(DeckId::new(9), owner, "Biology", fixed_now()).unwrap()
    }

    #[test]
    fn owner_of_private_deck_gets_permit() {
        let owner = UserId::random();
        let permit = DeckPermit::grant(&deck(owner), owner).unwrap();
        assert_eq!(permit.deck_id(), DeckId::new(9));
        assert_eq!(permit.user_id(), owner);
        assert!(permit.check(DeckId::new(9)).is_ok());
    }

    #[test]
    fn stranger_is_refused() {
        let err = DeckPermit::grant(&deck(UserId::random()), UserId::random()).unwrap_err();
        assert!(matches!(err, AccessError::NotOwner { .. }));
    }

    #[test]
    fn shared_deck_is_immutable_even_for_owner() {
        let owner = UserId::random();
        let mut shared = deck(owner);
        shared.set_shared(true);
        let err = DeckPermit::grant(&shared, owner).unwrap_err();
        assert_eq!(err, AccessError::SharedDeck(DeckId::new(9)));
    }

    #[test]
    fn permit_is_scoped_to_its_deck() {
        let owner = UserId::random();
        let permit = DeckPermit::grant(&deck(owner), owner).unwrap();
        let err = permit.check(DeckId::new(10)).unwrap_err();
        assert_eq!(
            err,
            AccessError::WrongDeck {
                permit: DeckId::new(9),
                target: DeckId::new(10)
            }
        );
    }
}
