mod access;
mod card;
mod chapter;
mod deck;
mod ids;
mod progress;

pub use ids::{CardId, ChapterId, DeckId, ParseIdError, UserId};

pub use access::{AccessError, DeckPermit};
pub use card::{Card, CardError, CardPlacement, validate_text};
pub use chapter::{
    Chapter, ChapterError, ChapterKey, MAX_CHAPTERS_PER_DECK, OrdinalChange, next_ordinal,
    renumber_plan, sort_for_listing,
};
pub use deck::{Deck, DeckError};
pub use progress::{ChapterStats, ParseStatusError, ProgressStatus};
