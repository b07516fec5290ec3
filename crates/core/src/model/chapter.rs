use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ChapterId, DeckId};

/// Policy cap on the number of chapters a single deck may hold.
pub const MAX_CHAPTERS_PER_DECK: usize = 30;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChapterError {
    #[error("chapter ordinal must be >= 1")]
    InvalidOrdinal,
}

//
// ─── CHAPTER ───────────────────────────────────────────────────────────────────
//

/// An ordered subdivision of a deck.
///
/// Ordinals are unique and contiguous (`1..N`) right after a reorder. Between
/// reorders they may have gaps, so listing always falls back on creation
/// time to stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    id: ChapterId,
    deck_id: DeckId,
    ordinal: u32,
    created_at: DateTime<Utc>,
}

impl Chapter {
    /// # Errors
    ///
    /// Returns `ChapterError::InvalidOrdinal` when `ordinal` is zero.
    pub fn new(
        id: ChapterId,
        deck_id: DeckId,
        ordinal: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ChapterError> {
        if ordinal == 0 {
            return Err(ChapterError::InvalidOrdinal);
        }
        Ok(Self {
            id,
            deck_id,
            ordinal,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// # Errors
    ///
    /// Returns `ChapterError::InvalidOrdinal` when `ordinal` is zero.
    pub fn set_ordinal(&mut self, ordinal: u32) -> Result<(), ChapterError> {
        if ordinal == 0 {
            return Err(ChapterError::InvalidOrdinal);
        }
        self.ordinal = ordinal;
        Ok(())
    }

    /// Display order: ordinal, then oldest first, then id.
    #[must_use]
    pub fn listing_cmp(&self, other: &Self) -> Ordering {
        self.ordinal
            .cmp(&other.ordinal)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sorts chapters into display order.
pub fn sort_for_listing(chapters: &mut [Chapter]) {
    chapters.sort_by(Chapter::listing_cmp);
}

/// One ordinal rewrite produced by [`renumber_plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrdinalChange {
    pub chapter_id: ChapterId,
    pub from: u32,
    pub to: u32,
}

/// Computes the writes that bring `chapters` to ordinals `1..N` in display
/// order. Chapters already at their target ordinal are left out, so a plan
/// computed over an already contiguous deck is empty.
#[must_use]
pub fn renumber_plan(chapters: &[Chapter]) -> Vec<OrdinalChange> {
    let mut ordered: Vec<&Chapter> = chapters.iter().collect();
    ordered.sort_by(|a, b| a.listing_cmp(b));

    ordered
        .into_iter()
        .zip(1u32..)
        .filter(|(chapter, position)| chapter.ordinal != *position)
        .map(|(chapter, position)| OrdinalChange {
            chapter_id: chapter.id,
            from: chapter.ordinal,
            to: position,
        })
        .collect()
}

/// Returns `1 + max(ordinal)`, or `1` for a deck with no chapters.
#[must_use]
pub fn next_ordinal(chapters: &[Chapter]) -> u32 {
    chapters
        .iter()
        .map(Chapter::ordinal)
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

//
// ─── CHAPTER KEY ───────────────────────────────────────────────────────────────
//

/// Key space for per-chapter statistics: a real chapter, or the implicit
/// bucket of cards that belong to no chapter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChapterKey {
    Chapter(ChapterId),
    Unassigned,
}

impl ChapterKey {
    #[must_use]
    pub fn from_chapter_ref(chapter_id: Option<ChapterId>) -> Self {
        chapter_id.map_or(Self::Unassigned, Self::Chapter)
    }

    #[must_use]
    pub fn chapter_id(&self) -> Option<ChapterId> {
        match self {
            Self::Chapter(id) => Some(*id),
            Self::Unassigned => None,
        }
    }

    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        matches!(self, Self::Unassigned)
    }
}

impl From<ChapterId> for ChapterKey {
    fn from(id: ChapterId) -> Self {
        Self::Chapter(id)
    }
}

impl fmt::Debug for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chapter(id) => write!(f, "ChapterKey({})", id.value()),
            Self::Unassigned => f.write_str("ChapterKey(unassigned)"),
        }
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chapter(id) => write!(f, "{id}"),
            Self::Unassigned => f.write_str("unassigned"),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
