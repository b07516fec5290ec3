use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-user learning status of a card.
///
/// Transitions (`New -> Learning -> Learned`) belong to the review flow; this
/// crate only reads them. A card without a stored status is `New`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    New,
    Learning,
    Learned,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Learned => "learned",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown progress status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for ProgressStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "learning" => Ok(Self::Learning),
            "learned" => Ok(Self::Learned),
            other => Err(ParseStatusError(other.to_owned())),
        }
    }
}

/// Learning statistics for one chapter key (or a whole deck).
///
/// `new` is never counted directly: it is whatever is neither learned nor
/// learning, which keeps `learned + learning + new == total` by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterStats {
    pub total: u32,
    pub learned: u32,
    pub learning: u32,
    pub new: u32,
}

impl ChapterStats {
    /// Builds stats from the bucket size and the two explicit status counts.
    ///
    /// Counts larger than the bucket are clamped so that `new` cannot go
    /// negative even if a caller passes inconsistent inputs.
    #[must_use]
    pub fn from_counts(total: u32, learned: u32, learning: u32) -> Self {
        let learned = learned.min(total);
        let learning = learning.min(total - learned);
        Self {
            total,
            learned,
            learning,
            new: total - learned - learning,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Share of learned cards in `[0, 1]`; `0` for an empty bucket.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.learned) / f64::from(self.total)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl std::ops::Add for ChapterStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            total: self.total + rhs.total,
            learned: self.learned + rhs.learned,
            learning: self.learning + rhs.learning,
            new: self.new + rhs.new,
        }
    }
}

impl std::iter::Sum for ChapterStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::empty(), |acc, s| acc + s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ProgressStatus::New,
            ProgressStatus::Learning,
            ProgressStatus::Learned,
        ] {
            assert_eq!(status.as_str().parse::<ProgressStatus>().unwrap(), status);
        }
        assert!("mastered".parse::<ProgressStatus>().is_err());
    }

    #[test]
    fn new_is_derived_by_subtraction() {
        let stats = ChapterStats::from_counts(10, 3, 4);
        assert_eq!(stats.new, 3);
        assert_eq!(stats.learned + stats.learning + stats.new, stats.total);
        assert!((stats.progress() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_bucket_has_zero_progress() {
        let stats = ChapterStats::from_counts(0, 0, 0);
        assert_eq!(stats, ChapterStats::empty());
        assert!(stats.progress().abs() < f64::EPSILON);
    }

    #[test]
    fn oversized_counts_are_clamped() {
        let stats = ChapterStats::from_counts(5, 4, 4);
        assert_eq!(stats.learned, 4);
        assert_eq!(stats.learning, 1);
        assert_eq!(stats.new, 0);
    }

    #[test]
    fn stats_sum_adds_fieldwise() {
        let total: ChapterStats = [
            ChapterStats::from_counts(5, 1, 1),
            ChapterStats::from_counts(2, 2, 0),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, ChapterStats::from_counts(7, 3, 1));
    }
}
