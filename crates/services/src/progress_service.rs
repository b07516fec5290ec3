use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use deck_core::model::{CardId, ChapterKey, ChapterStats, DeckId, ProgressStatus, UserId};
use storage::repository::{CardRepository, ProgressRepository};

use crate::error::ProgressError;

/// Per-bucket statistics keyed by chapter, with `ChapterKey::Unassigned`
/// standing for cards outside every chapter.
pub type ChapterProgressMap = HashMap<ChapterKey, ChapterStats>;

/// Read-only aggregation of a user's learning status per chapter.
///
/// Every aggregation costs one placement fetch plus exactly two status
/// lookups (learned, learning), no matter how many chapters are involved.
/// The plain methods never fail: progress is advisory, so storage errors are
/// logged and turned into zero statistics. Use the `try_` form to see them.
#[derive(Clone)]
pub struct ProgressService {
    cards: Arc<dyn CardRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(cards: Arc<dyn CardRepository>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { cards, progress }
    }

    /// Statistics for each requested key, plus any other key that holds cards
    /// of the deck. Falls back to zeroed stats for the requested keys when
    /// storage fails.
    pub async fn chapters_progress(
        &self,
        keys: &[ChapterKey],
        deck_id: DeckId,
        user: UserId,
    ) -> ChapterProgressMap {
        match self.try_chapters_progress(keys, deck_id, user).await {
            Ok(map) => map,
            Err(err) => {
                log::warn!("chapter progress unavailable deck_id={deck_id} user_id={user}: {err}");
                zeroed(keys)
            }
        }
    }

    /// Same as [`ProgressService::chapters_progress`] but surfaces storage
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if any repository call fails.
    pub async fn try_chapters_progress(
        &self,
        keys: &[ChapterKey],
        deck_id: DeckId,
        user: UserId,
    ) -> Result<ChapterProgressMap, ProgressError> {
        let placements = self.cards.card_placements(deck_id).await?;

        let mut buckets: HashMap<ChapterKey, Vec<CardId>> =
            keys.iter().map(|key| (*key, Vec::new())).collect();
        for placement in &placements {
            buckets
                .entry(placement.key())
                .or_default()
                .push(placement.card_id);
        }

        let all_ids: Vec<CardId> = placements.iter().map(|p| p.card_id).collect();
        let (learned, learning) = self.status_sets(user, &all_ids).await?;

        let map: ChapterProgressMap = buckets
            .into_iter()
            .map(|(key, ids)| (key, tally(&ids, &learned, &learning)))
            .collect();

        log::debug!(
            "chapter progress computed deck_id={deck_id} buckets={} cards={}",
            map.len(),
            all_ids.len()
        );
        Ok(map)
    }

    /// Statistics for a single bucket. Zero on storage failure.
    pub async fn chapter_progress(
        &self,
        key: ChapterKey,
        deck_id: DeckId,
        user: UserId,
    ) -> ChapterStats {
        match self.try_chapter_progress(key, deck_id, user).await {
            Ok(stats) => stats,
            Err(err) => {
                log::warn!(
                    "chapter progress unavailable deck_id={deck_id} chapter={key} user_id={user}: {err}"
                );
                ChapterStats::empty()
            }
        }
    }

    async fn try_chapter_progress(
        &self,
        key: ChapterKey,
        deck_id: DeckId,
        user: UserId,
    ) -> Result<ChapterStats, ProgressError> {
        let ids: Vec<CardId> = self
            .cards
            .card_placements(deck_id)
            .await?
            .into_iter()
            .filter(|p| p.key() == key)
            .map(|p| p.card_id)
            .collect();

        let (learned, learning) = self.status_sets(user, &ids).await?;
        Ok(tally(&ids, &learned, &learning))
    }

    /// Totals across every card of the deck. Zero on storage failure.
    pub async fn deck_progress(&self, deck_id: DeckId, user: UserId) -> ChapterStats {
        let result = async {
            let ids: Vec<CardId> = self
                .cards
                .card_placements(deck_id)
                .await?
                .into_iter()
                .map(|p| p.card_id)
                .collect();
            let (learned, learning) = self.status_sets(user, &ids).await?;
            Ok::<_, ProgressError>(tally(&ids, &learned, &learning))
        }
        .await;

        result.unwrap_or_else(|err| {
            log::warn!("deck progress unavailable deck_id={deck_id} user_id={user}: {err}");
            ChapterStats::empty()
        })
    }

    async fn status_sets(
        &self,
        user: UserId,
        card_ids: &[CardId],
    ) -> Result<(HashSet<CardId>, HashSet<CardId>), ProgressError> {
        if card_ids.is_empty() {
            return Ok((HashSet::new(), HashSet::new()));
        }
        let learned = self
            .progress
            .card_ids_with_status(user, ProgressStatus::Learned, card_ids)
            .await?;
        let learning = self
            .progress
            .card_ids_with_status(user, ProgressStatus::Learning, card_ids)
            .await?;
        Ok((learned, learning))
    }
}

fn tally(ids: &[CardId], learned: &HashSet<CardId>, learning: &HashSet<CardId>) -> ChapterStats {
    let total = u32::try_from(ids.len()).unwrap_or(u32::MAX);
    let count = |set: &HashSet<CardId>| {
        u32::try_from(ids.iter().filter(|id| set.contains(id)).count()).unwrap_or(u32::MAX)
    };
    ChapterStats::from_counts(total, count(learned), count(learning))
}

fn zeroed(keys: &[ChapterKey]) -> ChapterProgressMap {
    keys.iter().map(|key| (*key, ChapterStats::empty())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use deck_core::model::{ChapterId, UserId};
    use deck_core::time::fixed_now;
    use storage::repository::{
        ChapterRepository, DeckRepository, InMemoryRepository, NewCardRecord, NewChapterRecord,
        NewDeckRecord, StorageError,
    };

    struct Seeded {
        repo: InMemoryRepository,
        deck_id: DeckId,
        user: UserId,
    }

    async fn deck(repo: &InMemoryRepository) -> DeckId {
        repo.insert_new_deck(NewDeckRecord {
            owner_id: UserId::random(),
            name: "Biology".into(),
            is_shared: false,
            created_at: fixed_now(),
        })
        .await
        .unwrap()
    }

    async fn chapter(repo: &InMemoryRepository, deck_id: DeckId, ordinal: u32) -> ChapterId {
        repo.insert_chapter(NewChapterRecord {
            deck_id,
            ordinal,
            created_at: fixed_now(),
        })
        .await
        .unwrap()
        .id()
    }

    async fn card(repo: &InMemoryRepository, deck_id: DeckId, chapter: Option<ChapterId>) -> CardId {
        repo.insert_new_card(NewCardRecord {
            deck_id,
            chapter_id: chapter,
            prompt: "Q".into(),
            answer: "A".into(),
            created_at: fixed_now(),
        })
        .await
        .unwrap()
    }

    fn service(repo: &InMemoryRepository) -> ProgressService {
        ProgressService::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    // Chapter with 5 cards (2 learned, 1 learning) plus one empty chapter.
    async fn seeded() -> (Seeded, ChapterId, ChapterId) {
        let repo = InMemoryRepository::new();
        let deck_id = deck(&repo).await;
        let full = chapter(&repo, deck_id, 1).await;
        let empty = chapter(&repo, deck_id, 2).await;
        let user = UserId::random();

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(card(&repo, deck_id, Some(full)).await);
        }
        for (id, status) in [
            (ids[0], ProgressStatus::Learned),
            (ids[1], ProgressStatus::Learned),
            (ids[2], ProgressStatus::Learning),
        ] {
            repo.set_status(user, id, status, fixed_now()).await.unwrap();
        }

        (Seeded { repo, deck_id, user }, full, empty)
    }

    #[tokio::test]
    async fn stats_split_learned_learning_and_new() {
        let (s, full, empty) = seeded().await;
        let map = service(&s.repo)
            .chapters_progress(&[full.into(), empty.into()], s.deck_id, s.user)
            .await;

        let stats = map[&ChapterKey::Chapter(full)];
        assert_eq!(
            stats,
            ChapterStats {
                total: 5,
                learned: 2,
                learning: 1,
                new: 2,
            }
        );
        assert!((stats.progress() - 0.4).abs() < f64::EPSILON);

        let zero = map[&ChapterKey::Chapter(empty)];
        assert_eq!(zero, ChapterStats::empty());
        assert!(zero.progress().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn totals_cover_every_card_of_the_deck() {
        let (s, full, _) = seeded().await;
        card(&s.repo, s.deck_id, None).await;
        card(&s.repo, s.deck_id, None).await;

        // only ask for one chapter: unassigned cards still show up
        let map = service(&s.repo)
            .chapters_progress(&[full.into()], s.deck_id, s.user)
            .await;

        assert_eq!(map[&ChapterKey::Unassigned].total, 2);
        let sum: ChapterStats = map.values().copied().sum();
        assert_eq!(sum.total, 7);
        for stats in map.values() {
            assert_eq!(stats.learned + stats.learning + stats.new, stats.total);
        }
    }

    #[tokio::test]
    async fn status_of_other_users_is_ignored() {
        let (s, full, _) = seeded().await;
        let stranger = UserId::random();

        let stats = service(&s.repo)
            .chapter_progress(full.into(), s.deck_id, stranger)
            .await;
        assert_eq!(stats.total, 5);
        assert_eq!(stats.new, 5);
    }

    #[tokio::test]
    async fn deck_progress_sums_all_buckets() {
        let (s, _, _) = seeded().await;
        card(&s.repo, s.deck_id, None).await;

        let stats = service(&s.repo).deck_progress(s.deck_id, s.user).await;
        assert_eq!(stats.total, 6);
        assert_eq!(stats.learned, 2);
        assert_eq!(stats.learning, 1);
        assert_eq!(stats.new, 3);
    }

    struct CountingProgress {
        inner: InMemoryRepository,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProgressRepository for CountingProgress {
        async fn card_ids_with_status(
            &self,
            user: UserId,
            status: ProgressStatus,
            card_ids: &[CardId],
        ) -> Result<HashSet<CardId>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.card_ids_with_status(user, status, card_ids).await
        }

        async fn set_status(
            &self,
            user: UserId,
            card_id: CardId,
            status: ProgressStatus,
            at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            self.inner.set_status(user, card_id, status, at).await
        }
    }

    #[tokio::test]
    async fn status_lookups_do_not_scale_with_chapter_count() {
        let repo = InMemoryRepository::new();
        let deck_id = deck(&repo).await;
        let mut keys = Vec::new();
        for ordinal in 1..=12 {
            let id = chapter(&repo, deck_id, ordinal).await;
            card(&repo, deck_id, Some(id)).await;
            keys.push(ChapterKey::Chapter(id));
        }

        let counting = Arc::new(CountingProgress {
            inner: repo.clone(),
            calls: AtomicUsize::new(0),
        });
        let service = ProgressService::new(Arc::new(repo.clone()), counting.clone());
        let map = service
            .try_chapters_progress(&keys, deck_id, UserId::random())
            .await
            .unwrap();

        assert_eq!(map.len(), 12);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    struct FailingProgress;

    #[async_trait]
    impl ProgressRepository for FailingProgress {
        async fn card_ids_with_status(
            &self,
            _user: UserId,
            _status: ProgressStatus,
            _card_ids: &[CardId],
        ) -> Result<HashSet<CardId>, StorageError> {
            Err(StorageError::Connection("network unreachable".into()))
        }

        async fn set_status(
            &self,
            _user: UserId,
            _card_id: CardId,
            _status: ProgressStatus,
            _at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("network unreachable".into()))
        }
    }

    #[tokio::test]
    async fn storage_failure_degrades_to_zero_for_requested_keys() {
        let (s, full, empty) = seeded().await;
        let service = ProgressService::new(Arc::new(s.repo.clone()), Arc::new(FailingProgress));
        let keys = [ChapterKey::Chapter(full), ChapterKey::Chapter(empty), ChapterKey::Unassigned];

        let map = service.chapters_progress(&keys, s.deck_id, s.user).await;
        assert_eq!(map.len(), 3);
        assert!(map.values().all(ChapterStats::is_empty));

        let err = service
            .try_chapters_progress(&keys, s.deck_id, s.user)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::Storage(StorageError::Connection(_))));

        assert!(
            service
                .chapter_progress(full.into(), s.deck_id, s.user)
                .await
                .is_empty()
        );
        assert!(service.deck_progress(s.deck_id, s.user).await.is_empty());
    }

    #[tokio::test]
    async fn empty_deck_skips_status_lookups() {
        let repo = InMemoryRepository::new();
        let deck_id = deck(&repo).await;
        let service = ProgressService::new(Arc::new(repo.clone()), Arc::new(FailingProgress));

        let map = service
            .try_chapters_progress(&[ChapterKey::Unassigned], deck_id, UserId::random())
            .await
            .unwrap();
        assert_eq!(map[&ChapterKey::Unassigned], ChapterStats::empty());
    }
}
