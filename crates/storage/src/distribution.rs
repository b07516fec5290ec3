//! Even distribution of a deck's unassigned cards over a set of chapters.
//!
//! Both backends run this plan inside their single `distribute_unassigned`
//! call, so callers observe one storage operation.

use rand::Rng;
use rand::seq::SliceRandom;

use deck_core::model::{CardId, ChapterId};

/// One card-to-chapter assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub card_id: CardId,
    pub chapter_id: ChapterId,
}

/// Assigns every card in `unassigned` to exactly one chapter in `targets`.
///
/// The pool is shuffled first, so which card lands where does not depend on
/// id or creation order. Cards are then dealt round-robin starting at a random
/// target, so the `len % targets` leftover cards do not always favour the
/// first chapters. Every target receives `floor(U/k)` or `ceil(U/k)` cards.
///
/// Returns an empty plan when `targets` is empty.
pub fn plan_even_distribution<R: Rng>(
    mut unassigned: Vec<CardId>,
    targets: &[ChapterId],
    rng: &mut R,
) -> Vec<Assignment> {
    if targets.is_empty() || unassigned.is_empty() {
        return Vec::new();
    }

    unassigned.shuffle(rng);
    let offset = rng.random_range(0..targets.len());

    unassigned
        .into_iter()
        .enumerate()
        .map(|(i, card_id)| Assignment {
            card_id,
            chapter_id: targets[(i + offset) % targets.len()],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn cards(n: u64) -> Vec<CardId> {
        (1..=n).map(CardId::new).collect()
    }

    fn chapters(n: u64) -> Vec<ChapterId> {
        (100..100 + n).map(ChapterId::new).collect()
    }

    fn per_chapter(plan: &[Assignment]) -> HashMap<ChapterId, usize> {
        let mut counts = HashMap::new();
        for a in plan {
            *counts.entry(a.chapter_id).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn seven_cards_over_three_chapters_split_three_two_two() {
        let mut rng = StdRng::seed_from_u64(7);
        let plan = plan_even_distribution(cards(7), &chapters(3), &mut rng);

        assert_eq!(plan.len(), 7);
        let mut counts: Vec<usize> = per_chapter(&plan).into_values().collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![2, 2, 3]);
    }

    #[test]
    fn every_card_is_assigned_exactly_once() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = plan_even_distribution(cards(50), &chapters(4), &mut rng);
        let seen: HashSet<CardId> = plan.iter().map(|a| a.card_id).collect();
        assert_eq!(seen.len(), 50);
    }

    #[test]
    fn counts_stay_within_one_for_many_shapes() {
        let mut rng = StdRng::seed_from_u64(42);
        for u in 0..40_u64 {
            for k in 1..8_u64 {
                let plan = plan_even_distribution(cards(u), &chapters(k), &mut rng);
                assert_eq!(plan.len() as u64, u);

                let counts = per_chapter(&plan);
                let floor = (u / k) as usize;
                let ceil = u.div_ceil(k) as usize;
                for c in counts.values() {
                    assert!(*c == floor || *c == ceil, "u={u} k={k} count={c}");
                }
            }
        }
    }

    #[test]
    fn remainder_does_not_always_land_on_first_chapter() {
        let targets = chapters(3);
        let mut first_got_extra = 0;
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_even_distribution(cards(1), &targets, &mut rng);
            if plan[0].chapter_id == targets[0] {
                first_got_extra += 1;
            }
        }
        assert!(first_got_extra < 64);
    }

    #[test]
    fn no_targets_yields_empty_plan() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(plan_even_distribution(cards(5), &[], &mut rng).is_empty());
    }
}
