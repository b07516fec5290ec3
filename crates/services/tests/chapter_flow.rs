use deck_core::model::{ChapterId, ChapterKey, ChapterStats, DeckId, DeckPermit, UserId};
use deck_core::time::fixed_now;
use services::{AppServices, ChapterServiceError, Clock};

async fn app(name: &str) -> AppServices {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    AppServices::new_sqlite(&url, Clock::fixed(fixed_now()))
        .await
        .expect("connect sqlite")
}

async fn owned_deck(app: &AppServices) -> (UserId, DeckId, DeckPermit) {
    let owner = UserId::random();
    let deck_id = app
        .decks()
        .create_deck(owner, "Geography")
        .await
        .expect("create deck");
    let permit = app.decks().permit(deck_id, owner).await.expect("permit");
    (owner, deck_id, permit)
}

async fn add_cards(app: &AppServices, deck_id: DeckId, chapter: Option<ChapterId>, n: usize) {
    for i in 0..n {
        app.cards()
            .create_card(deck_id, chapter, format!("Capital #{i}?"), "Somewhere")
            .await
            .expect("create card");
    }
}

#[tokio::test]
async fn distribution_then_progress_accounts_for_every_card() {
    let app = app("memdb_flow_distribute").await;
    let (owner, deck_id, permit) = owned_deck(&app).await;

    let mut chapters = Vec::new();
    for _ in 0..3 {
        let chapter = app
            .chapters()
            .create_next_chapter(&permit, deck_id)
            .await
            .expect("create chapter");
        chapters.push(chapter.id());
    }
    add_cards(&app, deck_id, Some(chapters[0]), 1).await;
    add_cards(&app, deck_id, None, 7).await;

    let keys: Vec<ChapterKey> = chapters.iter().copied().map(ChapterKey::from).collect();
    let before = app.progress().chapters_progress(&keys, deck_id, owner).await;
    let before_total: u32 = keys.iter().map(|k| before[k].total).sum();

    let assigned = app
        .distribution()
        .distribute_unassigned_evenly(&permit, deck_id, &chapters)
        .await
        .expect("distribute");
    assert_eq!(assigned, 7);

    let after = app.progress().chapters_progress(&keys, deck_id, owner).await;
    let after_total: u32 = keys.iter().map(|k| after[k].total).sum();
    assert_eq!(after_total - before_total, 7);

    let mut gained: Vec<u32> = keys
        .iter()
        .map(|k| after[k].total - before[k].total)
        .collect();
    gained.sort_unstable();
    assert_eq!(gained, vec![2, 2, 3]);

    assert_eq!(after.get(&ChapterKey::Unassigned).map_or(0, |s| s.total), 0);
}

#[tokio::test]
async fn deleting_middle_chapter_then_reordering() {
    let app = app("memdb_flow_delete_reorder").await;
    let (owner, deck_id, permit) = owned_deck(&app).await;

    let first = app.chapters().create_chapter(&permit, deck_id, 1).await.unwrap();
    let middle = app.chapters().create_chapter(&permit, deck_id, 2).await.unwrap();
    let last = app.chapters().create_chapter(&permit, deck_id, 3).await.unwrap();
    add_cards(&app, deck_id, Some(middle.id()), 4).await;

    let unassigned = app
        .chapters()
        .delete_chapter(&permit, middle.id())
        .await
        .expect("delete chapter");
    assert_eq!(unassigned, 4);

    let stats = app
        .progress()
        .chapter_progress(ChapterKey::Unassigned, deck_id, owner)
        .await;
    assert_eq!(stats.total, 4);

    let reordered = app
        .chapters()
        .reorder_ordinals(&permit, deck_id)
        .await
        .expect("reorder");
    let layout: Vec<(ChapterId, u32)> = reordered.iter().map(|c| (c.id(), c.ordinal())).collect();
    assert_eq!(layout, vec![(first.id(), 1), (last.id(), 2)]);

    let listed = app.chapters().list_chapters(deck_id).await.unwrap();
    assert_eq!(listed, reordered);
    assert_eq!(app.chapters().next_ordinal(deck_id).await.unwrap(), 3);
}

#[tokio::test]
async fn user_without_progress_sees_everything_new() {
    let app = app("memdb_flow_no_progress").await;
    let (_, deck_id, permit) = owned_deck(&app).await;
    let chapter = app
        .chapters()
        .create_next_chapter(&permit, deck_id)
        .await
        .unwrap();
    add_cards(&app, deck_id, Some(chapter.id()), 5).await;

    let map = app
        .progress()
        .chapters_progress(&[chapter.id().into()], deck_id, UserId::random())
        .await;
    let stats = map[&ChapterKey::Chapter(chapter.id())];
    assert_eq!(
        stats,
        ChapterStats {
            total: 5,
            learned: 0,
            learning: 0,
            new: 5,
        }
    );
    assert!(stats.progress().abs() < f64::EPSILON);
}

#[tokio::test]
async fn chapter_cap_holds_at_thirty() {
    let app = app("memdb_flow_cap").await;
    let (_, deck_id, permit) = owned_deck(&app).await;

    for _ in 0..30 {
        app.chapters()
            .create_next_chapter(&permit, deck_id)
            .await
            .expect("create chapter");
    }

    let err = app
        .chapters()
        .create_chapter(&permit, deck_id, 31)
        .await
        .unwrap_err();
    assert!(matches!(err, ChapterServiceError::LimitExceeded { limit: 30 }));
    assert_eq!(app.chapters().list_chapters(deck_id).await.unwrap().len(), 30);
}

#[tokio::test]
async fn shared_deck_refuses_new_permits() {
    let app = app("memdb_flow_shared").await;
    let (owner, deck_id, _) = owned_deck(&app).await;

    app.decks().set_shared(deck_id, owner, true).await.unwrap();
    assert!(app.decks().permit(deck_id, owner).await.is_err());

    app.decks().set_shared(deck_id, owner, false).await.unwrap();
    assert!(app.decks().permit(deck_id, owner).await.is_ok());
}
