use chrono::Duration;
use storage::repository::{
    ActivityRepository, CardLookup, FlashcardRepository, FlashcardSetRepository,
    ProgressRepository, StorageError,
};
use storage::sqlite::SqliteRepository;
use study_core::model::{
    CardId, Flashcard, FlashcardDraft, FlashcardProgress, FlashcardSet, FlashcardSetDraft,
    LearnerId, ProgressStatus,
};
use study_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed(repo: &SqliteRepository, terms: &[&str]) -> (FlashcardSet, Vec<Flashcard>) {
    let set = repo
        .insert_set(
            &FlashcardSetDraft::new(LearnerId::new(1), "Chemistry")
                .with_description("Elements")
                .validate(fixed_now())
                .unwrap(),
        )
        .await
        .unwrap();

    let mut cards = Vec::new();
    for term in terms {
        let draft = FlashcardDraft::new(set.id, *term, format!("{term} definition"))
            .validate(fixed_now())
            .unwrap();
        cards.push(repo.insert_card(&draft).await.unwrap());
    }
    (set, cards)
}

#[tokio::test]
async fn sqlite_roundtrips_sets_and_ordered_cards() {
    let repo = connect("memdb_sets_cards").await;
    let (set, cards) = seed(&repo, &["H", "He", "Li"]).await;

    let fetched = repo.get_set(set.id).await.unwrap().expect("set");
    assert_eq!(fetched, set);
    assert_eq!(repo.list_sets(LearnerId::new(1)).await.unwrap().len(), 1);
    assert!(repo.list_sets(LearnerId::new(2)).await.unwrap().is_empty());

    let positions: Vec<u32> = cards.iter().map(|c| c.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);

    let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
    repo.reorder_cards(set.id, &[ids[1], ids[2], ids[0]])
        .await
        .unwrap();
    let listed: Vec<String> = repo
        .list_cards(set.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.term)
        .collect();
    assert_eq!(listed, vec!["He", "Li", "H"]);

    let err = repo.reorder_cards(set.id, &ids[..1]).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let handle = repo.resolve_card(ids[0]).await.unwrap();
    assert_eq!(handle.set_id, set.id);
    assert!(!repo.card_exists(CardId::new(9_999)).await.unwrap());
    assert!(matches!(
        repo.resolve_card(CardId::new(9_999)).await.unwrap_err(),
        StorageError::NotFound
    ));
}

#[tokio::test]
async fn sqlite_progress_writes_are_version_checked() {
    let repo = connect("memdb_progress_versions").await;
    let (_, cards) = seed(&repo, &["Na"]).await;
    let learner = LearnerId::new(7);
    let card = cards[0].id;

    assert!(repo.find_progress(learner, card).await.unwrap().is_none());

    let mut fresh = FlashcardProgress::new(learner, card);
    fresh.record_review(ProgressStatus::Learning, fixed_now());
    let first = repo.save_progress(&fresh).await.unwrap();
    assert_eq!(first.version(), 1);

    let err = repo.save_progress(&fresh).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let mut second = repo.find_progress(learner, card).await.unwrap().unwrap();
    assert_eq!(second, first);
    let mastered_at = fixed_now() + Duration::minutes(2);
    second.record_review(ProgressStatus::Mastered, mastered_at);
    let second = repo.save_progress(&second).await.unwrap();
    assert_eq!(second.version(), 2);

    let stored = repo.find_progress(learner, card).await.unwrap().unwrap();
    assert_eq!(stored.review_count(), 2);
    assert_eq!(stored.status(), ProgressStatus::Mastered);
    assert_eq!(stored.mastered_at(), Some(mastered_at));
    assert_eq!(stored.version(), 2);

    let err = repo.save_progress(&first).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_progress_for_unknown_card_is_not_found() {
    let repo = connect("memdb_progress_fk").await;
    let mut orphan = FlashcardProgress::new(LearnerId::new(1), CardId::new(404));
    orphan.record_review(ProgressStatus::Learning, fixed_now());

    let err = repo.save_progress(&orphan).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_delete_set_cascades_to_progress() {
    let repo = connect("memdb_cascade").await;
    let (set, cards) = seed(&repo, &["Fe", "Cu"]).await;
    let learner = LearnerId::new(3);

    for card in &cards {
        let mut p = FlashcardProgress::new(learner, card.id);
        p.record_review(ProgressStatus::Learning, fixed_now());
        repo.save_progress(&p).await.unwrap();
    }
    let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
    assert_eq!(repo.progress_for_cards(learner, &ids).await.unwrap().len(), 2);

    repo.delete_card(ids[0]).await.unwrap();
    assert_eq!(repo.progress_for_cards(learner, &ids).await.unwrap().len(), 1);

    repo.delete_set(set.id).await.unwrap();
    assert!(repo.get_set(set.id).await.unwrap().is_none());
    assert!(repo.progress_for_cards(learner, &ids).await.unwrap().is_empty());
    assert!(matches!(
        repo.delete_set(set.id).await.unwrap_err(),
        StorageError::NotFound
    ));
}

#[tokio::test]
async fn sqlite_activity_is_one_row_per_day() {
    let repo = connect("memdb_activity").await;
    let learner = LearnerId::new(11);
    let t0 = fixed_now();

    repo.record_activity(learner, t0).await.unwrap();
    repo.record_activity(learner, t0 + Duration::minutes(20))
        .await
        .unwrap();
    repo.record_activity(learner, t0 - Duration::minutes(5))
        .await
        .unwrap();
    repo.record_activity(learner, t0 - Duration::days(1))
        .await
        .unwrap();

    let recent = repo.recent_activity(learner, 5).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].active_on, t0.date_naive());
    assert_eq!(recent[0].last_active_at, t0 + Duration::minutes(20));
    assert_eq!(recent[1].active_on, (t0 - Duration::days(1)).date_naive());

    let limited = repo.recent_activity(learner, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn sqlite_progress_lookup_handles_more_ids_than_one_batch() {
    let repo = connect("memdb_progress_many_ids").await;
    let (_, cards) = seed(&repo, &["K", "Ca"]).await;
    let learner = LearnerId::new(8);

    for card in &cards {
        let mut p = FlashcardProgress::new(learner, card.id);
        p.record_review(ProgressStatus::Learning, fixed_now());
        repo.save_progress(&p).await.unwrap();
    }

    // Far more ids than SQLite allows as bound variables in one statement.
    let mut ids: Vec<CardId> = (10_000..45_000).map(CardId::new).collect();
    ids.push(cards[1].id);
    ids.insert(0, cards[0].id);

    let found = repo.progress_for_cards(learner, &ids).await.unwrap();
    let found_ids: Vec<CardId> = found.iter().map(FlashcardProgress::card_id).collect();
    assert_eq!(found_ids, vec![cards[0].id, cards[1].id]);
}
