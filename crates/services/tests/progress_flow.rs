use chrono::Duration;
use services::{AppServices, Clock, ProgressTrackerError};
use storage::repository::Storage;
use study_core::model::{
    CardId, FlashcardDraft, FlashcardSetDraft, LearnerId, ProgressLookup, ProgressStatus,
};
use study_core::time::fixed_now;

async fn services_with_card(services: &AppServices) -> CardId {
    let flashcards = services.flashcards();
    let set = flashcards
        .create_set(FlashcardSetDraft::new(LearnerId::new(100), "Greek letters"))
        .await
        .expect("create set");
    flashcards
        .add_card(FlashcardDraft::new(set.id, "alpha", "first letter"))
        .await
        .expect("add card")
        .id
}

#[tokio::test]
async fn mastered_at_is_stamped_once_across_status_changes() {
    let mut clock = Clock::manual(fixed_now());
    let services = AppServices::in_memory(clock.clone());
    let card = services_with_card(&services).await;
    let tracker = services.progress();
    let learner = LearnerId::new(1);

    let first = tracker
        .update_progress(learner, card, ProgressStatus::Learning)
        .await
        .expect("first update");
    assert_eq!(first.review_count, 1);
    assert_eq!(first.status, ProgressStatus::Learning);
    assert_eq!(first.mastered_at, None);

    clock.advance(Duration::minutes(5));
    let t2 = fixed_now() + Duration::minutes(5);
    let second = tracker
        .update_progress(learner, card, ProgressStatus::Mastered)
        .await
        .expect("second update");
    assert_eq!(second.review_count, 2);
    assert_eq!(second.status, ProgressStatus::Mastered);
    assert_eq!(second.mastered_at, Some(t2));

    clock.advance(Duration::minutes(5));
    let t3 = t2 + Duration::minutes(5);
    let third = tracker
        .update_progress(learner, card, ProgressStatus::Learning)
        .await
        .expect("third update");
    assert_eq!(third.review_count, 3);
    assert_eq!(third.status, ProgressStatus::Learning);
    assert_eq!(third.mastered_at, Some(t2));
    assert_eq!(third.last_reviewed_at, Some(t3));

    clock.advance(Duration::minutes(5));
    let fourth = tracker
        .update_progress(learner, card, ProgressStatus::Mastered)
        .await
        .expect("fourth update");
    assert_eq!(fourth.mastered_at, Some(t2));

    let lookup = tracker.get_progress(learner, card).await.expect("lookup");
    assert_eq!(lookup, ProgressLookup::Studied(fourth));
}

#[tokio::test]
async fn other_learners_start_with_no_progress() {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()));
    let card = services_with_card(&services).await;
    let tracker = services.progress();

    tracker
        .update_progress(LearnerId::new(1), card, ProgressStatus::Mastered)
        .await
        .expect("update");

    let lookup = tracker
        .get_progress(LearnerId::new(2), card)
        .await
        .expect("lookup");
    assert_eq!(lookup, ProgressLookup::NotStarted);
    assert_eq!(
        serde_json::to_value(&lookup).unwrap(),
        serde_json::json!({ "state": "not_started" })
    );

    let err = tracker
        .update_progress(LearnerId::new(2), CardId::new(999), ProgressStatus::Learning)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressTrackerError::CardNotFound(_)));
}

#[tokio::test]
async fn review_count_matches_number_of_sequential_updates() {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()));
    let card = services_with_card(&services).await;
    let tracker = services.progress();
    let learner = LearnerId::new(3);

    let statuses = [
        ProgressStatus::New,
        ProgressStatus::Mastered,
        ProgressStatus::New,
        ProgressStatus::Learning,
        ProgressStatus::Learning,
    ];
    for status in statuses {
        tracker
            .update_progress(learner, card, status)
            .await
            .expect("update");
    }

    let view = tracker
        .get_progress(learner, card)
        .await
        .expect("lookup")
        .into_view()
        .expect("studied");
    assert_eq!(view.review_count, 5);
    assert_eq!(view.status, ProgressStatus::Learning);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_on_one_pair_lose_nothing() {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()));
    let card = services_with_card(&services).await;
    let learner = LearnerId::new(4);

    let mut handles = Vec::new();
    for i in 0..8_u32 {
        let tracker = services.progress();
        let status = if i % 2 == 0 {
            ProgressStatus::Learning
        } else {
            ProgressStatus::Mastered
        };
        handles.push(tokio::spawn(async move {
            tracker.update_progress(learner, card, status).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("update");
    }

    let view = services
        .progress()
        .get_progress(learner, card)
        .await
        .expect("lookup")
        .into_view()
        .expect("studied");
    assert_eq!(view.review_count, 8);
    assert!(view.mastered_at.is_some());
}

#[tokio::test]
async fn updates_feed_the_learner_streak() {
    let mut clock = Clock::manual(fixed_now() - Duration::days(2));
    let services = AppServices::in_memory(clock.clone());
    let card = services_with_card(&services).await;
    let learner = LearnerId::new(5);

    for _ in 0..3 {
        services
            .progress()
            .update_progress(learner, card, ProgressStatus::Learning)
            .await
            .expect("update");
        clock.advance(Duration::days(1));
    }

    let streak = services
        .activity()
        .current_streak(learner)
        .await
        .expect("streak");
    assert_eq!(streak, 3);
}

#[tokio::test]
async fn sqlite_backend_runs_the_same_flow() {
    let storage = Storage::sqlite("sqlite:file:memdb_progress_flow?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let services = AppServices::from_storage(&storage, Clock::fixed(fixed_now()), 4);
    let card = services_with_card(&services).await;
    let tracker = services.progress();
    let learner = LearnerId::new(6);

    assert_eq!(
        tracker.get_progress(learner, card).await.expect("lookup"),
        ProgressLookup::NotStarted
    );
    tracker
        .update_progress(learner, card, ProgressStatus::Mastered)
        .await
        .expect("first");
    let view = tracker
        .update_progress(learner, card, ProgressStatus::Learning)
        .await
        .expect("second");
    assert_eq!(view.review_count, 2);
    assert_eq!(view.mastered_at, Some(fixed_now()));

    let overview = services
        .overview()
        .overview(learner, services_set(&services).await)
        .await
        .expect("overview");
    assert_eq!(overview.summary.learning, 1);
    assert_eq!(overview.summary.total, 1);

    services
        .flashcards()
        .delete_card(card)
        .await
        .expect("delete card");
    let err = tracker.get_progress(learner, card).await.unwrap_err();
    assert!(matches!(err, ProgressTrackerError::CardNotFound(_)));
}

async fn services_set(services: &AppServices) -> study_core::model::SetId {
    services
        .flashcards()
        .list_sets(LearnerId::new(100))
        .await
        .expect("list sets")[0]
        .id
}

fn file_backed_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("study.sqlite3").display())
}

#[tokio::test]
async fn sqlite_record_survives_a_clock_stepping_backward() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut clock = Clock::manual(fixed_now());
    let services = AppServices::new_sqlite(&file_backed_url(&dir), clock.clone(), 4)
        .await
        .expect("open sqlite");
    let card = services_with_card(&services).await;
    let tracker = services.progress();
    let learner = LearnerId::new(7);

    tracker
        .update_progress(learner, card, ProgressStatus::Mastered)
        .await
        .expect("mastered");

    clock.advance(Duration::seconds(-1));
    let view = tracker
        .update_progress(learner, card, ProgressStatus::Learning)
        .await
        .expect("update with earlier clock");
    assert_eq!(view.last_reviewed_at, Some(fixed_now()));
    assert_eq!(view.mastered_at, Some(fixed_now()));

    let stored = tracker
        .get_progress(learner, card)
        .await
        .expect("stored row still reads back")
        .into_view()
        .expect("studied");
    assert_eq!(stored, view);

    clock.advance(Duration::seconds(10));
    let later = tracker
        .update_progress(learner, card, ProgressStatus::Mastered)
        .await
        .expect("later update");
    assert_eq!(later.review_count, 3);
    assert_eq!(later.last_reviewed_at, Some(fixed_now() + Duration::seconds(9)));
    assert_eq!(later.mastered_at, Some(fixed_now()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_concurrent_updates_on_one_pair_lose_nothing() {
    const WRITERS: u32 = 12;

    let dir = tempfile::tempdir().expect("tempdir");
    let services = AppServices::new_sqlite(
        &file_backed_url(&dir),
        Clock::fixed(fixed_now()),
        WRITERS,
    )
    .await
    .expect("open sqlite");
    let card = services_with_card(&services).await;
    let learner = LearnerId::new(8);

    let mut handles = Vec::new();
    for i in 0..WRITERS {
        let tracker = services.progress();
        let status = if i % 3 == 0 {
            ProgressStatus::Mastered
        } else {
            ProgressStatus::Learning
        };
        handles.push(tokio::spawn(async move {
            tracker.update_progress(learner, card, status).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("update");
    }

    let view = services
        .progress()
        .get_progress(learner, card)
        .await
        .expect("lookup")
        .into_view()
        .expect("studied");
    assert_eq!(view.review_count, WRITERS);
    assert_eq!(view.mastered_at, Some(fixed_now()));
}
