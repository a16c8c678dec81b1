use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use services::{
    AppServices, Clock, EngineConfig, ProgressServiceError, ProgressStore, RetryPolicy,
};
use sporty_core::model::{LessonId, ProgressKey, QuizResult, SportId, UserId};
use sporty_core::time::{fixed_clock, fixed_now};
use sporty_core::{CurriculumDraft, LockState};
use storage::repository::{InMemoryRepository, ProgressRepository};

const CURRICULUM: &str = r#"{
  "sports": [
    {
      "id": "basketball",
      "name": "Basketball",
      "modules": [
        {
          "id": "basics", "sportId": "basketball", "order": 1, "title": "Basics",
          "lessons": [
            { "id": "L1", "sportId": "basketball", "moduleId": "basics", "order": 1,
              "title": "Court", "xpReward": 60 },
            { "id": "L2", "sportId": "basketball", "moduleId": "basics", "order": 2,
              "title": "Scoring", "xpReward": 50, "prerequisites": ["L1"], "isLocked": true }
          ]
        },
        {
          "id": "positions", "sportId": "basketball", "order": 2, "title": "Positions",
          "lessons": [
            { "id": "L3", "sportId": "basketball", "moduleId": "positions", "order": 1,
              "title": "Guards", "xpReward": 40, "prerequisites": ["L1", "L2"] }
          ]
        }
      ]
    },
    { "id": "tennis", "name": "Tennis" }
  ]
}"#;

fn curriculum() -> CurriculumDraft {
    serde_json::from_str(CURRICULUM).unwrap()
}

fn config() -> EngineConfig {
    EngineConfig {
        retry_backoff: Duration::ZERO,
        ..EngineConfig::default()
    }
}

async fn app(clock: Clock) -> AppServices {
    AppServices::in_memory(curriculum(), config(), clock)
        .await
        .unwrap()
}

fn store_with(repo: &Arc<dyn ProgressRepository>, retry: RetryPolicy) -> Arc<ProgressStore> {
    let store = ProgressStore::new(Arc::clone(repo), fixed_clock());
    Arc::new(store.with_retry(retry))
}

fn user() -> UserId {
    UserId::new("user-1")
}

fn basketball() -> SportId {
    SportId::new("basketball")
}

#[tokio::test]
async fn completing_two_lessons_on_consecutive_days_levels_up_and_extends_streak() {
    // Shared repository so the second day can run with a later clock.
    let storage = storage::repository::Storage::in_memory(curriculum());
    let day_one = AppServices::from_storage(storage.clone(), config(), fixed_clock())
        .await
        .unwrap();
    let day_two = AppServices::from_storage(
        storage,
        config(),
        Clock::fixed(fixed_now() + ChronoDuration::days(1)),
    )
    .await
    .unwrap();

    let first = day_one
        .progress()
        .complete_lesson(&user(), &LessonId::new("L1"))
        .await
        .unwrap();
    assert_eq!(first.total_xp(), 60);
    assert_eq!(first.level(), 1);
    assert_eq!(first.streak(), 1);

    let second = day_two
        .progress()
        .complete_lesson(&user(), &LessonId::new("L2"))
        .await
        .unwrap();
    assert_eq!(second.total_xp(), 110);
    assert_eq!(second.level(), 2);
    assert_eq!(second.streak(), 2);
    assert_eq!(second.xp_progress_in_level(), 10);
    assert_eq!(second.xp_for_next_level(), 200);
    assert_eq!(second.level_title(), "Amateur");
}

#[tokio::test]
async fn lock_state_follows_completed_prerequisites() {
    let app = app(fixed_clock()).await;
    let service = app.progress();
    let l2 = LessonId::new("L2");

    assert_eq!(
        service.lock_state(&user(), &l2).await.unwrap(),
        LockState::Locked
    );
    service
        .complete_lesson(&user(), &LessonId::new("L1"))
        .await
        .unwrap();
    assert_eq!(
        service.lock_state(&user(), &l2).await.unwrap(),
        LockState::Unlocked
    );

    let states = service.lesson_states(&user(), &basketball()).await.unwrap();
    let summary: Vec<_> = states
        .iter()
        .map(|(lesson, state)| (lesson.id.as_str(), *state))
        .collect();
    assert_eq!(
        summary,
        [
            ("L1", LockState::Unlocked),
            ("L2", LockState::Unlocked),
            ("L3", LockState::Locked),
        ]
    );
    let next = service.next_lesson(&user(), &basketball()).await.unwrap();
    assert_eq!(next.map(|lesson| lesson.id.as_str()), Some("L2"));
}

#[tokio::test]
async fn unknown_lessons_are_reported_not_applied() {
    let app = app(fixed_clock()).await;
    let service = app.progress();
    let missing = LessonId::new("nope");

    let err = service.complete_lesson(&user(), &missing).await.unwrap_err();
    assert!(matches!(err, ProgressServiceError::LessonNotFound(id) if id == missing));

    let err = service.lock_state(&user(), &missing).await.unwrap_err();
    assert!(matches!(err, ProgressServiceError::LessonNotFound(_)));

    let quiz = QuizResult::new(missing.clone(), 1, 2, fixed_now(), Duration::ZERO).unwrap();
    let err = service.record_quiz(&user(), quiz).await.unwrap_err();
    assert!(matches!(err, ProgressServiceError::LessonNotFound(_)));
}

#[tokio::test]
async fn quizzes_are_validated_and_averaged() {
    let app = app(fixed_clock()).await;
    let service = app.progress();
    let l1 = LessonId::new("L1");

    let err = service
        .submit_quiz(&user(), &l1, 6, 5, Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressServiceError::Quiz(_)));

    service
        .submit_quiz(&user(), &l1, 7, 10, Duration::from_secs(60))
        .await
        .unwrap();
    let progress = service
        .submit_quiz(&user(), &l1, 0, 0, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(progress.quiz_scores().len(), 2);
    assert!(progress.quiz_scores()[0].is_passing());
    assert_eq!(progress.quiz_scores()[0].completed_at(), fixed_now());
    assert!(!progress.quiz_scores()[1].is_passing());
    assert_eq!(progress.total_xp(), 0);
    assert_eq!(progress.last_activity_at(), None);

    let average = service
        .average_quiz_score(&user(), &basketball())
        .await
        .unwrap();
    assert!((average - 35.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn module_progress_and_current_module_track_completions() {
    let app = app(fixed_clock()).await;
    let service = app.progress();

    for lesson in ["L1", "L2", "L3"] {
        service
            .complete_lesson(&user(), &LessonId::new(lesson))
            .await
            .unwrap();
    }
    let progress = service.progress(&user(), &basketball()).await.unwrap();
    assert_eq!(progress.current_module(), 1);
    assert_eq!(progress.total_xp(), 150);

    let modules = service
        .module_progress(&user(), &basketball())
        .await
        .unwrap();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].completed_lessons, 2);
    assert_eq!(modules[0].total_lessons, 2);
    assert!((modules[0].fraction - 1.0).abs() < f64::EPSILON);
    let next = service.next_lesson(&user(), &basketball()).await.unwrap();
    assert!(next.is_none());

    let empty = service
        .module_progress(&user(), &SportId::new("tennis"))
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn progress_is_kept_per_user_and_sport() {
    let app = app(fixed_clock()).await;
    let service = app.progress();
    let other = UserId::new("user-2");

    service
        .complete_lesson(&user(), &LessonId::new("L1"))
        .await
        .unwrap();

    let theirs = service.progress(&other, &basketball()).await.unwrap();
    assert!(theirs.completed_lessons().is_empty());
    let tennis = service
        .progress(&user(), &SportId::new("tennis"))
        .await
        .unwrap();
    assert_eq!(tennis.total_xp(), 0);
    assert_eq!(tennis.level(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_events_for_one_key_are_all_kept() {
    let repo: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
    let store = Arc::new(ProgressStore::new(Arc::clone(&repo), fixed_clock()));
    let key = ProgressKey::new(user(), basketball());

    let mut tasks = Vec::new();
    for i in 0..32_u32 {
        let store = Arc::clone(&store);
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            store
                .complete_lesson(&key, LessonId::new(format!("lesson-{i}")), 10, None)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let progress = store.get(&key).await.unwrap();
    assert_eq!(progress.completed_lessons().len(), 32);
    assert_eq!(progress.total_xp(), 320);
    assert_eq!(progress.level(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stores_sharing_a_repository_resolve_conflicts_by_retrying() {
    // Two stores stand in for two processes: no shared locks, only versions.
    let repo: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
    let retry = RetryPolicy::new(64, Duration::from_micros(50));
    let stores = [store_with(&repo, retry), store_with(&repo, retry)];
    let key = ProgressKey::new(user(), basketball());

    let mut tasks = Vec::new();
    for i in 0..20_u32 {
        let store = Arc::clone(&stores[(i % 2) as usize]);
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            store
                .complete_lesson(&key, LessonId::new(format!("lesson-{i}")), 5, None)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = repo.load_progress(&key).await.unwrap().unwrap();
    assert_eq!(stored.value.completed_lessons().len(), 20);
    assert_eq!(stored.value.total_xp(), 100);
    assert_eq!(stored.version.value(), 20);
}

#[tokio::test]
async fn subscribers_see_each_persisted_change() {
    let app = app(fixed_clock()).await;
    let service = app.progress();
    let mut changes = service.subscribe();

    service
        .complete_lesson(&user(), &LessonId::new("L1"))
        .await
        .unwrap();
    service
        .complete_lesson(&user(), &LessonId::new("L1"))
        .await
        .unwrap();
    service
        .submit_quiz(&user(), &LessonId::new("L1"), 3, 3, Duration::from_secs(1))
        .await
        .unwrap();

    let first = changes.recv().await.unwrap();
    assert_eq!(first.cause.kind(), "lesson_completed");
    assert_eq!(first.progress.total_xp(), 60);
    let second = changes.recv().await.unwrap();
    assert_eq!(second.cause.kind(), "quiz_recorded");
    assert_eq!(second.key, ProgressKey::new(user(), basketball()));
    assert!(changes.try_recv().is_err());

    let json = serde_json::to_value(&second).unwrap();
    assert_eq!(json["cause"]["kind"], "quiz_recorded");
}
