use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use course_core::model::{
    Course, CourseId, Lesson, LessonId, LessonProgress, LessonStatus, MarketingTag, SessionId,
    User, UserId, Viewer,
};
use course_core::time::fixed_now;
use storage::repository::{
    CatalogRepository, CourseProgressRepository, LessonProgressRepository, SessionStore,
    StorageError, TagQueue,
};
use storage::sqlite::SqliteRepository;
use storage::store_for;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_course(repo: &SqliteRepository) -> (Course, Vec<Lesson>) {
    let course = Course::new(CourseId::new(1), "intro-to-rust", "Intro to Rust").unwrap();
    repo.upsert_course(&course).await.unwrap();

    let lessons = vec![
        Lesson::new(
            LessonId::new(1),
            course.id(),
            "Ownership",
            Some(200),
            LessonStatus::Published,
        )
        .unwrap(),
        Lesson::new(
            LessonId::new(2),
            course.id(),
            "Borrowing",
            None,
            LessonStatus::Previewable,
        )
        .unwrap(),
        Lesson::new(
            LessonId::new(3),
            course.id(),
            "Lifetimes",
            Some(600),
            LessonStatus::Draft,
        )
        .unwrap(),
    ];
    for lesson in &lessons {
        repo.upsert_lesson(lesson).await.unwrap();
    }
    (course, lessons)
}

#[tokio::test]
async fn sqlite_catalog_roundtrip() {
    let repo = connect("memdb_catalog").await;
    let (course, lessons) = seed_course(&repo).await;

    let fetched = repo.get_course(course.id()).await.unwrap().expect("course");
    assert_eq!(fetched, course);

    let listed = repo.list_course_lessons(course.id()).await.unwrap();
    assert_eq!(listed, lessons);

    let lesson = repo.get_lesson(LessonId::new(2)).await.unwrap().expect("lesson");
    assert_eq!(lesson.status(), LessonStatus::Previewable);
    assert_eq!(lesson.duration_seconds(), None);
    assert!(repo.get_lesson(LessonId::new(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_rejects_orphan_lessons_and_duplicate_slugs() {
    let repo = connect("memdb_constraints").await;
    seed_course(&repo).await;

    let orphan = Lesson::new(
        LessonId::new(10),
        CourseId::new(42),
        "Orphan",
        None,
        LessonStatus::Published,
    )
    .unwrap();
    assert!(matches!(
        repo.upsert_lesson(&orphan).await,
        Err(StorageError::NotFound)
    ));

    let clash = Course::new(CourseId::new(2), "intro-to-rust", "Copy").unwrap();
    assert!(matches!(
        repo.upsert_course(&clash).await,
        Err(StorageError::Conflict)
    ));
}

#[tokio::test]
async fn sqlite_progress_upsert_is_monotonic() {
    let repo = connect("memdb_progress_merge").await;
    seed_course(&repo).await;
    let now = fixed_now();
    let later = now + Duration::minutes(3);
    let (lesson, user) = (LessonId::new(1), UserId::new(7));

    let first = LessonProgress::from_persisted(Some(now), Some(now), Some(100), None);
    let stored = repo.save_lesson_progress(lesson, user, &first).await.unwrap();
    assert_eq!(stored, first);

    let stale = LessonProgress::from_persisted(Some(later), Some(later), Some(50), Some(later));
    let stored = repo.save_lesson_progress(lesson, user, &stale).await.unwrap();
    assert_eq!(stored.viewed_at(), Some(now));
    assert_eq!(stored.started_at(), Some(now));
    assert_eq!(stored.playback_time_seconds(), Some(100));
    assert_eq!(stored.completed_at(), Some(later));

    let fresh = LessonProgress::from_persisted(None, None, Some(150), None);
    let stored = repo.save_lesson_progress(lesson, user, &fresh).await.unwrap();
    assert_eq!(stored.playback_time_seconds(), Some(150));
    assert_eq!(stored.completed_at(), Some(later));

    let reloaded = repo.get_lesson_progress(lesson, user).await.unwrap();
    assert_eq!(reloaded, Some(stored));
}

#[tokio::test]
async fn sqlite_completed_lesson_ids() {
    let repo = connect("memdb_completed_ids").await;
    seed_course(&repo).await;
    let now = fixed_now();
    let user = UserId::new(1);

    let done = LessonProgress::from_persisted(Some(now), None, None, Some(now));
    let open = LessonProgress::from_persisted(Some(now), None, Some(10), None);
    repo.save_lesson_progress(LessonId::new(1), user, &done).await.unwrap();
    repo.save_lesson_progress(LessonId::new(2), user, &open).await.unwrap();
    repo.save_lesson_progress(LessonId::new(3), UserId::new(2), &done)
        .await
        .unwrap();

    let completed = repo
        .completed_lesson_ids(user, &[LessonId::new(1), LessonId::new(2), LessonId::new(3)])
        .await
        .unwrap();
    assert_eq!(completed, HashSet::from([LessonId::new(1)]));
    assert!(repo.completed_lesson_ids(user, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_course_milestones_fire_once() {
    let repo = connect("memdb_course_once").await;
    let (course, _) = seed_course(&repo).await;
    let now = fixed_now();
    let user = UserId::new(5);

    assert!(repo.get_course_progress(course.id(), user).await.unwrap().is_none());

    assert!(repo.mark_course_completed(course.id(), user, now).await.unwrap());
    assert!(
        !repo
            .mark_course_completed(course.id(), user, now + Duration::days(1))
            .await
            .unwrap()
    );

    assert!(repo.mark_course_started(course.id(), user, now).await.unwrap());
    assert!(!repo.mark_course_started(course.id(), user, now).await.unwrap());

    let progress = repo
        .get_course_progress(course.id(), user)
        .await
        .unwrap()
        .expect("row");
    assert_eq!(progress.started_at(), Some(now));
    assert_eq!(progress.completed_at(), Some(now));
}

#[tokio::test]
async fn sqlite_guest_progress_stays_in_session_values() {
    let repo = connect("memdb_guest").await;
    seed_course(&repo).await;
    let session = SessionId::new("guest-abc").unwrap();

    let rows: Arc<dyn LessonProgressRepository> = Arc::new(repo.clone());
    let bag: Arc<dyn SessionStore> = Arc::new(repo.clone());
    let store = store_for(&Viewer::Guest(session.clone()), &rows, &bag);

    let progress = LessonProgress::from_persisted(Some(fixed_now()), None, Some(30), None);
    store.save(LessonId::new(1), &progress).await.unwrap();
    assert_eq!(store.load(LessonId::new(1)).await.unwrap(), Some(progress));

    let durable: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lesson_progress")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(durable, 0);

    // identified viewers do write durable rows
    let user_store = store_for(&Viewer::User(User::new(UserId::new(1), None)), &rows, &bag);
    user_store.save(LessonId::new(1), &progress).await.unwrap();
    let durable: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lesson_progress")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(durable, 1);
}

#[tokio::test]
async fn sqlite_tag_jobs_roundtrip() {
    let repo = connect("memdb_tags").await;
    let now = fixed_now();
    let first = repo
        .enqueue_tag("sub_1", &MarketingTag::started_course("intro-to-rust"), now)
        .await
        .unwrap();
    let second = repo
        .enqueue_tag("sub_1", &MarketingTag::completed_course("intro-to-rust"), now)
        .await
        .unwrap();
    assert!(first < second);

    let jobs = repo.pending_tags(10).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].subscriber_id, "sub_1");
    assert_eq!(jobs[0].tag, MarketingTag::started_course("intro-to-rust"));
    assert_eq!(jobs[1].tag.to_string(), "completedCourse:intro-to-rust");
    assert_eq!(jobs[1].enqueued_at, now);
}

#[tokio::test]
async fn sqlite_zero_duration_rows_still_list() {
    let repo = connect("memdb_zero_duration").await;
    let (course, _) = seed_course(&repo).await;
    sqlx::query(
        "INSERT INTO lessons (id, course_id, title, duration_seconds, status) \
         VALUES (10, ?1, 'Placeholder', 0, 'published')",
    )
    .bind(i64::try_from(course.id().value()).unwrap())
    .execute(repo.pool())
    .await
    .unwrap();

    let listed = repo.list_course_lessons(course.id()).await.unwrap();
    let placeholder = listed
        .iter()
        .find(|l| l.id() == LessonId::new(10))
        .expect("placeholder lesson");
    assert_eq!(placeholder.duration_seconds(), None);
}
