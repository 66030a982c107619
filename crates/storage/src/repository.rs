use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    Course, CourseId, CourseProgress, Lesson, LessonId, LessonProgress, MarketingTag, SessionId,
    UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A queued marketing tag waiting for the external delivery job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagJob {
    pub id: i64,
    pub subscriber_id: String,
    pub tag: MarketingTag,
    pub enqueued_at: DateTime<Utc>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Read access to courses and lessons, plus upserts used for seeding.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Persist or update a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Persist or update a lesson. Its course must already exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course is unknown, or other
    /// storage errors.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Fetch a course by ID, `Ok(None)` if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Fetch a lesson by ID, `Ok(None)` if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// All lessons of a course regardless of status, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_course_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError>;
}

/// Durable per-(lesson, user) progress rows.
#[async_trait]
pub trait LessonProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_lesson_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Upsert a record and return what is stored afterwards.
    ///
    /// The write is merged atomically into any existing row: write-once
    /// columns are only filled if still empty and playback keeps its maximum,
    /// so a concurrent writer can never regress a field.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn save_lesson_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError>;

    /// Subset of `lesson_ids` the user has completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn completed_lesson_ids(
        &self,
        user_id: UserId,
        lesson_ids: &[LessonId],
    ) -> Result<HashSet<LessonId>, StorageError>;
}

/// Durable per-(course, user) milestones.
#[async_trait]
pub trait CourseProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course_progress(
        &self,
        course_id: CourseId,
        user_id: UserId,
    ) -> Result<Option<CourseProgress>, StorageError>;

    /// Create the row if needed and set `started_at` only if it is still null.
    ///
    /// Returns `true` iff this call performed the write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn mark_course_started(
        &self,
        course_id: CourseId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Create the row if needed and set `completed_at` only if it is still null.
    ///
    /// Returns `true` iff this call performed the write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn mark_course_completed(
        &self,
        course_id: CourseId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;
}

/// Key-value bag scoped to a guest's session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_value(&self, session: &SessionId, key: &str)
    -> Result<Option<String>, StorageError>;

    /// Overwrite the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn put_value(
        &self,
        session: &SessionId,
        key: &str,
        value: String,
    ) -> Result<(), StorageError>;
}

/// Outbox for marketing tags; delivery happens elsewhere.
#[async_trait]
pub trait TagQueue: Send + Sync {
    /// Queue a tag application and return the job ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the job cannot be recorded.
    async fn enqueue_tag(
        &self,
        subscriber_id: &str,
        tag: &MarketingTag,
        at: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// Oldest pending jobs first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn pending_tags(&self, limit: u32) -> Result<Vec<TagJob>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Tables {
    courses: HashMap<CourseId, Course>,
    lessons: HashMap<LessonId, Lesson>,
    lesson_progress: HashMap<(LessonId, UserId), LessonProgress>,
    course_progress: HashMap<(CourseId, UserId), CourseProgress>,
    session_values: HashMap<(SessionId, String), String>,
    tag_jobs: Vec<TagJob>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All tables sit behind one mutex, so every read-modify-write is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Number of durable lesson progress rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn lesson_progress_rows(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.lesson_progress.len())
    }

    /// Number of durable course progress rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn course_progress_rows(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.course_progress.len())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard
            .courses
            .values()
            .any(|c| c.slug() == course.slug() && c.id() != course.id())
        {
            return Err(StorageError::Conflict);
        }
        guard.courses.insert(course.id(), course.clone());
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&lesson.course_id()) {
            return Err(StorageError::NotFound);
        }
        guard.lessons.insert(lesson.id(), lesson.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn list_course_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lock()?;
        let mut lessons: Vec<Lesson> = guard
            .lessons
            .values()
            .filter(|l| l.course_id() == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(Lesson::id);
        Ok(lessons)
    }
}

#[async_trait]
impl LessonProgressRepository for InMemoryRepository {
    async fn get_lesson_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        Ok(self
            .lock()?
            .lesson_progress
            .get(&(lesson_id, user_id))
            .copied())
    }

    async fn save_lesson_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        let mut guard = self.lock()?;
        let stored = guard
            .lesson_progress
            .entry((lesson_id, user_id))
            .or_default();
        *stored = stored.merge(progress);
        Ok(*stored)
    }

    async fn completed_lesson_ids(
        &self,
        user_id: UserId,
        lesson_ids: &[LessonId],
    ) -> Result<HashSet<LessonId>, StorageError> {
        let guard = self.lock()?;
        Ok(lesson_ids
            .iter()
            .copied()
            .filter(|id| {
                guard
                    .lesson_progress
                    .get(&(*id, user_id))
                    .is_some_and(LessonProgress::is_completed)
            })
            .collect())
    }
}

#[async_trait]
impl CourseProgressRepository for InMemoryRepository {
    async fn get_course_progress(
        &self,
        course_id: CourseId,
        user_id: UserId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        Ok(self
            .lock()?
            .course_progress
            .get(&(course_id, user_id))
            .copied())
    }

    async fn mark_course_started(
        &self,
        course_id: CourseId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        Ok(guard
            .course_progress
            .entry((course_id, user_id))
            .or_default()
            .mark_started(at))
    }

    async fn mark_course_completed(
        &self,
        course_id: CourseId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        Ok(guard
            .course_progress
            .entry((course_id, user_id))
            .or_default()
            .mark_completed(at))
    }
}

#[async_trait]
impl SessionStore for InMemoryRepository {
    async fn get_value(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<String>, StorageError> {
        Ok(self
            .lock()?
            .session_values
            .get(&(session.clone(), key.to_owned()))
            .cloned())
    }

    async fn put_value(
        &self,
        session: &SessionId,
        key: &str,
        value: String,
    ) -> Result<(), StorageError> {
        self.lock()?
            .session_values
            .insert((session.clone(), key.to_owned()), value);
        Ok(())
    }
}

#[async_trait]
impl TagQueue for InMemoryRepository {
    async fn enqueue_tag(
        &self,
        subscriber_id: &str,
        tag: &MarketingTag,
        at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        let id = i64::try_from(guard.tag_jobs.len())
            .map_err(|_| StorageError::Serialization("tag job id overflow".into()))?
            + 1;
        guard.tag_jobs.push(TagJob {
            id,
            subscriber_id: subscriber_id.to_owned(),
            tag: tag.clone(),
            enqueued_at: at,
        });
        Ok(id)
    }

    async fn pending_tags(&self, limit: u32) -> Result<Vec<TagJob>, StorageError> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self.lock()?.tag_jobs.iter().take(limit).cloned().collect())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub lesson_progress: Arc<dyn LessonProgressRepository>,
    pub course_progress: Arc<dyn CourseProgressRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub tags: Arc<dyn TagQueue>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(&InMemoryRepository::new())
    }

    /// Build a `Storage` sharing the given in-memory repository, so tests can
    /// keep a handle for inspection.
    #[must_use]
    pub fn from_in_memory(repo: &InMemoryRepository) -> Self {
        Self {
            catalog: Arc::new(repo.clone()),
            lesson_progress: Arc::new(repo.clone()),
            course_progress: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            tags: Arc::new(repo.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use course_core::model::LessonStatus;
    use course_core::time::fixed_now;

    fn build_course(id: u64) -> Course {
        Course::new(CourseId::new(id), format!("course-{id}"), format!("Course {id}")).unwrap()
    }

    fn build_lesson(id: u64, course_id: CourseId) -> Lesson {
        Lesson::new(
            LessonId::new(id),
            course_id,
            format!("Lesson {id}"),
            Some(200),
            LessonStatus::Published,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lessons_require_their_course() {
        let repo = InMemoryRepository::new();
        let orphan = build_lesson(1, CourseId::new(9));
        assert!(matches!(
            repo.upsert_lesson(&orphan).await,
            Err(StorageError::NotFound)
        ));

        let course = build_course(1);
        repo.upsert_course(&course).await.unwrap();
        repo.upsert_lesson(&build_lesson(2, course.id())).await.unwrap();
        repo.upsert_lesson(&build_lesson(1, course.id())).await.unwrap();

        let lessons = repo.list_course_lessons(course.id()).await.unwrap();
        let ids: Vec<_> = lessons.iter().map(Lesson::id).collect();
        assert_eq!(ids, vec![LessonId::new(1), LessonId::new(2)]);
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts() {
        let repo = InMemoryRepository::new();
        repo.upsert_course(&build_course(1)).await.unwrap();
        let clash = Course::new(CourseId::new(2), "course-1", "Other").unwrap();
        assert!(matches!(
            repo.upsert_course(&clash).await,
            Err(StorageError::Conflict)
        ));
    }

    #[tokio::test]
    async fn save_merges_with_stored_row() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let lesson = LessonId::new(1);
        let user = UserId::new(1);

        let first = LessonProgress::from_persisted(Some(now), Some(now), Some(100), None);
        repo.save_lesson_progress(lesson, user, &first).await.unwrap();

        // a stale writer that never saw the first save
        let later = now + Duration::minutes(1);
        let stale = LessonProgress::from_persisted(Some(later), Some(later), Some(40), None);
        let stored = repo.save_lesson_progress(lesson, user, &stale).await.unwrap();

        assert_eq!(stored.viewed_at(), Some(now));
        assert_eq!(stored.started_at(), Some(now));
        assert_eq!(stored.playback_time_seconds(), Some(100));
        assert_eq!(repo.lesson_progress_rows().unwrap(), 1);
    }

    #[tokio::test]
    async fn course_milestones_write_once() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let (course, user) = (CourseId::new(1), UserId::new(1));

        assert!(repo.mark_course_started(course, user, now).await.unwrap());
        assert!(
            !repo
                .mark_course_started(course, user, now + Duration::days(1))
                .await
                .unwrap()
        );
        assert!(repo.mark_course_completed(course, user, now).await.unwrap());
        assert!(!repo.mark_course_completed(course, user, now).await.unwrap());

        let progress = repo.get_course_progress(course, user).await.unwrap().unwrap();
        assert_eq!(progress.started_at(), Some(now));
        assert_eq!(progress.completed_at(), Some(now));
        assert_eq!(repo.course_progress_rows().unwrap(), 1);
    }

    #[tokio::test]
    async fn completed_lesson_ids_filters_incomplete() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let user = UserId::new(3);
        let done = LessonProgress::from_persisted(Some(now), None, None, Some(now));
        let open = LessonProgress::from_persisted(Some(now), None, Some(5), None);
        repo.save_lesson_progress(LessonId::new(1), user, &done).await.unwrap();
        repo.save_lesson_progress(LessonId::new(2), user, &open).await.unwrap();

        let completed = repo
            .completed_lesson_ids(user, &[LessonId::new(1), LessonId::new(2), LessonId::new(3)])
            .await
            .unwrap();
        assert_eq!(completed, HashSet::from([LessonId::new(1)]));
    }

    #[tokio::test]
    async fn tag_jobs_keep_insertion_order() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let a = repo
            .enqueue_tag("sub", &MarketingTag::started_course("x"), now)
            .await
            .unwrap();
        let b = repo
            .enqueue_tag("sub", &MarketingTag::completed_course("x"), now)
            .await
            .unwrap();
        assert!(a < b);
        let pending = repo.pending_tags(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].tag, MarketingTag::started_course("x"));
        assert_eq!(repo.pending_tags(1).await.unwrap().len(), 1);
    }
}
