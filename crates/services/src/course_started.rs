use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::model::{Lesson, MarketingTag, User};
use storage::repository::{CatalogRepository, CourseProgressRepository};

use crate::error::ProgressError;
use crate::marketing::MarketingTagger;

/// Records the first start of any lesson as the start of its course.
#[derive(Clone)]
pub struct CourseStartedSync {
    catalog: Arc<dyn CatalogRepository>,
    courses: Arc<dyn CourseProgressRepository>,
    tagger: MarketingTagger,
}

impl CourseStartedSync {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        courses: Arc<dyn CourseProgressRepository>,
        tagger: MarketingTagger,
    ) -> Self {
        Self {
            catalog,
            courses,
            tagger,
        }
    }

    /// Mark the lesson's course as started at `started_at`, once.
    ///
    /// `None` is the no-op signal. The `startedCourse:<slug>` tag is queued
    /// only by the call whose write actually set `started_at`, so repeated or
    /// concurrent calls never tag twice. Returns `true` on that transition.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` if the lesson's course is
    /// missing, or storage errors from the progress write.
    pub async fn handle(
        &self,
        lesson: &Lesson,
        user: &User,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<bool, ProgressError> {
        let Some(started_at) = started_at else {
            return Ok(false);
        };

        let course = self
            .catalog
            .get_course(lesson.course_id())
            .await?
            .ok_or(ProgressError::CourseNotFound(lesson.course_id()))?;

        let transitioned = self
            .courses
            .mark_course_started(course.id(), user.id(), started_at)
            .await?;
        if !transitioned {
            tracing::debug!(course_id = %course.id(), user_id = %user.id(), "course already started");
            return Ok(false);
        }

        tracing::info!(course_id = %course.id(), user_id = %user.id(), lesson_id = %lesson.id(), "course started");
        self.tagger
            .apply(user, MarketingTag::started_course(course.slug()))
            .await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use course_core::model::{Course, CourseId, LessonId, LessonStatus, UserId};
    use course_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, TagQueue};

    async fn setup() -> (InMemoryRepository, CourseStartedSync, Lesson) {
        let repo = InMemoryRepository::new();
        let course = Course::new(CourseId::new(1), "rust-basics", "Rust Basics").unwrap();
        repo.upsert_course(&course).await.unwrap();
        let lesson = Lesson::new(
            LessonId::new(1),
            course.id(),
            "Hello",
            Some(60),
            LessonStatus::Published,
        )
        .unwrap();
        repo.upsert_lesson(&lesson).await.unwrap();

        let tagger = MarketingTagger::new(fixed_clock(), Arc::new(repo.clone()));
        let sync = CourseStartedSync::new(Arc::new(repo.clone()), Arc::new(repo.clone()), tagger);
        (repo, sync, lesson)
    }

    #[tokio::test]
    async fn none_is_a_no_op() {
        let (repo, sync, lesson) = setup().await;
        let user = User::new(UserId::new(1), Some("sub".into()));
        assert!(!sync.handle(&lesson, &user, None).await.unwrap());
        assert_eq!(repo.course_progress_rows().unwrap(), 0);
    }

    #[tokio::test]
    async fn starts_once_and_tags_once() {
        let (repo, sync, lesson) = setup().await;
        let user = User::new(UserId::new(1), Some("sub".into()));
        let now = fixed_now();

        assert!(sync.handle(&lesson, &user, Some(now)).await.unwrap());
        assert!(
            !sync
                .handle(&lesson, &user, Some(now + Duration::hours(1)))
                .await
                .unwrap()
        );

        let progress = repo
            .get_course_progress(lesson.course_id(), user.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.started_at(), Some(now));

        let tags = repo.pending_tags(10).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag.to_string(), "startedCourse:rust-basics");
    }

    #[tokio::test]
    async fn missing_course_is_an_error() {
        let repo = InMemoryRepository::new();
        let tagger = MarketingTagger::new(fixed_clock(), Arc::new(repo.clone()));
        let sync = CourseStartedSync::new(Arc::new(repo.clone()), Arc::new(repo.clone()), tagger);
        let lesson = Lesson::new(
            LessonId::new(1),
            CourseId::new(9),
            "Orphan",
            None,
            LessonStatus::Published,
        )
        .unwrap();
        let user = User::new(UserId::new(1), None);

        let err = sync.handle(&lesson, &user, Some(fixed_now())).await.unwrap_err();
        assert!(matches!(err, ProgressError::CourseNotFound(id) if id == CourseId::new(9)));
    }
}
