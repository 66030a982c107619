use std::sync::Arc;

use course_core::model::{Lesson, LessonId, MarketingTag, User};
use storage::repository::{CatalogRepository, CourseProgressRepository, LessonProgressRepository};

use crate::Clock;
use crate::error::ProgressError;
use crate::marketing::MarketingTagger;

/// Marks a course completed once every qualifying lesson is completed.
#[derive(Clone)]
pub struct CourseCompletedSync {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    lessons: Arc<dyn LessonProgressRepository>,
    courses: Arc<dyn CourseProgressRepository>,
    tagger: MarketingTagger,
}

impl CourseCompletedSync {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        lessons: Arc<dyn LessonProgressRepository>,
        courses: Arc<dyn CourseProgressRepository>,
        tagger: MarketingTagger,
    ) -> Self {
        Self {
            clock,
            catalog,
            lessons,
            courses,
            tagger,
        }
    }

    /// Complete the lesson's course for `user` if all of its qualifying
    /// (published or previewable) lessons are completed.
    ///
    /// A course without qualifying lessons is never complete. Returns `true`
    /// only for the call that set `completed_at`; that call also queues the
    /// `completedCourse:<slug>` tag.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` if the course is missing, or
    /// storage errors.
    pub async fn handle(&self, lesson: &Lesson, user: &User) -> Result<bool, ProgressError> {
        let course_id = lesson.course_id();

        let already_completed = self
            .courses
            .get_course_progress(course_id, user.id())
            .await?
            .is_some_and(|p| p.completed_at().is_some());
        if already_completed {
            tracing::debug!(course_id = %course_id, user_id = %user.id(), "course already completed");
            return Ok(false);
        }

        let course = self
            .catalog
            .get_course(course_id)
            .await?
            .ok_or(ProgressError::CourseNotFound(course_id))?;

        let qualifying: Vec<LessonId> = self
            .catalog
            .list_course_lessons(course_id)
            .await?
            .iter()
            .filter(|l| l.qualifies_for_course_completion())
            .map(Lesson::id)
            .collect();
        if qualifying.is_empty() {
            tracing::debug!(course_id = %course_id, "course has no qualifying lessons");
            return Ok(false);
        }

        let completed = self
            .lessons
            .completed_lesson_ids(user.id(), &qualifying)
            .await?;
        let remaining = qualifying
            .iter()
            .filter(|id| !completed.contains(*id))
            .count();
        if remaining > 0 {
            tracing::debug!(course_id = %course_id, user_id = %user.id(), remaining, "course not complete yet");
            return Ok(false);
        }

        let transitioned = self
            .courses
            .mark_course_completed(course_id, user.id(), self.clock.now())
            .await?;
        if !transitioned {
            return Ok(false);
        }

        tracing::info!(course_id = %course_id, user_id = %user.id(), "course completed");
        self.tagger
            .apply(user, MarketingTag::completed_course(course.slug()))
            .await;
        Ok(true)
    }
}
