use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::model::{CourseId, CourseState, LessonId, LessonStatus, UserId};
use serde::Serialize;
use storage::repository::{CatalogRepository, CourseProgressRepository, LessonProgressRepository};

use crate::error::ProgressError;

/// One qualifying lesson in a course overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonOverview {
    pub lesson_id: LessonId,
    pub title: String,
    pub status: LessonStatus,
    pub duration_seconds: Option<u32>,
    pub playback_time_seconds: Option<u32>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A user's position in a course, for progress bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseOverview {
    pub course_id: CourseId,
    pub slug: String,
    pub title: String,
    pub state: CourseState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub qualifying_total: usize,
    pub qualifying_completed: usize,
    pub lessons: Vec<LessonOverview>,
}

/// Read-only course progress queries. Draft lessons are left out.
#[derive(Clone)]
pub struct CourseOverviewService {
    catalog: Arc<dyn CatalogRepository>,
    lessons: Arc<dyn LessonProgressRepository>,
    courses: Arc<dyn CourseProgressRepository>,
}

impl CourseOverviewService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        lessons: Arc<dyn LessonProgressRepository>,
        courses: Arc<dyn CourseProgressRepository>,
    ) -> Self {
        Self {
            catalog,
            lessons,
            courses,
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` if the course is missing, or
    /// storage errors.
    pub async fn overview(
        &self,
        course_id: CourseId,
        user_id: UserId,
    ) -> Result<CourseOverview, ProgressError> {
        let course = self
            .catalog
            .get_course(course_id)
            .await?
            .ok_or(ProgressError::CourseNotFound(course_id))?;
        let progress = self
            .courses
            .get_course_progress(course_id, user_id)
            .await?
            .unwrap_or_default();

        let mut lessons = Vec::new();
        for lesson in self.catalog.list_course_lessons(course_id).await? {
            if !lesson.qualifies_for_course_completion() {
                continue;
            }
            let record = self
                .lessons
                .get_lesson_progress(lesson.id(), user_id)
                .await?
                .unwrap_or_default();
            lessons.push(LessonOverview {
                lesson_id: lesson.id(),
                title: lesson.title().to_owned(),
                status: lesson.status(),
                duration_seconds: lesson.duration_seconds(),
                playback_time_seconds: record.playback_time_seconds(),
                completed_at: record.completed_at(),
            });
        }

        let qualifying_completed = lessons.iter().filter(|l| l.completed_at.is_some()).count();
        Ok(CourseOverview {
            course_id: course.id(),
            slug: course.slug().to_owned(),
            title: course.title().to_owned(),
            state: progress.state(),
            started_at: progress.started_at(),
            completed_at: progress.completed_at(),
            qualifying_total: lessons.len(),
            qualifying_completed,
            lessons,
        })
    }
}
