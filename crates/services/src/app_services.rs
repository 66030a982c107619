use std::sync::Arc;

use course_core::model::{CourseId, LessonId, LessonProgress, ProgressSignals, Viewer};
use storage::progress_store::store_for;
use storage::repository::{CatalogRepository, Storage, TagJob};

use crate::Clock;
use crate::config::ProgressConfig;
use crate::course_completed::CourseCompletedSync;
use crate::course_started::CourseStartedSync;
use crate::error::{AppServicesError, ProgressError};
use crate::lesson_progress::{LessonProgressRecorder, RecordOutcome};
use crate::marketing::MarketingTagger;
use crate::overview::{CourseOverview, CourseOverviewService};

/// Assembles the progress engine over one storage backend.
#[derive(Clone)]
pub struct ProgressServices {
    storage: Storage,
    recorder: Arc<LessonProgressRecorder>,
    overview: Arc<CourseOverviewService>,
}

impl ProgressServices {
    /// Wire services over an existing storage aggregate.
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage, config: &ProgressConfig) -> Self {
        let tagger = MarketingTagger::new(clock, Arc::clone(&storage.tags))
            .with_enabled(config.tagging_enabled);
        let course_started = CourseStartedSync::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.course_progress),
            tagger.clone(),
        );
        let course_completed = CourseCompletedSync::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.lesson_progress),
            Arc::clone(&storage.course_progress),
            tagger,
        );
        let recorder = Arc::new(LessonProgressRecorder::new(
            clock,
            Arc::clone(&storage.lesson_progress),
            Arc::clone(&storage.sessions),
            course_started,
            course_completed,
        ));
        let overview = Arc::new(CourseOverviewService::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.lesson_progress),
            Arc::clone(&storage.course_progress),
        ));

        Self {
            storage: storage.clone(),
            recorder,
            overview,
        }
    }

    /// Build services backed by `SQLite` storage at `config.database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or
    /// migrated.
    pub async fn new_sqlite(config: &ProgressConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        Ok(Self::new(clock, &storage, config))
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<dyn CatalogRepository> {
        Arc::clone(&self.storage.catalog)
    }

    /// Look up `lesson_id` and record `signals` against it for `viewer`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::LessonNotFound` for an unknown lesson, plus
    /// whatever the recorder surfaces.
    pub async fn record_lesson_progress(
        &self,
        lesson_id: LessonId,
        viewer: &Viewer,
        signals: ProgressSignals,
    ) -> Result<RecordOutcome, ProgressError> {
        let lesson = self
            .storage
            .catalog
            .get_lesson(lesson_id)
            .await?
            .ok_or(ProgressError::LessonNotFound(lesson_id))?;
        self.recorder.handle(&lesson, viewer, signals).await
    }

    /// Current record of `lesson_id` for `viewer`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn lesson_progress(
        &self,
        lesson_id: LessonId,
        viewer: &Viewer,
    ) -> Result<Option<LessonProgress>, ProgressError> {
        let store = store_for(viewer, &self.storage.lesson_progress, &self.storage.sessions);
        Ok(store.load(lesson_id).await?)
    }

    /// Course overview for an identified viewer. Guests have no course-level
    /// state, so they get `None`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` or storage errors.
    pub async fn course_overview(
        &self,
        course_id: CourseId,
        viewer: &Viewer,
    ) -> Result<Option<CourseOverview>, ProgressError> {
        let Some(user) = viewer.user() else {
            return Ok(None);
        };
        self.overview.overview(course_id, user.id()).await.map(Some)
    }

    /// Tag jobs waiting for delivery, oldest first.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn pending_tags(&self, limit: u32) -> Result<Vec<TagJob>, ProgressError> {
        Ok(self.storage.tags.pending_tags(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{SessionId, User, UserId};
    use course_core::time::fixed_clock;

    #[tokio::test]
    async fn unknown_lesson_is_reported() {
        let services =
            ProgressServices::new(fixed_clock(), &Storage::in_memory(), &ProgressConfig::default());
        let viewer = Viewer::User(User::new(UserId::new(1), None));
        let err = services
            .record_lesson_progress(LessonId::new(404), &viewer, ProgressSignals::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::LessonNotFound(id) if id == LessonId::new(404)));
    }

    #[tokio::test]
    async fn guests_have_no_course_overview() {
        let services =
            ProgressServices::new(fixed_clock(), &Storage::in_memory(), &ProgressConfig::default());
        let guest = Viewer::Guest(SessionId::new("s-1").unwrap());
        assert!(
            services
                .course_overview(CourseId::new(1), &guest)
                .await
                .unwrap()
                .is_none()
        );
    }
}
