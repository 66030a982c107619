use std::sync::Arc;

use course_core::completion::CompletionTier;
use course_core::model::{Lesson, LessonProgress, ProgressSignals, Viewer};
use storage::progress_store::store_for;
use storage::repository::{LessonProgressRepository, SessionStore};

use crate::Clock;
use crate::course_completed::CourseCompletedSync;
use crate::course_started::CourseStartedSync;
use crate::error::ProgressError;

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// What a single `handle` call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// The lesson record as stored after this call.
    pub progress: LessonProgress,
    /// `completed_at` went from null to set during this call.
    pub lesson_completed: bool,
    /// This call set the course's `started_at`.
    pub course_started: bool,
    /// This call set the course's `completed_at`.
    pub course_completed: bool,
}

//
// ─── RECORDER ──────────────────────────────────────────────────────────────────
//

/// Applies player progress signals to a viewer's lesson record and cascades
/// identified users' milestones to course level.
#[derive(Clone)]
pub struct LessonProgressRecorder {
    clock: Clock,
    rows: Arc<dyn LessonProgressRepository>,
    sessions: Arc<dyn SessionStore>,
    course_started: CourseStartedSync,
    course_completed: CourseCompletedSync,
}

impl LessonProgressRecorder {
    #[must_use]
    pub fn new(
        clock: Clock,
        rows: Arc<dyn LessonProgressRepository>,
        sessions: Arc<dyn SessionStore>,
        course_started: CourseStartedSync,
        course_completed: CourseCompletedSync,
    ) -> Self {
        Self {
            clock,
            rows,
            sessions,
            course_started,
            course_completed,
        }
    }

    /// Record one batch of progress signals for `lesson`.
    ///
    /// - The call itself marks the lesson viewed.
    /// - `started_at` and `completed_at` are only taken if the record has none.
    /// - Playback keeps its high-water mark.
    /// - Once playback reaches the lesson's completion threshold the lesson
    ///   is completed at "now".
    ///
    /// For identified users the course start is synced on every call, and
    /// course completion is checked when this call completed the lesson.
    /// Guests only ever touch their session bag.
    ///
    /// # Errors
    ///
    /// Propagates storage failures and missing courses; nothing is retried.
    pub async fn handle(
        &self,
        lesson: &Lesson,
        viewer: &Viewer,
        signals: ProgressSignals,
    ) -> Result<RecordOutcome, ProgressError> {
        let store = store_for(viewer, &self.rows, &self.sessions);
        let now = self.clock.now();

        let before = store.load(lesson.id()).await?.unwrap_or_default();
        let mut progress = before;
        progress.apply_signals(&signals, now);

        if progress.complete_if_watched(lesson.duration_seconds(), now) {
            tracing::info!(
                lesson_id = %lesson.id(),
                guest = viewer.is_guest(),
                playback = progress.playback_time_seconds(),
                tier = lesson.duration_seconds().map(|d| CompletionTier::for_duration(d).as_str()),
                "lesson auto-completed"
            );
        }

        let stored = store.save(lesson.id(), &progress).await?;
        let lesson_completed = !before.is_completed() && progress.is_completed();

        let mut outcome = RecordOutcome {
            progress: stored,
            lesson_completed,
            course_started: false,
            course_completed: false,
        };

        let Some(user) = viewer.user() else {
            return Ok(outcome);
        };

        outcome.course_started = self
            .course_started
            .handle(lesson, user, signals.started_at)
            .await?;
        if lesson_completed {
            outcome.course_completed = self.course_completed.handle(lesson, user).await?;
        }

        tracing::debug!(
            lesson_id = %lesson.id(),
            user_id = %user.id(),
            lesson_completed,
            course_started = outcome.course_started,
            course_completed = outcome.course_completed,
            "recorded lesson progress"
        );
        Ok(outcome)
    }
}
