use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("unknown lesson status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Publication state of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonStatus {
    Draft,
    Published,
    /// Not published, but viewable as a free preview.
    Previewable,
}

impl LessonStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonStatus::Draft => "draft",
            LessonStatus::Published => "published",
            LessonStatus::Previewable => "previewable",
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonStatus {
    type Err = LessonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(LessonStatus::Draft),
            "published" => Ok(LessonStatus::Published),
            "previewable" => Ok(LessonStatus::Previewable),
            other => Err(LessonError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single lesson of a course, as seen by the progress engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    title: String,
    duration_seconds: Option<u32>,
    status: LessonStatus,
}

impl Lesson {
    /// Build a validated lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` for a blank title.
    ///
    /// A zero duration is stored as unknown, so such lessons never
    /// auto-complete.
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        title: impl Into<String>,
        duration_seconds: Option<u32>,
        status: LessonStatus,
    ) -> Result<Self, LessonError> {
        let title = title.into();
        let title = title.trim();
        if title.is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        Ok(Self {
            id,
            course_id,
            title: title.to_owned(),
            duration_seconds: duration_seconds.filter(|&d| d > 0),
            status,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn duration_seconds(&self) -> Option<u32> {
        self.duration_seconds
    }

    #[must_use]
    pub fn status(&self) -> LessonStatus {
        self.status
    }

    /// Published and previewable lessons count toward course completion;
    /// drafts never do.
    #[must_use]
    pub fn qualifies_for_course_completion(&self) -> bool {
        matches!(
            self.status,
            LessonStatus::Published | LessonStatus::Previewable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(status: LessonStatus) -> Lesson {
        Lesson::new(LessonId::new(1), CourseId::new(1), "Intro", Some(60), status).unwrap()
    }

    #[test]
    fn drafts_do_not_qualify() {
        assert!(lesson(LessonStatus::Published).qualifies_for_course_completion());
        assert!(lesson(LessonStatus::Previewable).qualifies_for_course_completion());
        assert!(!lesson(LessonStatus::Draft).qualifies_for_course_completion());
    }

    #[test]
    fn rejects_blank_title() {
        let blank = Lesson::new(
            LessonId::new(1),
            CourseId::new(1),
            "  ",
            None,
            LessonStatus::Draft,
        );
        assert_eq!(blank.unwrap_err(), LessonError::EmptyTitle);
    }

    #[test]
    fn zero_duration_reads_as_unknown() {
        let lesson = Lesson::new(
            LessonId::new(1),
            CourseId::new(1),
            "Intro",
            Some(0),
            LessonStatus::Published,
        )
        .unwrap();
        assert_eq!(lesson.duration_seconds(), None);
        assert!(lesson.qualifies_for_course_completion());
    }

    #[test]
    fn status_parses_storage_strings() {
        for status in [
            LessonStatus::Draft,
            LessonStatus::Published,
            LessonStatus::Previewable,
        ] {
            assert_eq!(status.as_str().parse::<LessonStatus>().unwrap(), status);
        }
        assert!("archived".parse::<LessonStatus>().is_err());
    }
}
