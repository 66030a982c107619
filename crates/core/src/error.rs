use thiserror::Error;

use crate::model::{CourseError, LessonError, MarketingTagError, ParseIdError, SessionIdError};

/// Umbrella for every validation error the domain layer can raise.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    MarketingTag(#[from] MarketingTagError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    SessionId(#[from] SessionIdError),
}
