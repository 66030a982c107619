mod course;
mod ids;
mod lesson;
mod marketing;
mod progress;
mod user;

pub use ids::{CourseId, LessonId, ParseIdError, SessionId, SessionIdError, UserId};

pub use course::{Course, CourseError};
pub use lesson::{Lesson, LessonError, LessonStatus};
pub use marketing::{MarketingTag, MarketingTagError};
pub use progress::{
    CourseProgress, CourseState, LessonProgress, ProgressSignals, set_if_absent,
};
pub use user::{User, Viewer};
