#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod course_completed;
pub mod course_started;
pub mod error;
pub mod lesson_progress;
pub mod marketing;
pub mod overview;

pub use course_core::Clock;

pub use app_services::ProgressServices;
pub use config::ProgressConfig;
pub use course_completed::CourseCompletedSync;
pub use course_started::CourseStartedSync;
pub use error::{AppServicesError, ConfigError, ProgressError};
pub use lesson_progress::{LessonProgressRecorder, RecordOutcome};
pub use marketing::MarketingTagger;
pub use overview::{CourseOverview, CourseOverviewService, LessonOverview};
