use course_core::model::{CourseId, LessonId, LessonProgress, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a failed write, keeping constraint violations distinguishable.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn read_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn lesson_key(lesson_id: LessonId, user_id: UserId) -> Result<(i64, i64), StorageError> {
    Ok((
        id_i64("lesson_id", lesson_id.value())?,
        id_i64("user_id", user_id.value())?,
    ))
}

pub(crate) fn course_key(course_id: CourseId, user_id: UserId) -> Result<(i64, i64), StorageError> {
    Ok((
        id_i64("course_id", course_id.value())?,
        id_i64("user_id", user_id.value())?,
    ))
}

pub(crate) fn map_lesson_progress_row(row: &SqliteRow) -> Result<LessonProgress, StorageError> {
    let playback = row
        .try_get::<Option<i64>, _>("playback_time_seconds")
        .map_err(ser)?
        .map(|v| {
            u32::try_from(v).map_err(|_| {
                StorageError::Serialization(format!("invalid playback_time_seconds: {v}"))
            })
        })
        .transpose()?;

    Ok(LessonProgress::from_persisted(
        row.try_get("viewed_at").map_err(ser)?,
        row.try_get("started_at").map_err(ser)?,
        playback,
        row.try_get("completed_at").map_err(ser)?,
    ))
}
