use std::collections::HashSet;

use chrono::{DateTime, Utc};
use course_core::model::{CourseId, CourseProgress, LessonId, LessonProgress, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    course_key, id_i64, lesson_id_from_i64, lesson_key, map_lesson_progress_row, read_err, ser,
    write_err,
};
use crate::repository::{CourseProgressRepository, LessonProgressRepository, StorageError};

#[async_trait::async_trait]
impl LessonProgressRepository for SqliteRepository {
    async fn get_lesson_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let (lesson, user) = lesson_key(lesson_id, user_id)?;
        let row = sqlx::query(
            r"
            SELECT viewed_at, started_at, playback_time_seconds, completed_at
            FROM lesson_progress
            WHERE lesson_id = ?1 AND user_id = ?2
            ",
        )
        .bind(lesson)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_lesson_progress_row).transpose()
    }

    async fn save_lesson_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        let (lesson, user) = lesson_key(lesson_id, user_id)?;

        // Single statement merge: set-if-null for write-once columns and a
        // NULL-aware MAX for playback.
        let row = sqlx::query(
            r"
            INSERT INTO lesson_progress (
                lesson_id, user_id, viewed_at, started_at, playback_time_seconds, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(lesson_id, user_id) DO UPDATE SET
                viewed_at = COALESCE(lesson_progress.viewed_at, excluded.viewed_at),
                started_at = COALESCE(lesson_progress.started_at, excluded.started_at),
                playback_time_seconds = CASE
                    WHEN lesson_progress.playback_time_seconds IS NULL
                        THEN excluded.playback_time_seconds
                    WHEN excluded.playback_time_seconds IS NULL
                        THEN lesson_progress.playback_time_seconds
                    ELSE MAX(lesson_progress.playback_time_seconds, excluded.playback_time_seconds)
                END,
                completed_at = COALESCE(lesson_progress.completed_at, excluded.completed_at)
            RETURNING viewed_at, started_at, playback_time_seconds, completed_at
            ",
        )
        .bind(lesson)
        .bind(user)
        .bind(progress.viewed_at())
        .bind(progress.started_at())
        .bind(progress.playback_time_seconds().map(i64::from))
        .bind(progress.completed_at())
        .fetch_one(&self.pool)
        .await
        .map_err(write_err)?;

        map_lesson_progress_row(&row)
    }

    async fn completed_lesson_ids(
        &self,
        user_id: UserId,
        lesson_ids: &[LessonId],
    ) -> Result<HashSet<LessonId>, StorageError> {
        if lesson_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut sql = String::from(
            r"
                SELECT lesson_id
                FROM lesson_progress
                WHERE user_id = ?1
                  AND completed_at IS NOT NULL
                  AND lesson_id IN (
            ",
        );
        for i in 0..lesson_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push(')');

        let mut query = sqlx::query(&sql).bind(id_i64("user_id", user_id.value())?);
        for lesson_id in lesson_ids {
            query = query.bind(id_i64("lesson_id", lesson_id.value())?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(read_err)?;

        let mut completed = HashSet::with_capacity(rows.len());
        for row in rows {
            completed.insert(lesson_id_from_i64(
                row.try_get::<i64, _>("lesson_id").map_err(ser)?,
            )?);
        }
        Ok(completed)
    }
}

#[async_trait::async_trait]
impl CourseProgressRepository for SqliteRepository {
    async fn get_course_progress(
        &self,
        course_id: CourseId,
        user_id: UserId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let (course, user) = course_key(course_id, user_id)?;
        let row = sqlx::query(
            r"
            SELECT started_at, completed_at
            FROM course_progress
            WHERE course_id = ?1 AND user_id = ?2
            ",
        )
        .bind(course)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        match row {
            Some(row) => Ok(Some(CourseProgress::from_persisted(
                row.try_get("started_at").map_err(ser)?,
                row.try_get("completed_at").map_err(ser)?,
            ))),
            None => Ok(None),
        }
    }

    async fn mark_course_started(
        &self,
        course_id: CourseId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let (course, user) = course_key(course_id, user_id)?;
        let res = sqlx::query(
            r"
            INSERT INTO course_progress (course_id, user_id, started_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(course_id, user_id) DO UPDATE SET
                started_at = excluded.started_at
            WHERE course_progress.started_at IS NULL
            ",
        )
        .bind(course)
        .bind(user)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(res.rows_affected() == 1)
    }

    async fn mark_course_completed(
        &self,
        course_id: CourseId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let (course, user) = course_key(course_id, user_id)?;
        let res = sqlx::query(
            r"
            INSERT INTO course_progress (course_id, user_id, completed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(course_id, user_id) DO UPDATE SET
                completed_at = excluded.completed_at
            WHERE course_progress.completed_at IS NULL
            ",
        )
        .bind(course)
        .bind(user)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(res.rows_affected() == 1)
    }
}
