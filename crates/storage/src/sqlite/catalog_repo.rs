use course_core::model::{Course, CourseId, Lesson, LessonId, LessonStatus};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{course_id_from_i64, id_i64, lesson_id_from_i64, read_err, ser, write_err};
use crate::repository::{CatalogRepository, StorageError};

fn course_from_row(row: &SqliteRow) -> Result<Course, StorageError> {
    let id = course_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let slug: String = row.try_get("slug").map_err(ser)?;
    let title: String = row.try_get("title").map_err(ser)?;
    Course::new(id, slug, title).map_err(ser)
}

fn lesson_from_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let id = lesson_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let course_id = course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let duration = row
        .try_get::<Option<i64>, _>("duration_seconds")
        .map_err(ser)?
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| StorageError::Serialization(format!("invalid duration_seconds: {v}")))
        })
        .transpose()?;
    let status = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse::<LessonStatus>()
        .map_err(ser)?;
    Lesson::new(id, course_id, title, duration, status).map_err(ser)
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, slug, title)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                slug = excluded.slug,
                title = excluded.title
            ",
        )
        .bind(id_i64("course_id", course.id().value())?)
        .bind(course.slug())
        .bind(course.title())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lessons (id, course_id, title, duration_seconds, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                title = excluded.title,
                duration_seconds = excluded.duration_seconds,
                status = excluded.status
            ",
        )
        .bind(id_i64("lesson_id", lesson.id().value())?)
        .bind(id_i64("course_id", lesson.course_id().value())?)
        .bind(lesson.title())
        .bind(lesson.duration_seconds().map(i64::from))
        .bind(lesson.status().as_str())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query("SELECT id, slug, title FROM courses WHERE id = ?1")
            .bind(id_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        row.as_ref().map(course_from_row).transpose()
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, course_id, title, duration_seconds, status
            FROM lessons WHERE id = ?1
            ",
        )
        .bind(id_i64("lesson_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(lesson_from_row).transpose()
    }

    async fn list_course_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, duration_seconds, status
            FROM lessons
            WHERE course_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(lesson_from_row(&row)?);
        }
        Ok(lessons)
    }
}
