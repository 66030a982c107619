use chrono::{DateTime, Utc};
use course_core::model::MarketingTag;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{read_err, ser, write_err};
use crate::repository::{StorageError, TagJob, TagQueue};

#[async_trait::async_trait]
impl TagQueue for SqliteRepository {
    async fn enqueue_tag(
        &self,
        subscriber_id: &str,
        tag: &MarketingTag,
        at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO tag_jobs (subscriber_id, tag, enqueued_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(subscriber_id)
        .bind(tag.to_string())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(res.last_insert_rowid())
    }

    async fn pending_tags(&self, limit: u32) -> Result<Vec<TagJob>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, subscriber_id, tag, enqueued_at
            FROM tag_jobs
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            jobs.push(TagJob {
                id: row.try_get("id").map_err(ser)?,
                subscriber_id: row.try_get("subscriber_id").map_err(ser)?,
                tag: row
                    .try_get::<String, _>("tag")
                    .map_err(ser)?
                    .parse::<MarketingTag>()
                    .map_err(ser)?,
                enqueued_at: row.try_get("enqueued_at").map_err(ser)?,
            });
        }
        Ok(jobs)
    }
}
