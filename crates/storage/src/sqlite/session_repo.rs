use chrono::Utc;
use course_core::model::SessionId;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{read_err, ser, write_err};
use crate::repository::{SessionStore, StorageError};

#[async_trait::async_trait]
impl SessionStore for SqliteRepository {
    async fn get_value(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM session_values WHERE session_id = ?1 AND key = ?2")
            .bind(session.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        row.map(|row| row.try_get::<String, _>("value").map_err(ser))
            .transpose()
    }

    async fn put_value(
        &self,
        session: &SessionId,
        key: &str,
        value: String,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO session_values (session_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(session.as_str())
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }
}
