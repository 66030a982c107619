use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Catalog, durable progress rows, the guest session bag and the tag outbox.
const SCHEMA_V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS lessons (
        id INTEGER PRIMARY KEY,
        course_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        duration_seconds INTEGER CHECK (duration_seconds IS NULL OR duration_seconds >= 0),
        status TEXT NOT NULL CHECK (status IN ('draft', 'published', 'previewable')),
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
    )",
    r"
    CREATE TABLE IF NOT EXISTS lesson_progress (
        lesson_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        viewed_at TEXT,
        started_at TEXT,
        playback_time_seconds INTEGER CHECK (playback_time_seconds >= 0),
        completed_at TEXT,
        PRIMARY KEY (lesson_id, user_id),
        FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
    )",
    r"
    CREATE TABLE IF NOT EXISTS course_progress (
        course_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        started_at TEXT,
        completed_at TEXT,
        PRIMARY KEY (course_id, user_id),
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
    )",
    r"
    CREATE TABLE IF NOT EXISTS session_values (
        session_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (session_id, key)
    )",
    r"
    CREATE TABLE IF NOT EXISTS tag_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subscriber_id TEXT NOT NULL,
        tag TEXT NOT NULL,
        enqueued_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_lessons_course ON lessons(course_id, id)",
    "CREATE INDEX IF NOT EXISTS idx_lesson_progress_user_completed \
     ON lesson_progress(user_id, completed_at)",
];

/// Ordered schema versions. Each one is applied in its own transaction.
const MIGRATIONS: &[(i64, &[&str])] = &[(1, SCHEMA_V1)];

/// Bring the database up to the latest schema version.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    for &(version, statements) in MIGRATIONS {
        let applied = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?
            .is_some();
        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2) \
             ON CONFLICT(version) DO NOTHING",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(version, "applied sqlite migration");
    }

    Ok(())
}
