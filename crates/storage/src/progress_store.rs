//! Where a viewer's lesson progress lives.
//!
//! Identified users get durable rows; guests get entries in their session
//! bag. Business logic only ever sees the `ProgressStore` capability.

use std::sync::Arc;

use async_trait::async_trait;
use course_core::model::{LessonId, LessonProgress, SessionId, UserId, Viewer};

use crate::repository::{LessonProgressRepository, SessionStore, StorageError};

/// Read/write primitive for lesson progress records. No business rules.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store fails or holds a
    /// malformed record.
    async fn load(&self, lesson_id: LessonId) -> Result<Option<LessonProgress>, StorageError>;

    /// Persist the record and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn save(
        &self,
        lesson_id: LessonId,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError>;
}

/// Durable progress for an identified user.
pub struct UserProgressStore {
    user_id: UserId,
    rows: Arc<dyn LessonProgressRepository>,
}

impl UserProgressStore {
    #[must_use]
    pub fn new(user_id: UserId, rows: Arc<dyn LessonProgressRepository>) -> Self {
        Self { user_id, rows }
    }
}

#[async_trait]
impl ProgressStore for UserProgressStore {
    async fn load(&self, lesson_id: LessonId) -> Result<Option<LessonProgress>, StorageError> {
        self.rows.get_lesson_progress(lesson_id, self.user_id).await
    }

    async fn save(
        &self,
        lesson_id: LessonId,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        self.rows
            .save_lesson_progress(lesson_id, self.user_id, progress)
            .await
    }
}

/// Session-scoped progress for a guest.
pub struct GuestProgressStore {
    session: SessionId,
    bag: Arc<dyn SessionStore>,
}

impl GuestProgressStore {
    #[must_use]
    pub fn new(session: SessionId, bag: Arc<dyn SessionStore>) -> Self {
        Self { session, bag }
    }

    /// Session bag key holding the record for `lesson_id`.
    #[must_use]
    pub fn key_for(lesson_id: LessonId) -> String {
        format!("lesson_progress:{lesson_id}")
    }
}

#[async_trait]
impl ProgressStore for GuestProgressStore {
    async fn load(&self, lesson_id: LessonId) -> Result<Option<LessonProgress>, StorageError> {
        let Some(raw) = self
            .bag
            .get_value(&self.session, &Self::key_for(lesson_id))
            .await?
        else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn save(
        &self,
        lesson_id: LessonId,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        let raw =
            serde_json::to_string(progress).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.bag
            .put_value(&self.session, &Self::key_for(lesson_id), raw)
            .await?;
        Ok(*progress)
    }
}

/// Pick the store for a viewer: durable rows for users, the session bag for
/// guests.
#[must_use]
pub fn store_for(
    viewer: &Viewer,
    rows: &Arc<dyn LessonProgressRepository>,
    bag: &Arc<dyn SessionStore>,
) -> Box<dyn ProgressStore> {
    match viewer {
        Viewer::User(user) => Box::new(UserProgressStore::new(user.id(), Arc::clone(rows))),
        Viewer::Guest(session) => Box::new(GuestProgressStore::new(session.clone(), Arc::clone(bag))),
    }
}
