use std::sync::Arc;

use course_core::model::{MarketingTag, User};
use storage::repository::TagQueue;

use crate::Clock;

/// Queues marketing tags for users that have a subscriber id.
///
/// Enqueueing is fire-and-forget: the milestone that triggered the tag is
/// already committed, so a failed enqueue is logged and dropped.
#[derive(Clone)]
pub struct MarketingTagger {
    clock: Clock,
    queue: Arc<dyn TagQueue>,
    enabled: bool,
}

impl MarketingTagger {
    #[must_use]
    pub fn new(clock: Clock, queue: Arc<dyn TagQueue>) -> Self {
        Self {
            clock,
            queue,
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Queue `tag` for `user`. Returns `true` if a job was recorded.
    pub async fn apply(&self, user: &User, tag: MarketingTag) -> bool {
        if !self.enabled {
            tracing::debug!(user_id = %user.id(), %tag, "tagging disabled, skipping");
            return false;
        }
        let Some(subscriber_id) = user.subscriber_id() else {
            tracing::debug!(user_id = %user.id(), %tag, "user has no subscriber id, skipping tag");
            return false;
        };

        match self
            .queue
            .enqueue_tag(subscriber_id, &tag, self.clock.now())
            .await
        {
            Ok(job_id) => {
                tracing::info!(user_id = %user.id(), subscriber_id, %tag, job_id, "queued marketing tag");
                true
            }
            Err(err) => {
                tracing::warn!(user_id = %user.id(), subscriber_id, %tag, error = %err, "failed to queue marketing tag");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::UserId;
    use course_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn skips_users_without_subscriber() {
        let repo = InMemoryRepository::new();
        let tagger = MarketingTagger::new(fixed_clock(), Arc::new(repo.clone()));

        let anonymous = User::new(UserId::new(1), None);
        assert!(!tagger.apply(&anonymous, MarketingTag::started_course("c")).await);

        let subscribed = User::new(UserId::new(2), Some("sub_2".into()));
        assert!(tagger.apply(&subscribed, MarketingTag::started_course("c")).await);

        let jobs = repo.pending_tags(10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].subscriber_id, "sub_2");
    }

    #[tokio::test]
    async fn disabled_tagger_queues_nothing() {
        let repo = InMemoryRepository::new();
        let tagger =
            MarketingTagger::new(fixed_clock(), Arc::new(repo.clone())).with_enabled(false);
        let user = User::new(UserId::new(1), Some("sub".into()));
        assert!(!tagger.apply(&user, MarketingTag::completed_course("c")).await);
        assert!(repo.pending_tags(10).await.unwrap().is_empty());
    }

    struct BrokenQueue;

    #[async_trait::async_trait]
    impl TagQueue for BrokenQueue {
        async fn enqueue_tag(
            &self,
            _subscriber_id: &str,
            _tag: &MarketingTag,
            _at: chrono::DateTime<chrono::Utc>,
        ) -> Result<i64, storage::StorageError> {
            Err(storage::StorageError::Connection("queue down".into()))
        }

        async fn pending_tags(
            &self,
            _limit: u32,
        ) -> Result<Vec<storage::TagJob>, storage::StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn enqueue_failure_is_swallowed() {
        let tagger = MarketingTagger::new(fixed_clock(), Arc::new(BrokenQueue));
        let user = User::new(UserId::new(1), Some("sub".into()));
        assert!(!tagger.apply(&user, MarketingTag::started_course("c")).await);
    }
}
