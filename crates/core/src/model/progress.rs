use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::completion::is_watched;

/// Writes `value` into `slot` only if the slot is still empty.
///
/// Returns `true` when the slot was written. Every write-once progress field
/// goes through this helper.
pub fn set_if_absent<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

//
// ─── SIGNALS ───────────────────────────────────────────────────────────────────
//

/// Progress signals reported by the player for a single call.
///
/// Every field is optional and independent of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSignals {
    pub started_at: Option<DateTime<Utc>>,
    pub playback_time_seconds: Option<u32>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressSignals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    #[must_use]
    pub fn with_playback(mut self, seconds: u32) -> Self {
        self.playback_time_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }
}

//
// ─── LESSON PROGRESS ───────────────────────────────────────────────────────────
//

/// Progress of one viewer through one lesson.
///
/// `viewed_at`, `started_at` and `completed_at` are write-once;
/// `playback_time_seconds` only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    viewed_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    playback_time_seconds: Option<u32>,
    completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// Rehydrate a record from storage.
    #[must_use]
    pub fn from_persisted(
        viewed_at: Option<DateTime<Utc>>,
        started_at: Option<DateTime<Utc>>,
        playback_time_seconds: Option<u32>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            viewed_at,
            started_at,
            playback_time_seconds,
            completed_at,
        }
    }

    #[must_use]
    pub fn viewed_at(&self) -> Option<DateTime<Utc>> {
        self.viewed_at
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn playback_time_seconds(&self) -> Option<u32> {
        self.playback_time_seconds
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn mark_viewed(&mut self, at: DateTime<Utc>) -> bool {
        set_if_absent(&mut self.viewed_at, at)
    }

    pub fn mark_started(&mut self, at: DateTime<Utc>) -> bool {
        set_if_absent(&mut self.started_at, at)
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> bool {
        set_if_absent(&mut self.completed_at, at)
    }

    /// Raise the playback high-water mark. Lower values are ignored, since
    /// players may report ticks out of order.
    ///
    /// Returns `true` if the stored value changed.
    pub fn record_playback(&mut self, seconds: u32) -> bool {
        let next = self.playback_time_seconds.unwrap_or(0).max(seconds);
        let changed = self.playback_time_seconds != Some(next);
        self.playback_time_seconds = Some(next);
        changed
    }

    /// Apply one call's signals: the call itself counts as a view, then
    /// start, playback and explicit completion are folded in.
    pub fn apply_signals(&mut self, signals: &ProgressSignals, now: DateTime<Utc>) {
        self.mark_viewed(now);
        if let Some(started_at) = signals.started_at {
            self.mark_started(started_at);
        }
        if let Some(seconds) = signals.playback_time_seconds {
            self.record_playback(seconds);
        }
        if let Some(completed_at) = signals.completed_at {
            self.mark_completed(completed_at);
        }
    }

    /// Complete the lesson at `now` if enough of it has been watched.
    ///
    /// No-op for lessons without a duration, records without playback, and
    /// records that are already complete. Returns `true` if this call set
    /// `completed_at`.
    pub fn complete_if_watched(&mut self, duration_seconds: Option<u32>, now: DateTime<Utc>) -> bool {
        if self.completed_at.is_some() {
            return false;
        }
        let (Some(duration), Some(playback)) = (duration_seconds, self.playback_time_seconds)
        else {
            return false;
        };
        if !is_watched(duration, playback) {
            return false;
        }
        self.mark_completed(now)
    }

    /// Fold `other` into a copy of `self` with the same monotonic rules:
    /// set fields of `self` win, playback takes the maximum.
    #[must_use]
    pub fn merge(&self, other: &LessonProgress) -> LessonProgress {
        let mut merged = *self;
        if let Some(at) = other.viewed_at {
            merged.mark_viewed(at);
        }
        if let Some(at) = other.started_at {
            merged.mark_started(at);
        }
        if let Some(seconds) = other.playback_time_seconds {
            merged.record_playback(seconds);
        }
        if let Some(at) = other.completed_at {
            merged.mark_completed(at);
        }
        merged
    }
}

//
// ─── COURSE PROGRESS ───────────────────────────────────────────────────────────
//

/// Where a user stands in a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseState {
    NotStarted,
    Started,
    Completed,
}

/// Course-level milestones for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseProgress {
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl CourseProgress {
    #[must_use]
    pub fn from_persisted(
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            started_at,
            completed_at,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn mark_started(&mut self, at: DateTime<Utc>) -> bool {
        set_if_absent(&mut self.started_at, at)
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> bool {
        set_if_absent(&mut self.completed_at, at)
    }

    /// Completion wins even without a recorded start.
    #[must_use]
    pub fn state(&self) -> CourseState {
        match (self.started_at, self.completed_at) {
            (_, Some(_)) => CourseState::Completed,
            (Some(_), None) => CourseState::Started,
            (None, None) => CourseState::NotStarted,
        }
    }
}
