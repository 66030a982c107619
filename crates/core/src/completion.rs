//! Auto-completion thresholds for watched lessons.
//!
//! A lesson counts as watched once the playback high-water mark reaches a
//! threshold derived from its duration. Short clips must be watched almost to
//! the end, medium lessons to 90 %, and long lessons to within the outro.

/// Lessons shorter than this use the short-clip rule.
pub const SHORT_LESSON_MAX_SECONDS: u32 = 120;

/// Lessons at least this long use the long-lesson rule.
pub const LONG_LESSON_MIN_SECONDS: u32 = 480;

/// Seconds before the end that still count as "finished" for short lessons.
pub const SHORT_TAIL_SECONDS: u32 = 10;

/// Seconds before the end that still count as "finished" for long lessons.
pub const LONG_TAIL_SECONDS: u32 = 30;

/// Percentage of a medium lesson that must be watched.
pub const MEDIUM_WATCHED_PERCENT: u32 = 90;

/// Which completion rule applies to a lesson duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTier {
    /// `duration < 120s`: within 10 seconds of the end.
    Short,
    /// `120s <= duration < 480s`: 90 % of the duration.
    Medium,
    /// `duration >= 480s`: within 30 seconds of the end.
    Long,
}

impl CompletionTier {
    #[must_use]
    pub fn for_duration(duration_seconds: u32) -> Self {
        if duration_seconds < SHORT_LESSON_MAX_SECONDS {
            CompletionTier::Short
        } else if duration_seconds < LONG_LESSON_MIN_SECONDS {
            CompletionTier::Medium
        } else {
            CompletionTier::Long
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionTier::Short => "short",
            CompletionTier::Medium => "medium",
            CompletionTier::Long => "long",
        }
    }
}

/// Playback position (in seconds) at which a lesson of the given duration is
/// considered complete.
///
/// The medium rule rounds up, so a 125s lesson needs 113s of playback.
#[must_use]
pub fn completion_threshold(duration_seconds: u32) -> u32 {
    match CompletionTier::for_duration(duration_seconds) {
        CompletionTier::Short => duration_seconds.saturating_sub(SHORT_TAIL_SECONDS),
        CompletionTier::Medium => {
            let scaled = u64::from(duration_seconds) * u64::from(MEDIUM_WATCHED_PERCENT);
            let rounded_up = scaled.div_ceil(100);
            // medium durations are < 480, so this always fits
            u32::try_from(rounded_up).unwrap_or(duration_seconds)
        }
        CompletionTier::Long => duration_seconds - LONG_TAIL_SECONDS,
    }
}

/// Whether `playback_seconds` has reached the completion threshold.
#[must_use]
pub fn is_watched(duration_seconds: u32, playback_seconds: u32) -> bool {
    playback_seconds >= completion_threshold(duration_seconds)
}
