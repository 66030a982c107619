use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MarketingTagError {
    #[error("unrecognized marketing tag: {0}")]
    Unrecognized(String),
}

/// One-shot marketing tag applied to a subscriber when a course milestone
/// is reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarketingTag {
    StartedCourse(String),
    CompletedCourse(String),
}

impl MarketingTag {
    #[must_use]
    pub fn started_course(slug: impl Into<String>) -> Self {
        Self::StartedCourse(slug.into())
    }

    #[must_use]
    pub fn completed_course(slug: impl Into<String>) -> Self {
        Self::CompletedCourse(slug.into())
    }
}

impl fmt::Display for MarketingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketingTag::StartedCourse(slug) => write!(f, "startedCourse:{slug}"),
            MarketingTag::CompletedCourse(slug) => write!(f, "completedCourse:{slug}"),
        }
    }
}

impl FromStr for MarketingTag {
    type Err = MarketingTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unrecognized = || MarketingTagError::Unrecognized(s.to_owned());
        let (kind, slug) = s.split_once(':').ok_or_else(unrecognized)?;
        if slug.is_empty() {
            return Err(unrecognized());
        }
        match kind {
            "startedCourse" => Ok(Self::started_course(slug)),
            "completedCourse" => Ok(Self::completed_course(slug)),
            _ => Err(unrecognized()),
        }
    }
}
