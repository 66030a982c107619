use thiserror::Error;

use crate::model::ids::CourseId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course slug cannot be empty")]
    EmptySlug,

    #[error("course slug contains an invalid character: {0:?}")]
    InvalidSlug(char),

    #[error("course title cannot be empty")]
    EmptyTitle,
}

/// A course groups lessons; its slug identifies it in marketing tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    slug: String,
    title: String,
}

impl Course {
    /// Build a validated course.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the slug is empty or contains whitespace or
    /// `:`, or if the title is blank.
    pub fn new(
        id: CourseId,
        slug: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, CourseError> {
        let slug = slug.into();
        if slug.is_empty() {
            return Err(CourseError::EmptySlug);
        }
        // the slug is embedded in `startedCourse:<slug>` tags
        if let Some(bad) = slug.chars().find(|c| c.is_whitespace() || *c == ':') {
            return Err(CourseError::InvalidSlug(bad));
        }
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        Ok(Self {
            id,
            slug,
            title: title.trim().to_owned(),
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_slug() {
        assert_eq!(
            Course::new(CourseId::new(1), "", "T").unwrap_err(),
            CourseError::EmptySlug
        );
        assert_eq!(
            Course::new(CourseId::new(1), "a b", "T").unwrap_err(),
            CourseError::InvalidSlug(' ')
        );
        assert_eq!(
            Course::new(CourseId::new(1), "a:b", "T").unwrap_err(),
            CourseError::InvalidSlug(':')
        );
        let course = Course::new(CourseId::new(1), "intro-to-rust", " Intro ").unwrap();
        assert_eq!(course.slug(), "intro-to-rust");
        assert_eq!(course.title(), "Intro");
    }
}
