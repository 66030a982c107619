use crate::model::ids::{SessionId, UserId};

/// An authenticated user, as handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    subscriber_id: Option<String>,
}

impl User {
    /// A blank subscriber id is treated as "not configured".
    #[must_use]
    pub fn new(id: UserId, subscriber_id: Option<String>) -> Self {
        let subscriber_id = subscriber_id
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        Self { id, subscriber_id }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// External marketing subscriber identifier, if the user has one.
    #[must_use]
    pub fn subscriber_id(&self) -> Option<&str> {
        self.subscriber_id.as_deref()
    }
}

/// Who is watching: an identified user or an anonymous session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    User(User),
    Guest(SessionId),
}

impl Viewer {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Viewer::User(user) => Some(user),
            Viewer::Guest(_) => None,
        }
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        matches!(self, Viewer::Guest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_subscriber_is_none() {
        let user = User::new(UserId::new(1), Some("  ".into()));
        assert_eq!(user.subscriber_id(), None);
        let user = User::new(UserId::new(1), Some(" sub_1 ".into()));
        assert_eq!(user.subscriber_id(), Some("sub_1"));
    }

    #[test]
    fn viewer_exposes_user() {
        let guest = Viewer::Guest(SessionId::new("s").unwrap());
        assert!(guest.is_guest());
        assert!(guest.user().is_none());
    }
}
