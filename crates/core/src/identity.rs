//! The user identity a request is executed on behalf of.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Identity of the caller, as established by the host's authentication layer.
///
/// Only the identifier decides whether a user counts as authenticated. A guest
/// identity may carry a display name, but it is never treated as logged in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserIdentity {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, username: None }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// A user is authenticated iff it carries a non-nil identifier.
    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_nil()
    }
}

impl core::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.username {
            Some(name) => write!(f, "{name} ({})", self.user_id),
            None => core::fmt::Display::fmt(&self.user_id, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_user_is_not_authenticated() {
        assert!(!UserIdentity::anonymous().is_authenticated());
    }

    #[test]
    fn named_guest_is_still_anonymous() {
        let guest = UserIdentity::anonymous().with_username("guest");
        assert!(!guest.is_authenticated());
    }

    #[test]
    fn user_with_id_is_authenticated() {
        assert!(UserIdentity::new(UserId::new()).is_authenticated());
    }
}
