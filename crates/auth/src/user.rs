//! Author profiles learned from verified tokens.
//!
//! Users are owned by the identity provider. The content service only needs a
//! display name and avatar to populate authors on reads, so it keeps the last
//! profile seen for each user id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use quill_core::UserId;

use crate::claims::JwtClaims;

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl From<&JwtClaims> for UserProfile {
    fn from(claims: &JwtClaims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username.clone(),
            avatar: claims.avatar.clone(),
        }
    }
}

/// Read-mostly lookup of user profiles.
pub trait UserDirectory: Send + Sync {
    fn get(&self, id: &UserId) -> Option<UserProfile>;

    /// Record (or refresh) a profile.
    fn remember(&self, profile: UserProfile);
}

impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    fn get(&self, id: &UserId) -> Option<UserProfile> {
        (**self).get(id)
    }

    fn remember(&self, profile: UserProfile) {
        (**self).remember(profile)
    }
}

/// In-memory directory for tests/dev and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    inner: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `profile`, returning `true` if it differs from the one held.
    pub fn refresh(&self, profile: UserProfile) -> bool {
        let Ok(mut map) = self.inner.write() else {
            return false;
        };
        if map.get(&profile.id) == Some(&profile) {
            return false;
        }
        map.insert(profile.id, profile);
        true
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get(&self, id: &UserId) -> Option<UserProfile> {
        let map = self.inner.read().ok()?;
        map.get(id).cloned()
    }

    fn remember(&self, profile: UserProfile) {
        self.refresh(profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_then_get_returns_latest_profile() {
        let dir = InMemoryUserDirectory::new();
        let id = UserId::new();

        assert!(dir.get(&id).is_none());

        dir.remember(UserProfile {
            id,
            username: "old".to_string(),
            avatar: None,
        });
        dir.remember(UserProfile {
            id,
            username: "new".to_string(),
            avatar: Some("a.png".to_string()),
        });

        let got = dir.get(&id).unwrap();
        assert_eq!(got.username, "new");
        assert_eq!(got.avatar.as_deref(), Some("a.png"));
    }

    #[test]
    fn refresh_reports_only_changed_profiles() {
        let dir = InMemoryUserDirectory::new();
        let profile = UserProfile {
            id: UserId::new(),
            username: "ann".to_string(),
            avatar: None,
        };

        assert!(dir.refresh(profile.clone()));
        assert!(!dir.refresh(profile.clone()));
        assert!(dir.refresh(UserProfile {
            avatar: Some("ann.png".to_string()),
            ..profile
        }));
    }
}
