//! Like sets: unique membership of actor ids with toggle semantics.

use serde::{Deserialize, Serialize};

use quill_core::UserId;

/// Outcome of a [`LikeSet::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeToggle {
    Liked,
    Unliked,
}

/// Set of users who like an entity.
///
/// Membership is unique. Insertion order is kept so serialized output is
/// stable, but carries no meaning. Serialized as a plain JSON array of ids;
/// duplicates in the input collapse on deserialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct LikeSet {
    members: Vec<UserId>,
}

impl LikeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, actor: &UserId) -> bool {
        self.members.contains(actor)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter()
    }

    pub fn as_slice(&self) -> &[UserId] {
        &self.members
    }

    /// Flip membership of `actor`: remove if present, add otherwise.
    pub fn toggle(&mut self, actor: UserId) -> LikeToggle {
        match self.members.iter().position(|m| *m == actor) {
            Some(idx) => {
                self.members.remove(idx);
                LikeToggle::Unliked
            }
            None => {
                self.members.push(actor);
                LikeToggle::Liked
            }
        }
    }
}

impl FromIterator<UserId> for LikeSet {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        let mut members: Vec<UserId> = Vec::new();
        for actor in iter {
            if !members.contains(&actor) {
                members.push(actor);
            }
        }
        Self { members }
    }
}

impl From<Vec<UserId>> for LikeSet {
    fn from(value: Vec<UserId>) -> Self {
        value.into_iter().collect()
    }
}

impl From<LikeSet> for Vec<UserId> {
    fn from(value: LikeSet) -> Self {
        value.members
    }
}
