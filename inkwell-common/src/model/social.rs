//! Membership flips shared by follows, likes and bookmarks.

use crate::model::{Id, comment::CommentMarker, post::PostMarker};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display};

/// How a membership should change.
///
/// `Toggle` is what the HTTP API exposes; `Insert` and `Remove` carry the
/// caller's intent so that a repeated request cannot undo itself.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum MembershipChange {
    Toggle,
    Insert,
    Remove,
}

impl MembershipChange {
    #[must_use]
    pub fn explicit(member: bool) -> Self {
        if member { Self::Insert } else { Self::Remove }
    }

    /// The membership after applying this change to the current one.
    #[must_use]
    pub fn resolve(self, currently_member: bool) -> bool {
        match self {
            Self::Toggle => !currently_member,
            Self::Insert => true,
            Self::Remove => false,
        }
    }

    /// Applies the change to `set` and returns the resulting membership of `item`.
    pub fn apply<T: Ord>(self, set: &mut BTreeSet<T>, item: T) -> bool {
        let member = self.resolve(set.contains(&item));
        if member {
            set.insert(item);
        } else {
            set.remove(&item);
        }
        member
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
pub struct FollowState {
    pub followed: bool,
    pub followers_count: usize,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: usize,
}

/// Something that carries a like set.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum LikeTarget {
    Post(Id<PostMarker>),
    Comment(Id<CommentMarker>),
}

impl Display for LikeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Post(id) => write!(f, "post {id}"),
            Self::Comment(id) => write!(f, "comment {id}"),
        }
    }
}
