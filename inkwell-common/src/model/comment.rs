use crate::model::{
    Id,
    post::PostMarker,
    text::bounded_text,
    user::{UserMarker, UserSummary},
};
use serde::{Deserialize, Serialize};
use std::{cmp::Reverse, collections::BTreeSet};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

bounded_text!(CommentBody: "content", 1..=5000, trim = false);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author: UserSummary,
    pub content: CommentBody,
    pub likes: BTreeSet<Id<UserMarker>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Comment {
    #[must_use]
    pub fn is_authored_by(&self, user: Id<UserMarker>) -> bool {
        self.author.id == user
    }
}

pub fn sort_newest_first(comments: &mut [Comment]) {
    comments.sort_by_key(|comment| Reverse((comment.created_at, comment.id)));
}

/// Request body for creating or editing a comment.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct CommentContent {
    pub content: CommentBody,
}
