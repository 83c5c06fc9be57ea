//! Per-user reading list (bookmarks) and reading history.

use crate::model::{
    Id,
    post::{PostMarker, PostTitle},
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use time::OffsetDateTime;

pub const DEFAULT_HISTORY_CAP: NonZeroUsize = NonZeroUsize::new(50).unwrap();
pub const DEFAULT_BOOKMARK_CAP: NonZeroUsize = NonZeroUsize::new(500).unwrap();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Bookmark {
    pub post_id: Id<PostMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub post_id: Id<PostMarker>,
    pub title: PostTitle,
    #[serde(with = "time::serde::rfc3339")]
    pub viewed_at: OffsetDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
pub struct BookmarkState {
    pub bookmarked: bool,
    pub bookmarks_count: usize,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct ReadingLimits {
    pub history_cap: NonZeroUsize,
    pub bookmark_cap: NonZeroUsize,
}

impl Default for ReadingLimits {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            bookmark_cap: DEFAULT_BOOKMARK_CAP,
        }
    }
}

pub trait ReadingEntry {
    fn post_id(&self) -> Id<PostMarker>;
}

impl ReadingEntry for Bookmark {
    fn post_id(&self) -> Id<PostMarker> {
        self.post_id
    }
}

impl ReadingEntry for HistoryEntry {
    fn post_id(&self) -> Id<PostMarker> {
        self.post_id
    }
}

/// Moves `entry` to the front of a newest-first list, removing any older entry
/// for the same post, then drops whatever exceeds `cap`.
pub fn push_front_capped<T: ReadingEntry>(entries: &mut Vec<T>, entry: T, cap: NonZeroUsize) {
    entries.retain(|existing| existing.post_id() != entry.post_id());
    entries.insert(0, entry);
    entries.truncate(cap.get());
}

#[cfg(test)]
mod tests {
    use super::{Bookmark, push_front_capped};
    use std::num::NonZeroUsize;
    use time::OffsetDateTime;

    fn cap(cap: usize) -> NonZeroUsize {
        NonZeroUsize::new(cap).unwrap()
    }

    fn bookmark(post: u64) -> Bookmark {
        Bookmark {
            post_id: post.into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn posts(entries: &[Bookmark]) -> Vec<u64> {
        entries.iter().map(|entry| entry.post_id.into()).collect()
    }

    #[test]
    fn revisiting_moves_to_front_without_duplicates() {
        let mut entries = vec![bookmark(3), bookmark(2), bookmark(1)];
        push_front_capped(&mut entries, bookmark(1), cap(10));
        assert_eq!(posts(&entries), [1, 3, 2]);
    }

    #[test]
    fn oldest_entries_fall_off() {
        let mut entries = Vec::new();
        for post in 1..=5 {
            push_front_capped(&mut entries, bookmark(post), cap(3));
        }
        assert_eq!(posts(&entries), [5, 4, 3]);
    }

    #[test]
    fn a_single_slot_keeps_the_latest_entry() {
        let mut entries = Vec::new();
        push_front_capped(&mut entries, bookmark(1), NonZeroUsize::MIN);
        push_front_capped(&mut entries, bookmark(2), NonZeroUsize::MIN);
        assert_eq!(posts(&entries), [2]);
    }
}
