use crate::model::{
    Id,
    text::{InvalidTextError, bounded_text},
    user::{UserMarker, UserSummary},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::{cmp::Reverse, collections::BTreeSet};
use time::OffsetDateTime;

pub const MAX_TAGS: usize = 20;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

bounded_text!(PostTitle: "title", 1..=200, trim = true);
bounded_text!(PostBody: "content", 1..=100_000, trim = false);
bounded_text!(Excerpt: "excerpt", 0..=500, trim = true);
bounded_text!(CoverImage: "cover image", 0..=2048, trim = true);
bounded_text!(Tag: "tag", 1..=40, trim = true);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: UserSummary,
    pub title: PostTitle,
    pub content: PostBody,
    pub excerpt: Option<Excerpt>,
    pub cover_image: Option<CoverImage>,
    pub tags: Tags,
    pub published: bool,
    pub views: u64,
    pub likes: BTreeSet<Id<UserMarker>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Post {
    /// Drafts are only visible to their author.
    #[must_use]
    pub fn is_visible_to(&self, viewer: Option<Id<UserMarker>>) -> bool {
        self.published || viewer == Some(self.author.id)
    }

    #[must_use]
    pub fn is_authored_by(&self, user: Id<UserMarker>) -> bool {
        self.author.id == user
    }
}

/// Orders posts newest first. Ids break ties between posts created in the same instant.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by_key(|post| Reverse((post.created_at, post.id)));
}

/// Ordered tag list. Blank tags are dropped when parsing.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new<I, S>(tags: I) -> Result<Self, InvalidTextError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags
            .into_iter()
            .map(Into::into)
            .filter(|tag: &String| !tag.trim().is_empty())
            .map(Tag::new)
            .collect::<Result<Vec<_>, _>>()?;

        if tags.len() > MAX_TAGS {
            return Err(InvalidTextError {
                field: "tags",
                min: 0,
                max: MAX_TAGS,
            });
        }

        Ok(Self(tags))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }

    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|tag| tag.get().to_owned()).collect()
    }
}

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = Vec::<String>::deserialize(deserializer)?;
        Tags::new(inner).map_err(serde::de::Error::custom)
    }
}

fn published_by_default() -> bool {
    true
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct CreatePost {
    pub title: PostTitle,
    pub content: PostBody,
    #[serde(default)]
    pub excerpt: Option<Excerpt>,
    #[serde(default)]
    pub cover_image: Option<CoverImage>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default = "published_by_default")]
    pub published: bool,
}

/// A partial update. Absent fields keep their stored value.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PostPatch {
    pub title: Option<PostTitle>,
    pub content: Option<PostBody>,
    pub excerpt: Option<Excerpt>,
    pub cover_image: Option<CoverImage>,
    pub tags: Option<Tags>,
    pub published: Option<bool>,
}

impl PostPatch {
    pub fn apply(&self, post: &mut Post, now: OffsetDateTime) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(excerpt) = &self.excerpt {
            post.excerpt = Some(excerpt.clone());
        }
        if let Some(cover_image) = &self.cover_image {
            post.cover_image = Some(cover_image.clone());
        }
        if let Some(tags) = &self.tags {
            post.tags = tags.clone();
        }
        if let Some(published) = self.published {
            post.published = published;
        }
        post.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::{CreatePost, PostPatch, Tags};

    #[test]
    fn create_defaults_to_published_without_tags() {
        let post: CreatePost =
            serde_json::from_str(r#"{"title":"Hello","content":"First post"}"#).unwrap();
        assert!(post.published);
        assert!(post.tags.as_slice().is_empty());
        assert!(post.excerpt.is_none());
    }

    #[test]
    fn create_requires_title_and_content() {
        assert!(serde_json::from_str::<CreatePost>(r#"{"content":"x"}"#).is_err());
        assert!(serde_json::from_str::<CreatePost>(r#"{"title":" ","content":"x"}"#).is_err());
    }

    #[test]
    fn tags_keep_order_and_drop_blanks() {
        let tags = Tags::new(["rust", " ", "web ", ""]).unwrap();
        assert_eq!(tags.to_strings(), ["rust", "web"]);
        assert!(Tags::new((0..21).map(|i| format!("tag{i}"))).is_err());
    }

    #[test]
    fn empty_patch_parses() {
        let patch: PostPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(patch, PostPatch::default());
    }
}
