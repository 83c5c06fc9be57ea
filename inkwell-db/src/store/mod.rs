use crate::client::Result;
use async_trait::async_trait;
use inkwell_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication, Credentials, PasswordDigest},
    comment::{Comment, CommentBody, CommentMarker},
    post::{CoverImage, Excerpt, Post, PostBody, PostMarker, PostPatch, PostTitle, Tags},
    reading::{Bookmark, BookmarkState, HistoryEntry},
    social::{FollowState, LikeState, LikeTarget, MembershipChange},
    user::{Bio, Email, User, UserMarker, UserName, UserSummary},
};
use std::{collections::BTreeSet, fmt::Debug, num::NonZeroUsize};
use time::OffsetDateTime;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewUser {
    pub id: Id<UserMarker>,
    pub name: UserName,
    pub email: Email,
    pub password_digest: PasswordDigest,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewPost {
    pub id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub title: PostTitle,
    pub content: PostBody,
    pub excerpt: Option<Excerpt>,
    pub cover_image: Option<CoverImage>,
    pub tags: Tags,
    pub published: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewComment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub content: CommentBody,
    pub created_at: OffsetDateTime,
}

/// Which posts to list. Every variant is returned newest first.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostQuery {
    Published,
    ByAuthor {
        author: Id<UserMarker>,
        include_drafts: bool,
    },
    PublishedByAuthors(BTreeSet<Id<UserMarker>>),
}

/// The storage collaborator.
///
/// Each method is atomic on its own: a concurrent caller observes either none
/// or all of its effect. `None` results mean a referenced entity does not exist.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Returns `None` when the email is already registered.
    async fn insert_user(&self, user: NewUser) -> Result<Option<User>>;
    async fn fetch_user(&self, user: Id<UserMarker>) -> Result<Option<User>>;
    async fn fetch_credentials(&self, email: &Email) -> Result<Option<Credentials>>;
    async fn fetch_user_summaries(&self, users: &BTreeSet<Id<UserMarker>>)
    -> Result<Vec<UserSummary>>;
    /// Case-insensitive substring match on name or email, ordered by name.
    async fn search_users(&self, query: &str, excluding: Id<UserMarker>)
    -> Result<Vec<UserSummary>>;
    async fn update_bio(&self, user: Id<UserMarker>, bio: &Bio) -> Result<Option<User>>;

    /// Changes the `actor -> target` edge in both adjacency sets at once.
    async fn change_follow(
        &self,
        actor: Id<UserMarker>,
        target: Id<UserMarker>,
        change: MembershipChange,
    ) -> Result<Option<FollowState>>;

    /// Also drops authentications that expired before `authentication` was created.
    async fn insert_authentication(&self, authentication: &Authentication) -> Result<()>;
    async fn fetch_authentication(&self, token_hash: &AuthTokenHash)
    -> Result<Option<Authentication>>;

    /// Returns `None` when the author does not exist.
    async fn insert_post(&self, post: NewPost) -> Result<Option<Post>>;
    async fn fetch_post(&self, post: Id<PostMarker>) -> Result<Option<Post>>;
    /// Counts a view and returns the post, if it exists and `viewer` may see it.
    ///
    /// An authenticated viewer gets the post recorded in their reading history
    /// as part of the same change.
    async fn view_post(
        &self,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
        viewed_at: OffsetDateTime,
        history_cap: NonZeroUsize,
    ) -> Result<Option<Post>>;
    async fn update_post(
        &self,
        post: Id<PostMarker>,
        patch: &PostPatch,
        now: OffsetDateTime,
    ) -> Result<Option<Post>>;
    /// Also removes the post's comments, likes and bookmarks.
    async fn delete_post(&self, post: Id<PostMarker>) -> Result<bool>;
    async fn fetch_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;

    /// `None` when the target does not exist or sits on a post `actor` may not see.
    async fn change_like(
        &self,
        actor: Id<UserMarker>,
        target: LikeTarget,
        change: MembershipChange,
    ) -> Result<Option<LikeState>>;

    /// Returns `None` when the author does not exist or the post is not visible to them.
    async fn insert_comment(&self, comment: NewComment) -> Result<Option<Comment>>;
    async fn fetch_comment(&self, comment: Id<CommentMarker>) -> Result<Option<Comment>>;
    /// Newest first; `None` when the post does not exist or `viewer` may not see it.
    async fn fetch_comments(
        &self,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<Vec<Comment>>>;
    async fn update_comment(
        &self,
        comment: Id<CommentMarker>,
        content: &CommentBody,
        now: OffsetDateTime,
    ) -> Result<Option<Comment>>;
    async fn delete_comment(&self, comment: Id<CommentMarker>) -> Result<bool>;

    /// `None` when the user does not exist or the post is not visible to them.
    async fn change_bookmark(
        &self,
        user: Id<UserMarker>,
        post: Id<PostMarker>,
        change: MembershipChange,
        now: OffsetDateTime,
        cap: NonZeroUsize,
    ) -> Result<Option<BookmarkState>>;
    async fn fetch_bookmarks(&self, user: Id<UserMarker>) -> Result<Vec<Bookmark>>;
    async fn fetch_history(&self, user: Id<UserMarker>) -> Result<Vec<HistoryEntry>>;
    async fn clear_history(&self, user: Id<UserMarker>) -> Result<()>;
}
