use inkwell_common::model::{
    Id, ModelValidationError,
    auth::{Authentication, Credentials},
    comment::{Comment, CommentBody},
    post::{CoverImage, Excerpt, Post, PostBody, PostTitle, Tags},
    reading::{Bookmark, HistoryEntry},
    user::{Bio, Email, User, UserName, UserSummary},
};
use std::collections::BTreeSet;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub created_at: OffsetDateTime,
    pub followers: Vec<i64>,
    pub following: Vec<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, sqlx::FromRow)]
pub(crate) struct UserSummaryRecord {
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, sqlx::FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_snowflake: i64,
    pub password_digest: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub published: bool,
    pub views: i64,
    pub likes: Vec<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub content: String,
    pub likes: Vec<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct BookmarkRecord {
    pub post_snowflake: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct HistoryRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub viewed_at: OffsetDateTime,
}

fn id_set<Marker: Ord>(ids: Vec<i64>) -> BTreeSet<Id<Marker>> {
    ids.into_iter().map(Id::from_db).collect()
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            name: UserName::new(value.name)?,
            email: Email::new(value.email)?,
            bio: Bio::new(value.bio)?,
            followers: id_set(value.followers),
            following: id_set(value.following),
            created_at: value.created_at,
        })
    }
}

impl TryFrom<UserSummaryRecord> for UserSummary {
    type Error = ModelValidationError;

    fn try_from(value: UserSummaryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            name: UserName::new(value.name)?,
            email: Email::new(value.email)?,
        })
    }
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            password_digest: value.password_digest.try_into()?,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            author: UserSummary {
                id: Id::from_db(value.user_snowflake),
                name: UserName::new(value.name)?,
                email: Email::new(value.email)?,
            },
            title: PostTitle::new(value.title)?,
            content: PostBody::new(value.content)?,
            excerpt: value.excerpt.map(Excerpt::new).transpose()?,
            cover_image: value.cover_image.map(CoverImage::new).transpose()?,
            tags: Tags::new(value.tags)?,
            published: value.published,
            views: u64::try_from(value.views)
                .map_err(|_| ModelValidationError::NegativeCounter(value.views))?,
            likes: id_set(value.likes),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post_id: Id::from_db(value.post_snowflake),
            author: UserSummary {
                id: Id::from_db(value.user_snowflake),
                name: UserName::new(value.name)?,
                email: Email::new(value.email)?,
            },
            content: CommentBody::new(value.content)?,
            likes: id_set(value.likes),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

impl From<BookmarkRecord> for Bookmark {
    fn from(value: BookmarkRecord) -> Self {
        Self {
            post_id: Id::from_db(value.post_snowflake),
            created_at: value.created_at,
        }
    }
}

impl TryFrom<HistoryRecord> for HistoryEntry {
    type Error = ModelValidationError;

    fn try_from(value: HistoryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            post_id: Id::from_db(value.post_snowflake),
            title: PostTitle::new(value.title)?,
            viewed_at: value.viewed_at,
        })
    }
}
