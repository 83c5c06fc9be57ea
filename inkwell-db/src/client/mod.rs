//! The engines: relationship, interaction, feed, content, identity and reading.
//!
//! Every operation takes the acting user explicitly and delegates the actual
//! read-modify-write to a single [`Store`] call.

use crate::store::{MemoryStore, Store};
use inkwell_common::{
    model::{
        Id, InkwellSnowflakeGenerator, ModelValidationError,
        auth::{AuthTokenHashError, PasswordHashingError},
        comment::CommentMarker,
        post::PostMarker,
        reading::ReadingLimits,
        social::LikeTarget,
        user::{Email, UserMarker},
    },
    snowflake::{ProcessId, SnowflakeTimestampFromDateTimeError, WorkerId},
    util::PositiveDuration,
};
use std::{
    fmt::{Debug, Formatter},
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;

mod auth;
mod comments;
mod feed;
mod follows;
mod likes;
mod posts;
mod reading;
mod users;

pub use auth::SignedIn;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    TokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHashing(#[from] PasswordHashingError),
    #[error("Cannot generate an id: {0}")]
    Clock(#[from] SnowflakeTimestampFromDateTimeError),
    #[error("User with id {0} was not found")]
    UserNotFound(Id<UserMarker>),
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("Comment with id {0} was not found")]
    CommentNotFound(Id<CommentMarker>),
    #[error("You cannot follow yourself")]
    SelfFollow,
    #[error("Only the author of this {0} may change it")]
    NotAuthor(&'static str),
    #[error("An account with the email {} already exists", .0.get())]
    EmailTaken(Email),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("The auth token is unknown or expired")]
    Unauthenticated,
}

impl DbError {
    pub(crate) fn target_not_found(target: LikeTarget) -> Self {
        match target {
            LikeTarget::Post(id) => Self::PostNotFound(id),
            LikeTarget::Comment(id) => Self::CommentNotFound(id),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct ClientConfig {
    /// `None` issues tokens that never expire.
    pub token_lifetime: Option<PositiveDuration>,
    pub reading: ReadingLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token_lifetime: PositiveDuration::days(7).ok(),
            reading: ReadingLimits::default(),
        }
    }
}

pub struct DbClient {
    store: Arc<dyn Store>,
    snowflake_generator: Mutex<InkwellSnowflakeGenerator>,
    config: ClientConfig,
}

impl DbClient {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        worker_id: WorkerId,
        process_id: ProcessId,
        config: ClientConfig,
    ) -> Self {
        let snowflake_generator =
            Mutex::new(InkwellSnowflakeGenerator::new(worker_id, process_id));

        Self {
            store,
            snowflake_generator,
            config,
        }
    }

    /// A client over a fresh [`MemoryStore`], with default configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            WorkerId::new_unchecked(0),
            ProcessId::new_unchecked(0),
            ClientConfig::default(),
        )
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(snowflake.into())
    }
}

impl Debug for DbClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbClient")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{DbClient, SignedIn};
    use inkwell_common::model::{
        Id,
        post::{CreatePost, Post, PostBody, PostTitle, Tags},
        user::{CreateUser, Email, Password, UserMarker, UserName},
    };

    pub async fn sign_up(client: &DbClient, name: &str) -> Id<UserMarker> {
        let SignedIn { user, .. } = client
            .sign_up(CreateUser {
                name: UserName::new(name).unwrap(),
                email: Email::new(format!("{name}@example.org")).unwrap(),
                password: Password::new("correct horse battery".into()).unwrap(),
            })
            .await
            .unwrap();
        user.id
    }

    pub fn draft(title: &str, published: bool) -> CreatePost {
        CreatePost {
            title: PostTitle::new(title).unwrap(),
            content: PostBody::new(format!("All about {title}")).unwrap(),
            excerpt: None,
            cover_image: None,
            tags: Tags::default(),
            published,
        }
    }

    pub async fn publish(client: &DbClient, author: Id<UserMarker>, title: &str) -> Post {
        client.create_post(author, draft(title, true)).await.unwrap()
    }
}
