use crate::{
    client::Result,
    record::{
        AuthenticationRecord, BookmarkRecord, CommentRecord, CredentialsRecord, HistoryRecord,
        PostRecord, UserRecord, UserSummaryRecord,
    },
    store::{NewComment, NewPost, NewUser, PostQuery, Store},
};
use async_trait::async_trait;
use inkwell_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Authentication, Credentials},
    comment::{Comment, CommentBody, CommentMarker},
    post::{CoverImage, Excerpt, Post, PostBody, PostMarker, PostPatch, PostTitle, Tags},
    reading::{Bookmark, BookmarkState, HistoryEntry},
    social::{FollowState, LikeState, LikeTarget, MembershipChange},
    user::{Bio, Email, User, UserMarker, UserSummary},
};
use sqlx::{PgPool, Postgres, Transaction, query, query_as, query_scalar};
use std::{collections::BTreeSet, num::NonZeroUsize};
use time::{OffsetDateTime, PrimitiveDateTime};

macro_rules! user_columns {
    () => {
        "
        u.user_snowflake,
        u.name,
        u.email,
        u.bio,
        u.created_at,
        ARRAY(
            SELECT f.follower_snowflake FROM users.follows f
            WHERE f.followee_snowflake = u.user_snowflake
        ) AS followers,
        ARRAY(
            SELECT f.followee_snowflake FROM users.follows f
            WHERE f.follower_snowflake = u.user_snowflake
        ) AS following
        "
    };
}

/// Expects the post as `p` and its author as `u`.
macro_rules! post_columns {
    () => {
        "
        p.post_snowflake,
        p.title,
        p.content,
        p.excerpt,
        p.cover_image,
        p.tags,
        p.published,
        p.views,
        ARRAY(
            SELECT l.user_snowflake FROM posts.post_likes l
            WHERE l.post_snowflake = p.post_snowflake
        ) AS likes,
        p.created_at,
        p.updated_at,
        u.user_snowflake,
        u.name,
        u.email
        "
    };
}

macro_rules! select_posts {
    ($filter:literal) => {
        concat!(
            "SELECT ",
            post_columns!(),
            "FROM posts.posts p JOIN users.users u ON u.user_snowflake = p.user_snowflake ",
            $filter,
            " ORDER BY p.created_at DESC, p.post_snowflake DESC",
        )
    };
}

macro_rules! select_comments {
    ($filter:literal) => {
        concat!(
            "
            SELECT
                c.comment_snowflake,
                c.post_snowflake,
                c.content,
                ARRAY(
                    SELECT l.user_snowflake FROM posts.comment_likes l
                    WHERE l.comment_snowflake = c.comment_snowflake
                ) AS likes,
                c.created_at,
                c.updated_at,
                u.user_snowflake,
                u.name,
                u.email
            FROM posts.comments c JOIN users.users u ON u.user_snowflake = c.user_snowflake
            ",
            $filter,
            " ORDER BY c.created_at DESC, c.comment_snowflake DESC",
        )
    };
}

/// The statements that toggle a like on one kind of target.
///
/// `lock_target` only finds targets whose post is published or written by `$2`.
struct LikeStatements {
    lock_target: &'static str,
    exists: &'static str,
    insert: &'static str,
    delete: &'static str,
    count: &'static str,
}

const POST_LIKES: LikeStatements = LikeStatements {
    lock_target: "
        SELECT post_snowflake FROM posts.posts
        WHERE post_snowflake = $1 AND (published OR user_snowflake = $2)
        FOR UPDATE
        ",
    exists: "SELECT EXISTS (SELECT 1 FROM posts.post_likes WHERE post_snowflake = $1 AND user_snowflake = $2)",
    insert: "INSERT INTO posts.post_likes (post_snowflake, user_snowflake) VALUES ($1, $2)",
    delete: "DELETE FROM posts.post_likes WHERE post_snowflake = $1 AND user_snowflake = $2",
    count: "SELECT COUNT(*) FROM posts.post_likes WHERE post_snowflake = $1",
};

const COMMENT_LIKES: LikeStatements = LikeStatements {
    lock_target: "
        SELECT c.comment_snowflake
        FROM posts.comments c JOIN posts.posts p ON p.post_snowflake = c.post_snowflake
        WHERE c.comment_snowflake = $1 AND (p.published OR p.user_snowflake = $2)
        FOR UPDATE OF c
        ",
    exists: "SELECT EXISTS (SELECT 1 FROM posts.comment_likes WHERE comment_snowflake = $1 AND user_snowflake = $2)",
    insert: "INSERT INTO posts.comment_likes (comment_snowflake, user_snowflake) VALUES ($1, $2)",
    delete: "DELETE FROM posts.comment_likes WHERE comment_snowflake = $1 AND user_snowflake = $2",
    count: "SELECT COUNT(*) FROM posts.comment_likes WHERE comment_snowflake = $1",
};

fn count(value: i64) -> Result<usize> {
    Ok(usize::try_from(value).map_err(|_| ModelValidationError::NegativeCounter(value))?)
}

fn limit(cap: NonZeroUsize) -> i64 {
    i64::try_from(cap.get()).unwrap_or(i64::MAX)
}

/// Postgres storage. Every multi-statement change runs in one transaction that
/// locks the parent row first, so concurrent changes to the same set serialize.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `url` and brings the schema up to date.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self::new(pool))
    }

    async fn lock_user(
        transaction: &mut Transaction<'_, Postgres>,
        user: Id<UserMarker>,
    ) -> Result<bool> {
        let locked = query_scalar::<_, i64>(
            "SELECT user_snowflake FROM users.users WHERE user_snowflake = $1 FOR UPDATE",
        )
        .bind(user.to_db())
        .fetch_optional(&mut **transaction)
        .await?;

        Ok(locked.is_some())
    }

    async fn post_visible_to(
        transaction: &mut Transaction<'_, Postgres>,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<bool> {
        let visible = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM posts.posts
                WHERE post_snowflake = $1 AND (published OR user_snowflake = $2)
            )
            ",
        )
        .bind(post.to_db())
        .bind(viewer.map(Id::to_db))
        .fetch_one(&mut **transaction)
        .await?;

        Ok(visible)
    }

    async fn record_history(
        transaction: &mut Transaction<'_, Postgres>,
        user: Id<UserMarker>,
        post: &Post,
        viewed_at: OffsetDateTime,
        cap: NonZeroUsize,
    ) -> Result<()> {
        if !Self::lock_user(transaction, user).await? {
            return Ok(());
        }

        query(
            "
            INSERT INTO users.reading_history (user_snowflake, post_snowflake, title, viewed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_snowflake, post_snowflake)
            DO UPDATE SET title = EXCLUDED.title, viewed_at = EXCLUDED.viewed_at
            ",
        )
        .bind(user.to_db())
        .bind(post.id.to_db())
        .bind(post.title.get())
        .bind(viewed_at)
        .execute(&mut **transaction)
        .await?;
        Self::prune(
            transaction,
            "
            DELETE FROM users.reading_history WHERE user_snowflake = $1 AND post_snowflake NOT IN (
                SELECT post_snowflake FROM users.reading_history WHERE user_snowflake = $1
                ORDER BY viewed_at DESC, post_snowflake DESC
                LIMIT $2
            )
            ",
            user,
            cap,
        )
        .await
    }

    async fn prune(
        transaction: &mut Transaction<'_, Postgres>,
        statement: &'static str,
        user: Id<UserMarker>,
        cap: NonZeroUsize,
    ) -> Result<()> {
        query(statement)
            .bind(user.to_db())
            .bind(limit(cap))
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<Option<User>> {
        let inserted = query_scalar::<_, i64>(
            "
            INSERT INTO users.users (user_snowflake, name, email, password_digest, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING user_snowflake
            ",
        )
        .bind(new_user.id.to_db())
        .bind(new_user.name.get())
        .bind(new_user.email.get())
        .bind(new_user.password_digest.get())
        .bind(new_user.created_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.map(|_| User {
            id: new_user.id,
            name: new_user.name,
            email: new_user.email,
            bio: Bio::empty(),
            followers: BTreeSet::new(),
            following: BTreeSet::new(),
            created_at: new_user.created_at,
        }))
    }

    async fn fetch_user(&self, user: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(concat!(
            "SELECT ",
            user_columns!(),
            "FROM users.users u WHERE u.user_snowflake = $1",
        ))
        .bind(user.to_db())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::try_from).transpose()?)
    }

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "SELECT user_snowflake, password_digest FROM users.users WHERE email = $1",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Credentials::try_from).transpose()?)
    }

    async fn fetch_user_summaries(
        &self,
        users: &BTreeSet<Id<UserMarker>>,
    ) -> Result<Vec<UserSummary>> {
        let ids: Vec<i64> = users.iter().map(|id| id.to_db()).collect();
        let records = query_as::<_, UserSummaryRecord>(
            "
            SELECT user_snowflake, name, email FROM users.users
            WHERE user_snowflake = ANY($1)
            ORDER BY user_snowflake
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(UserSummary::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn search_users(
        &self,
        search: &str,
        excluding: Id<UserMarker>,
    ) -> Result<Vec<UserSummary>> {
        let records = query_as::<_, UserSummaryRecord>(
            r#"
            SELECT user_snowflake, name, email FROM users.users
            WHERE user_snowflake <> $1
                AND (strpos(lower(name), lower($2)) > 0 OR strpos(email, lower($2)) > 0)
            ORDER BY name COLLATE "C", user_snowflake
            "#,
        )
        .bind(excluding.to_db())
        .bind(search)
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(UserSummary::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn update_bio(&self, user: Id<UserMarker>, bio: &Bio) -> Result<Option<User>> {
        let updated = query("UPDATE users.users SET bio = $2 WHERE user_snowflake = $1")
            .bind(user.to_db())
            .bind(bio.get())
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_user(user).await
    }

    async fn change_follow(
        &self,
        actor: Id<UserMarker>,
        target: Id<UserMarker>,
        change: MembershipChange,
    ) -> Result<Option<FollowState>> {
        let mut transaction = self.pool.begin().await?;

        // Locking in id order keeps opposite follows from deadlocking.
        let locked = query_scalar::<_, i64>(
            "
            SELECT user_snowflake FROM users.users
            WHERE user_snowflake = ANY($1)
            ORDER BY user_snowflake
            FOR UPDATE
            ",
        )
        .bind(vec![actor.to_db(), target.to_db()])
        .fetch_all(&mut *transaction)
        .await?;
        if locked.len() != 2 {
            return Ok(None);
        }

        let exists = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM users.follows
                WHERE follower_snowflake = $1 AND followee_snowflake = $2
            )
            ",
        )
        .bind(actor.to_db())
        .bind(target.to_db())
        .fetch_one(&mut *transaction)
        .await?;

        let followed = change.resolve(exists);
        if followed != exists {
            let statement = if followed {
                "INSERT INTO users.follows (follower_snowflake, followee_snowflake) VALUES ($1, $2)"
            } else {
                "DELETE FROM users.follows WHERE follower_snowflake = $1 AND followee_snowflake = $2"
            };
            query(statement)
                .bind(actor.to_db())
                .bind(target.to_db())
                .execute(&mut *transaction)
                .await?;
        }

        let followers_count = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users.follows WHERE followee_snowflake = $1",
        )
        .bind(target.to_db())
        .fetch_one(&mut *transaction)
        .await?;
        transaction.commit().await?;

        Ok(Some(FollowState {
            followed,
            followers_count: count(followers_count)?,
        }))
    }

    async fn insert_authentication(&self, authentication: &Authentication) -> Result<()> {
        let created_at = PrimitiveDateTime::new(
            authentication.created_at.date(),
            authentication.created_at.time(),
        );

        let mut transaction = self.pool.begin().await?;

        query(
            "
            DELETE FROM users.authentications
            WHERE expires_after_seconds IS NOT NULL
                AND created_at + make_interval(secs => expires_after_seconds) < $1
            ",
        )
        .bind(created_at)
        .execute(&mut *transaction)
        .await?;
        query(
            "
            INSERT INTO users.authentications
                (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(authentication.user.to_db())
        .bind(created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.get().whole_seconds()),
        )
        .execute(&mut *transaction)
        .await?;
        transaction.commit().await?;

        Ok(())
    }

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT user_snowflake, token_hash, created_at, expires_after_seconds
            FROM users.authentications
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Authentication::try_from).transpose()?)
    }

    async fn insert_post(&self, new_post: NewPost) -> Result<Option<Post>> {
        let inserted = query_scalar::<_, i64>(
            "
            INSERT INTO posts.posts (
                post_snowflake, user_snowflake, title, content, excerpt, cover_image,
                tags, published, created_at, updated_at
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $9
            WHERE EXISTS (SELECT 1 FROM users.users WHERE user_snowflake = $2)
            RETURNING post_snowflake
            ",
        )
        .bind(new_post.id.to_db())
        .bind(new_post.author.to_db())
        .bind(new_post.title.get())
        .bind(new_post.content.get())
        .bind(new_post.excerpt.as_ref().map(Excerpt::get))
        .bind(new_post.cover_image.as_ref().map(CoverImage::get))
        .bind(new_post.tags.to_strings())
        .bind(new_post.published)
        .bind(new_post.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(_) => self.fetch_post(new_post.id).await,
            None => Ok(None),
        }
    }

    async fn fetch_post(&self, post: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(select_posts!("WHERE p.post_snowflake = $1"))
            .bind(post.to_db())
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Post::try_from).transpose()?)
    }

    async fn view_post(
        &self,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
        viewed_at: OffsetDateTime,
        history_cap: NonZeroUsize,
    ) -> Result<Option<Post>> {
        let mut transaction = self.pool.begin().await?;

        // The outer select reads the row returned by the update, so the new
        // view count is visible in the same statement.
        let record = query_as::<_, PostRecord>(concat!(
            "
            WITH p AS (
                UPDATE posts.posts SET views = views + 1
                WHERE post_snowflake = $1 AND (published OR user_snowflake = $2)
                RETURNING *
            )
            SELECT ",
            post_columns!(),
            "FROM p JOIN users.users u ON u.user_snowflake = p.user_snowflake",
        ))
        .bind(post.to_db())
        .bind(viewer.map(Id::to_db))
        .fetch_optional(&mut *transaction)
        .await?;
        let Some(viewed) = record.map(Post::try_from).transpose()? else {
            return Ok(None);
        };

        if let Some(viewer) = viewer {
            Self::record_history(&mut transaction, viewer, &viewed, viewed_at, history_cap)
                .await?;
        }
        transaction.commit().await?;

        Ok(Some(viewed))
    }

    async fn update_post(
        &self,
        post: Id<PostMarker>,
        patch: &PostPatch,
        now: OffsetDateTime,
    ) -> Result<Option<Post>> {
        let updated = query(
            "
            UPDATE posts.posts SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                excerpt = COALESCE($4, excerpt),
                cover_image = COALESCE($5, cover_image),
                tags = COALESCE($6, tags),
                published = COALESCE($7, published),
                updated_at = $8
            WHERE post_snowflake = $1
            ",
        )
        .bind(post.to_db())
        .bind(patch.title.as_ref().map(PostTitle::get))
        .bind(patch.content.as_ref().map(PostBody::get))
        .bind(patch.excerpt.as_ref().map(Excerpt::get))
        .bind(patch.cover_image.as_ref().map(CoverImage::get))
        .bind(patch.tags.as_ref().map(Tags::to_strings))
        .bind(patch.published)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_post(post).await
    }

    async fn delete_post(&self, post: Id<PostMarker>) -> Result<bool> {
        // Comments, likes and bookmarks go with it through ON DELETE CASCADE.
        let deleted = query("DELETE FROM posts.posts WHERE post_snowflake = $1")
            .bind(post.to_db())
            .execute(&self.pool)
            .await?;

        Ok(deleted.rows_affected() > 0)
    }

    async fn fetch_posts(&self, post_query: &PostQuery) -> Result<Vec<Post>> {
        let records = match post_query {
            PostQuery::Published => {
                query_as::<_, PostRecord>(select_posts!("WHERE p.published"))
                    .fetch_all(&self.pool)
                    .await?
            }
            PostQuery::ByAuthor {
                author,
                include_drafts,
            } => {
                query_as::<_, PostRecord>(select_posts!(
                    "WHERE p.user_snowflake = $1 AND (p.published OR $2)"
                ))
                .bind(author.to_db())
                .bind(*include_drafts)
                .fetch_all(&self.pool)
                .await?
            }
            PostQuery::PublishedByAuthors(authors) => {
                let authors: Vec<i64> = authors.iter().map(|id| id.to_db()).collect();
                query_as::<_, PostRecord>(select_posts!(
                    "WHERE p.published AND p.user_snowflake = ANY($1)"
                ))
                .bind(authors)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn change_like(
        &self,
        actor: Id<UserMarker>,
        target: LikeTarget,
        change: MembershipChange,
    ) -> Result<Option<LikeState>> {
        let (statements, target_id) = match target {
            LikeTarget::Post(id) => (&POST_LIKES, id.to_db()),
            LikeTarget::Comment(id) => (&COMMENT_LIKES, id.to_db()),
        };
        let mut transaction = self.pool.begin().await?;

        let locked = query_scalar::<_, i64>(statements.lock_target)
            .bind(target_id)
            .bind(actor.to_db())
            .fetch_optional(&mut *transaction)
            .await?;
        if locked.is_none() {
            return Ok(None);
        }

        let exists = query_scalar::<_, bool>(statements.exists)
            .bind(target_id)
            .bind(actor.to_db())
            .fetch_one(&mut *transaction)
            .await?;

        let liked = change.resolve(exists);
        if liked != exists {
            let statement = if liked {
                statements.insert
            } else {
                statements.delete
            };
            query(statement)
                .bind(target_id)
                .bind(actor.to_db())
                .execute(&mut *transaction)
                .await?;
        }

        let likes_count = query_scalar::<_, i64>(statements.count)
            .bind(target_id)
            .fetch_one(&mut *transaction)
            .await?;
        transaction.commit().await?;

        Ok(Some(LikeState {
            liked,
            likes_count: count(likes_count)?,
        }))
    }

    async fn insert_comment(&self, new_comment: NewComment) -> Result<Option<Comment>> {
        let inserted = query_scalar::<_, i64>(
            "
            INSERT INTO posts.comments (
                comment_snowflake, post_snowflake, user_snowflake, content, created_at, updated_at
            )
            SELECT $1, $2, $3, $4, $5, $5
            WHERE EXISTS (
                    SELECT 1 FROM posts.posts
                    WHERE post_snowflake = $2 AND (published OR user_snowflake = $3)
                )
                AND EXISTS (SELECT 1 FROM users.users WHERE user_snowflake = $3)
            RETURNING comment_snowflake
            ",
        )
        .bind(new_comment.id.to_db())
        .bind(new_comment.post_id.to_db())
        .bind(new_comment.author.to_db())
        .bind(new_comment.content.get())
        .bind(new_comment.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(_) => self.fetch_comment(new_comment.id).await,
            None => Ok(None),
        }
    }

    async fn fetch_comment(&self, comment: Id<CommentMarker>) -> Result<Option<Comment>> {
        let record =
            query_as::<_, CommentRecord>(select_comments!("WHERE c.comment_snowflake = $1"))
                .bind(comment.to_db())
                .fetch_optional(&self.pool)
                .await?;

        Ok(record.map(Comment::try_from).transpose()?)
    }

    async fn fetch_comments(
        &self,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<Vec<Comment>>> {
        let mut transaction = self.pool.begin().await?;

        if !Self::post_visible_to(&mut transaction, post, viewer).await? {
            return Ok(None);
        }

        let records = query_as::<_, CommentRecord>(select_comments!("WHERE c.post_snowflake = $1"))
            .bind(post.to_db())
            .fetch_all(&mut *transaction)
            .await?;
        transaction.commit().await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Some(comments))
    }

    async fn update_comment(
        &self,
        comment: Id<CommentMarker>,
        content: &CommentBody,
        now: OffsetDateTime,
    ) -> Result<Option<Comment>> {
        let updated = query(
            "UPDATE posts.comments SET content = $2, updated_at = $3 WHERE comment_snowflake = $1",
        )
        .bind(comment.to_db())
        .bind(content.get())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_comment(comment).await
    }

    async fn delete_comment(&self, comment: Id<CommentMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM posts.comments WHERE comment_snowflake = $1")
            .bind(comment.to_db())
            .execute(&self.pool)
            .await?;

        Ok(deleted.rows_affected() > 0)
    }

    async fn change_bookmark(
        &self,
        user: Id<UserMarker>,
        post: Id<PostMarker>,
        change: MembershipChange,
        now: OffsetDateTime,
        cap: NonZeroUsize,
    ) -> Result<Option<BookmarkState>> {
        let mut transaction = self.pool.begin().await?;

        if !Self::lock_user(&mut transaction, user).await?
            || !Self::post_visible_to(&mut transaction, post, Some(user)).await?
        {
            return Ok(None);
        }

        let exists = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM users.bookmarks WHERE user_snowflake = $1 AND post_snowflake = $2
            )
            ",
        )
        .bind(user.to_db())
        .bind(post.to_db())
        .fetch_one(&mut *transaction)
        .await?;

        let bookmarked = change.resolve(exists);
        if bookmarked && !exists {
            query(
                "
                INSERT INTO users.bookmarks (user_snowflake, post_snowflake, created_at)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(user.to_db())
            .bind(post.to_db())
            .bind(now)
            .execute(&mut *transaction)
            .await?;
            Self::prune(
                &mut transaction,
                "
                DELETE FROM users.bookmarks WHERE user_snowflake = $1 AND post_snowflake NOT IN (
                    SELECT post_snowflake FROM users.bookmarks WHERE user_snowflake = $1
                    ORDER BY created_at DESC, post_snowflake DESC
                    LIMIT $2
                )
                ",
                user,
                cap,
            )
            .await?;
        } else if !bookmarked && exists {
            query("DELETE FROM users.bookmarks WHERE user_snowflake = $1 AND post_snowflake = $2")
                .bind(user.to_db())
                .bind(post.to_db())
                .execute(&mut *transaction)
                .await?;
        }

        let bookmarks_count = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users.bookmarks WHERE user_snowflake = $1",
        )
        .bind(user.to_db())
        .fetch_one(&mut *transaction)
        .await?;
        transaction.commit().await?;

        Ok(Some(BookmarkState {
            bookmarked,
            bookmarks_count: count(bookmarks_count)?,
        }))
    }

    async fn fetch_bookmarks(&self, user: Id<UserMarker>) -> Result<Vec<Bookmark>> {
        let records = query_as::<_, BookmarkRecord>(
            "
            SELECT post_snowflake, created_at FROM users.bookmarks
            WHERE user_snowflake = $1
            ORDER BY created_at DESC, post_snowflake DESC
            ",
        )
        .bind(user.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Bookmark::from).collect())
    }

    async fn fetch_history(&self, user: Id<UserMarker>) -> Result<Vec<HistoryEntry>> {
        let records = query_as::<_, HistoryRecord>(
            "
            SELECT post_snowflake, title, viewed_at FROM users.reading_history
            WHERE user_snowflake = $1
            ORDER BY viewed_at DESC, post_snowflake DESC
            ",
        )
        .bind(user.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(HistoryEntry::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn clear_history(&self, user: Id<UserMarker>) -> Result<()> {
        query("DELETE FROM users.reading_history WHERE user_snowflake = $1")
            .bind(user.to_db())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
