use crate::{
    client::Result,
    store::{NewComment, NewPost, NewUser, PostQuery, Store},
};
use async_trait::async_trait;
use inkwell_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication, Credentials, PasswordDigest},
    comment::{self, Comment, CommentBody, CommentMarker},
    post::{self, Post, PostMarker, PostPatch},
    reading::{Bookmark, BookmarkState, HistoryEntry, push_front_capped},
    social::{FollowState, LikeState, LikeTarget, MembershipChange},
    user::{Bio, Email, User, UserMarker, UserSummary},
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;

#[derive(Debug)]
struct StoredUser {
    user: User,
    password_digest: PasswordDigest,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Id<UserMarker>, StoredUser>,
    users_by_email: HashMap<Email, Id<UserMarker>>,
    authentications: HashMap<AuthTokenHash, Authentication>,
    posts: BTreeMap<Id<PostMarker>, Post>,
    comments: BTreeMap<Id<CommentMarker>, Comment>,
    bookmarks: HashMap<Id<UserMarker>, Vec<Bookmark>>,
    history: HashMap<Id<UserMarker>, Vec<HistoryEntry>>,
}

impl Tables {
    fn summary(&self, user: Id<UserMarker>) -> Option<UserSummary> {
        self.users.get(&user).map(|stored| stored.user.summary())
    }

    fn post_visible_to(&self, post: Id<PostMarker>, viewer: Option<Id<UserMarker>>) -> bool {
        self.posts
            .get(&post)
            .is_some_and(|post| post.is_visible_to(viewer))
    }

    fn posts_where(&self, keep: impl Fn(&Post) -> bool) -> Vec<Post> {
        let mut posts: Vec<Post> = self.posts.values().filter(|post| keep(post)).cloned().collect();
        post::sort_newest_first(&mut posts);
        posts
    }
}

/// Keeps everything in process memory behind one lock.
///
/// Every store call holds the lock for its whole read-modify-write and never
/// awaits while holding it, which makes each call atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave a half-applied change
        // behind: every mutation below completes before any fallible call.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<Option<User>> {
        let mut tables = self.tables();
        if tables.users_by_email.contains_key(&new_user.email) {
            return Ok(None);
        }

        let user = User {
            id: new_user.id,
            name: new_user.name,
            email: new_user.email,
            bio: Bio::empty(),
            followers: BTreeSet::new(),
            following: BTreeSet::new(),
            created_at: new_user.created_at,
        };
        tables.users_by_email.insert(user.email.clone(), user.id);
        tables.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_digest: new_user.password_digest,
            },
        );

        Ok(Some(user))
    }

    async fn fetch_user(&self, user: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.tables().users.get(&user).map(|stored| stored.user.clone()))
    }

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<Credentials>> {
        let tables = self.tables();
        let credentials = tables
            .users_by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .map(|stored| Credentials {
                user: stored.user.id,
                password_digest: stored.password_digest.clone(),
            });

        Ok(credentials)
    }

    async fn fetch_user_summaries(
        &self,
        users: &BTreeSet<Id<UserMarker>>,
    ) -> Result<Vec<UserSummary>> {
        let tables = self.tables();
        Ok(users.iter().filter_map(|id| tables.summary(*id)).collect())
    }

    async fn search_users(
        &self,
        query: &str,
        excluding: Id<UserMarker>,
    ) -> Result<Vec<UserSummary>> {
        let needle = query.to_lowercase();
        let tables = self.tables();

        let mut matches: Vec<UserSummary> = tables
            .users
            .values()
            .map(|stored| &stored.user)
            .filter(|user| user.id != excluding)
            .filter(|user| {
                user.name.get().to_lowercase().contains(&needle)
                    || user.email.get().contains(&needle)
            })
            .map(User::summary)
            .collect();
        matches.sort_by(|a, b| (a.name.get(), a.id).cmp(&(b.name.get(), b.id)));

        Ok(matches)
    }

    async fn update_bio(&self, user: Id<UserMarker>, bio: &Bio) -> Result<Option<User>> {
        let mut tables = self.tables();
        let updated = tables.users.get_mut(&user).map(|stored| {
            stored.user.bio = bio.clone();
            stored.user.clone()
        });

        Ok(updated)
    }

    async fn change_follow(
        &self,
        actor: Id<UserMarker>,
        target: Id<UserMarker>,
        change: MembershipChange,
    ) -> Result<Option<FollowState>> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&actor) || !tables.users.contains_key(&target) {
            return Ok(None);
        }

        let followed = match tables.users.get_mut(&actor) {
            Some(stored) => change.apply(&mut stored.user.following, target),
            None => return Ok(None),
        };
        let followers_count = match tables.users.get_mut(&target) {
            Some(stored) => {
                MembershipChange::explicit(followed).apply(&mut stored.user.followers, actor);
                stored.user.followers.len()
            }
            None => return Ok(None),
        };

        Ok(Some(FollowState {
            followed,
            followers_count,
        }))
    }

    async fn insert_authentication(&self, authentication: &Authentication) -> Result<()> {
        let mut tables = self.tables();
        let now = authentication.created_at;
        tables
            .authentications
            .retain(|_, existing| !existing.is_expired_at(now));
        tables
            .authentications
            .insert(authentication.token_hash.clone(), authentication.clone());
        Ok(())
    }

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        Ok(self.tables().authentications.get(token_hash).cloned())
    }

    async fn insert_post(&self, new_post: NewPost) -> Result<Option<Post>> {
        let mut tables = self.tables();
        let Some(author) = tables.summary(new_post.author) else {
            return Ok(None);
        };

        let post = Post {
            id: new_post.id,
            author,
            title: new_post.title,
            content: new_post.content,
            excerpt: new_post.excerpt,
            cover_image: new_post.cover_image,
            tags: new_post.tags,
            published: new_post.published,
            views: 0,
            likes: BTreeSet::new(),
            created_at: new_post.created_at,
            updated_at: new_post.created_at,
        };
        tables.posts.insert(post.id, post.clone());

        Ok(Some(post))
    }

    async fn fetch_post(&self, post: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.tables().posts.get(&post).cloned())
    }

    async fn view_post(
        &self,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
        viewed_at: OffsetDateTime,
        history_cap: NonZeroUsize,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables();
        let Some(viewed) = tables
            .posts
            .get_mut(&post)
            .filter(|post| post.is_visible_to(viewer))
        else {
            return Ok(None);
        };
        viewed.views += 1;
        let viewed = viewed.clone();

        if let Some(viewer) = viewer.filter(|viewer| tables.users.contains_key(viewer)) {
            let entry = HistoryEntry {
                post_id: viewed.id,
                title: viewed.title.clone(),
                viewed_at,
            };
            push_front_capped(tables.history.entry(viewer).or_default(), entry, history_cap);
        }

        Ok(Some(viewed))
    }

    async fn update_post(
        &self,
        post: Id<PostMarker>,
        patch: &PostPatch,
        now: OffsetDateTime,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables();
        let updated = tables.posts.get_mut(&post).map(|post| {
            patch.apply(post, now);
            post.clone()
        });

        Ok(updated)
    }

    async fn delete_post(&self, post: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables();
        if tables.posts.remove(&post).is_none() {
            return Ok(false);
        }

        tables.comments.retain(|_, comment| comment.post_id != post);
        for bookmarks in tables.bookmarks.values_mut() {
            bookmarks.retain(|bookmark| bookmark.post_id != post);
        }

        Ok(true)
    }

    async fn fetch_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let tables = self.tables();
        let posts = match query {
            PostQuery::Published => tables.posts_where(|post| post.published),
            PostQuery::ByAuthor {
                author,
                include_drafts,
            } => tables.posts_where(|post| {
                post.is_authored_by(*author) && (post.published || *include_drafts)
            }),
            PostQuery::PublishedByAuthors(authors) => {
                tables.posts_where(|post| post.published && authors.contains(&post.author.id))
            }
        };

        Ok(posts)
    }

    async fn change_like(
        &self,
        actor: Id<UserMarker>,
        target: LikeTarget,
        change: MembershipChange,
    ) -> Result<Option<LikeState>> {
        let mut tables = self.tables();
        let parent = match target {
            LikeTarget::Post(id) => Some(id),
            LikeTarget::Comment(id) => tables.comments.get(&id).map(|comment| comment.post_id),
        };
        if !parent.is_some_and(|post| tables.post_visible_to(post, Some(actor))) {
            return Ok(None);
        }

        let likes = match target {
            LikeTarget::Post(id) => tables.posts.get_mut(&id).map(|post| &mut post.likes),
            LikeTarget::Comment(id) => tables
                .comments
                .get_mut(&id)
                .map(|comment| &mut comment.likes),
        };

        Ok(likes.map(|likes| LikeState {
            liked: change.apply(likes, actor),
            likes_count: likes.len(),
        }))
    }

    async fn insert_comment(&self, new_comment: NewComment) -> Result<Option<Comment>> {
        let mut tables = self.tables();
        if !tables.post_visible_to(new_comment.post_id, Some(new_comment.author)) {
            return Ok(None);
        }
        let Some(author) = tables.summary(new_comment.author) else {
            return Ok(None);
        };

        let comment = Comment {
            id: new_comment.id,
            post_id: new_comment.post_id,
            author,
            content: new_comment.content,
            likes: BTreeSet::new(),
            created_at: new_comment.created_at,
            updated_at: new_comment.created_at,
        };
        tables.comments.insert(comment.id, comment.clone());

        Ok(Some(comment))
    }

    async fn fetch_comment(&self, comment: Id<CommentMarker>) -> Result<Option<Comment>> {
        Ok(self.tables().comments.get(&comment).cloned())
    }

    async fn fetch_comments(
        &self,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<Vec<Comment>>> {
        let tables = self.tables();
        if !tables.post_visible_to(post, viewer) {
            return Ok(None);
        }

        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|comment| comment.post_id == post)
            .cloned()
            .collect();
        comment::sort_newest_first(&mut comments);

        Ok(Some(comments))
    }

    async fn update_comment(
        &self,
        comment: Id<CommentMarker>,
        content: &CommentBody,
        now: OffsetDateTime,
    ) -> Result<Option<Comment>> {
        let mut tables = self.tables();
        let updated = tables.comments.get_mut(&comment).map(|comment| {
            comment.content = content.clone();
            comment.updated_at = now;
            comment.clone()
        });

        Ok(updated)
    }

    async fn delete_comment(&self, comment: Id<CommentMarker>) -> Result<bool> {
        Ok(self.tables().comments.remove(&comment).is_some())
    }

    async fn change_bookmark(
        &self,
        user: Id<UserMarker>,
        post: Id<PostMarker>,
        change: MembershipChange,
        now: OffsetDateTime,
        cap: NonZeroUsize,
    ) -> Result<Option<BookmarkState>> {
        let mut tables = self.tables();
        if !tables.post_visible_to(post, Some(user)) || !tables.users.contains_key(&user) {
            return Ok(None);
        }

        let bookmarks = tables.bookmarks.entry(user).or_default();
        let present = bookmarks.iter().any(|bookmark| bookmark.post_id == post);
        let bookmarked = change.resolve(present);

        if bookmarked && !present {
            let bookmark = Bookmark {
                post_id: post,
                created_at: now,
            };
            push_front_capped(bookmarks, bookmark, cap);
        } else if !bookmarked {
            bookmarks.retain(|bookmark| bookmark.post_id != post);
        }

        Ok(Some(BookmarkState {
            bookmarked,
            bookmarks_count: bookmarks.len(),
        }))
    }

    async fn fetch_bookmarks(&self, user: Id<UserMarker>) -> Result<Vec<Bookmark>> {
        Ok(self
            .tables()
            .bookmarks
            .get(&user)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_history(&self, user: Id<UserMarker>) -> Result<Vec<HistoryEntry>> {
        Ok(self.tables().history.get(&user).cloned().unwrap_or_default())
    }

    async fn clear_history(&self, user: Id<UserMarker>) -> Result<()> {
        self.tables().history.remove(&user);
        Ok(())
    }
}
