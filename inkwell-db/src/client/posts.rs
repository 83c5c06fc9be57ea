use crate::{
    client::{DbClient, DbError, Result},
    store::{NewPost, PostQuery},
};
use inkwell_common::model::{
    Id,
    post::{CreatePost, Post, PostMarker, PostPatch},
    user::UserMarker,
};
use time::OffsetDateTime;
use tracing::debug;

impl DbClient {
    pub async fn create_post(&self, author: Id<UserMarker>, post: CreatePost) -> Result<Post> {
        let post = self
            .store
            .insert_post(NewPost {
                id: self.next_id()?,
                author,
                title: post.title,
                content: post.content,
                excerpt: post.excerpt,
                cover_image: post.cover_image,
                tags: post.tags,
                published: post.published,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?
            .ok_or(DbError::UserNotFound(author))?;
        debug!(post = %post.id, %author, published = post.published, "Created post");

        Ok(post)
    }

    /// Reads a post without counting a view.
    pub async fn fetch_post(&self, post: Id<PostMarker>) -> Result<Post> {
        self.store
            .fetch_post(post)
            .await?
            .ok_or(DbError::PostNotFound(post))
    }

    /// Reads a post on behalf of `viewer` and counts the view.
    ///
    /// Drafts are not found for anyone but their author. An authenticated
    /// viewer also gets the post recorded in their reading history.
    pub async fn view_post(
        &self,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Post> {
        self.store
            .view_post(
                post,
                viewer,
                OffsetDateTime::now_utc(),
                self.config.reading.history_cap,
            )
            .await?
            .ok_or(DbError::PostNotFound(post))
    }

    pub async fn update_post(
        &self,
        actor: Id<UserMarker>,
        post: Id<PostMarker>,
        patch: &PostPatch,
    ) -> Result<Post> {
        self.ensure_post_author(actor, post).await?;

        let updated = self
            .store
            .update_post(post, patch, OffsetDateTime::now_utc())
            .await?
            .ok_or(DbError::PostNotFound(post))?;
        debug!(%post, %actor, "Updated post");

        Ok(updated)
    }

    pub async fn delete_post(&self, actor: Id<UserMarker>, post: Id<PostMarker>) -> Result<()> {
        self.ensure_post_author(actor, post).await?;

        if !self.store.delete_post(post).await? {
            return Err(DbError::PostNotFound(post));
        }
        debug!(%post, %actor, "Deleted post");

        Ok(())
    }

    /// Every published post, newest first.
    pub async fn published_posts(&self) -> Result<Vec<Post>> {
        self.store.fetch_posts(&PostQuery::Published).await
    }

    pub async fn posts_by_author(
        &self,
        author: Id<UserMarker>,
        include_drafts: bool,
    ) -> Result<Vec<Post>> {
        self.store
            .fetch_posts(&PostQuery::ByAuthor {
                author,
                include_drafts,
            })
            .await
    }

    async fn ensure_post_author(&self, actor: Id<UserMarker>, id: Id<PostMarker>) -> Result<()> {
        let post = self.fetch_post(id).await?;
        if !post.is_visible_to(Some(actor)) {
            Err(DbError::PostNotFound(id))
        } else if post.is_authored_by(actor) {
            Ok(())
        } else {
            Err(DbError::NotAuthor("post"))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{
        DbClient, DbError,
        test_support::{draft, publish, sign_up},
    };
    use inkwell_common::model::{
        Id,
        comment::CommentBody,
        post::{Post, PostMarker, PostPatch, PostTitle, Tags},
        social::LikeTarget,
    };

    fn ids(posts: Vec<Post>) -> Vec<Id<PostMarker>> {
        posts.into_iter().map(|post| post.id).collect()
    }

    #[tokio::test]
    async fn every_fetch_counts_a_view() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let post = publish(&client, ada, "Views").await;

        for _ in 0..5 {
            client.view_post(post.id, None).await.unwrap();
        }
        assert_eq!(client.fetch_post(post.id).await.unwrap().views, 5);
    }

    #[tokio::test]
    async fn drafts_are_only_visible_to_their_author() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let post = client.create_post(ada, draft("Secret", false)).await.unwrap();

        assert!(matches!(
            client.view_post(post.id, Some(bob)).await,
            Err(DbError::PostNotFound(_))
        ));
        assert!(matches!(
            client.view_post(post.id, None).await,
            Err(DbError::PostNotFound(_))
        ));
        assert_eq!(client.fetch_post(post.id).await.unwrap().views, 0);

        assert_eq!(client.view_post(post.id, Some(ada)).await.unwrap().views, 1);
    }

    #[tokio::test]
    async fn drafts_reject_every_interaction_from_other_users() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let post = client.create_post(ada, draft("Secret", false)).await.unwrap();
        let comment = client
            .add_comment(ada, post.id, CommentBody::new("Note to self").unwrap())
            .await
            .unwrap();

        assert!(matches!(
            client.toggle_like(bob, LikeTarget::Post(post.id)).await,
            Err(DbError::PostNotFound(_))
        ));
        assert!(matches!(
            client.toggle_like(bob, LikeTarget::Comment(comment.id)).await,
            Err(DbError::CommentNotFound(_))
        ));
        assert!(matches!(
            client
                .add_comment(bob, post.id, CommentBody::new("Peek").unwrap())
                .await,
            Err(DbError::PostNotFound(_))
        ));
        for viewer in [None, Some(bob)] {
            assert!(matches!(
                client.comments_for_post(post.id, viewer).await,
                Err(DbError::PostNotFound(_))
            ));
        }
        assert!(matches!(
            client.toggle_bookmark(bob, post.id).await,
            Err(DbError::PostNotFound(_))
        ));
        assert!(matches!(
            client.delete_post(bob, post.id).await,
            Err(DbError::PostNotFound(_))
        ));

        let stored = client.fetch_post(post.id).await.unwrap();
        assert!(stored.likes.is_empty());
        assert!(client.bookmarks(bob).await.unwrap().is_empty());
        let comments = client.comments_for_post(post.id, Some(ada)).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].likes.is_empty());

        assert!(client.toggle_like(ada, LikeTarget::Post(post.id)).await.unwrap().liked);
        assert!(client.toggle_bookmark(ada, post.id).await.unwrap().bookmarked);
    }

    #[tokio::test]
    async fn viewing_records_history_in_the_same_change() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let hidden = client.create_post(ada, draft("Hidden", false)).await.unwrap();
        let shown = publish(&client, ada, "Shown").await;

        assert!(client.view_post(hidden.id, Some(bob)).await.is_err());
        client.view_post(shown.id, Some(bob)).await.unwrap();

        let history = client.history(bob).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].post_id, shown.id);
        assert_eq!(client.fetch_post(hidden.id).await.unwrap().views, 0);
        assert_eq!(client.fetch_post(shown.id).await.unwrap().views, 1);
    }

    #[tokio::test]
    async fn only_the_author_edits_or_deletes() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let post = publish(&client, ada, "Mine").await;

        let patch = PostPatch {
            title: Some(PostTitle::new("Stolen").unwrap()),
            ..PostPatch::default()
        };
        assert!(matches!(
            client.update_post(bob, post.id, &patch).await,
            Err(DbError::NotAuthor("post"))
        ));
        assert!(matches!(
            client.delete_post(bob, post.id).await,
            Err(DbError::NotAuthor("post"))
        ));
        assert_eq!(client.fetch_post(post.id).await.unwrap(), post);

        let updated = client.update_post(ada, post.id, &patch).await.unwrap();
        assert_eq!(updated.title.get(), "Stolen");
        assert_eq!(updated.content, post.content);
        assert!(updated.updated_at >= post.updated_at);
    }

    #[tokio::test]
    async fn patches_only_touch_present_fields() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let post = publish(&client, ada, "Tagged").await;

        let patch = PostPatch {
            tags: Some(Tags::new(["rust", "web"]).unwrap()),
            published: Some(false),
            ..PostPatch::default()
        };
        let updated = client.update_post(ada, post.id, &patch).await.unwrap();
        assert_eq!(updated.tags.to_strings(), ["rust", "web"]);
        assert!(!updated.published);
        assert_eq!(updated.title, post.title);
    }

    #[tokio::test]
    async fn deleting_cascades_to_comments_and_bookmarks() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let post = publish(&client, ada, "Short lived").await;
        let comment = client
            .add_comment(bob, post.id, CommentBody::new("Nice").unwrap())
            .await
            .unwrap();
        client.toggle_bookmark(bob, post.id).await.unwrap();

        client.delete_post(ada, post.id).await.unwrap();

        assert!(matches!(
            client.fetch_post(post.id).await,
            Err(DbError::PostNotFound(_))
        ));
        assert!(matches!(
            client.toggle_like(bob, LikeTarget::Comment(comment.id)).await,
            Err(DbError::CommentNotFound(_))
        ));
        assert!(client.bookmarks(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lists_are_newest_first_and_hide_drafts() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let first = publish(&client, ada, "First").await;
        let hidden = client.create_post(ada, draft("Hidden", false)).await.unwrap();
        let second = publish(&client, ada, "Second").await;

        assert_eq!(ids(client.published_posts().await.unwrap()), [second.id, first.id]);
        assert_eq!(
            ids(client.posts_by_author(ada, false).await.unwrap()),
            [second.id, first.id]
        );
        assert_eq!(
            ids(client.posts_by_author(ada, true).await.unwrap()),
            [second.id, hidden.id, first.id]
        );
    }
}
