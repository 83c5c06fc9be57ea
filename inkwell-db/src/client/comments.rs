use crate::{
    client::{DbClient, DbError, Result},
    store::NewComment,
};
use inkwell_common::model::{
    Id,
    comment::{Comment, CommentBody, CommentMarker},
    post::PostMarker,
    user::UserMarker,
};
use time::OffsetDateTime;
use tracing::debug;

impl DbClient {
    pub async fn add_comment(
        &self,
        actor: Id<UserMarker>,
        post: Id<PostMarker>,
        content: CommentBody,
    ) -> Result<Comment> {
        let comment = self
            .store
            .insert_comment(NewComment {
                id: self.next_id()?,
                post_id: post,
                author: actor,
                content,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?
            .ok_or(DbError::PostNotFound(post))?;
        debug!(comment = %comment.id, %post, %actor, "Added comment");

        Ok(comment)
    }

    /// Newest first. The comments of a draft are only listed for its author.
    pub async fn comments_for_post(
        &self,
        post: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Vec<Comment>> {
        self.store
            .fetch_comments(post, viewer)
            .await?
            .ok_or(DbError::PostNotFound(post))
    }

    pub async fn update_comment(
        &self,
        actor: Id<UserMarker>,
        comment: Id<CommentMarker>,
        content: &CommentBody,
    ) -> Result<Comment> {
        self.ensure_comment_author(actor, comment).await?;

        let updated = self
            .store
            .update_comment(comment, content, OffsetDateTime::now_utc())
            .await?
            .ok_or(DbError::CommentNotFound(comment))?;
        debug!(%comment, %actor, "Updated comment");

        Ok(updated)
    }

    pub async fn delete_comment(
        &self,
        actor: Id<UserMarker>,
        comment: Id<CommentMarker>,
    ) -> Result<()> {
        self.ensure_comment_author(actor, comment).await?;

        if !self.store.delete_comment(comment).await? {
            return Err(DbError::CommentNotFound(comment));
        }
        debug!(%comment, %actor, "Deleted comment");

        Ok(())
    }

    async fn ensure_comment_author(
        &self,
        actor: Id<UserMarker>,
        comment: Id<CommentMarker>,
    ) -> Result<()> {
        let comment = self
            .store
            .fetch_comment(comment)
            .await?
            .ok_or(DbError::CommentNotFound(comment))?;

        if comment.is_authored_by(actor) {
            Ok(())
        } else {
            Err(DbError::NotAuthor("comment"))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{
        DbClient, DbError,
        test_support::{publish, sign_up},
    };
    use inkwell_common::model::{Id, comment::CommentBody};

    fn body(text: &str) -> CommentBody {
        CommentBody::new(text).unwrap()
    }

    #[tokio::test]
    async fn comments_list_newest_first() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let post = publish(&client, ada, "Talk").await;

        let first = client.add_comment(ada, post.id, body("one")).await.unwrap();
        let second = client.add_comment(ada, post.id, body("two")).await.unwrap();

        let listed: Vec<_> = client
            .comments_for_post(post.id, None)
            .await
            .unwrap()
            .into_iter()
            .map(|comment| comment.id)
            .collect();
        assert_eq!(listed, [second.id, first.id]);
        assert_eq!(second.author.name.get(), "ada");
    }

    #[tokio::test]
    async fn commenting_on_a_missing_post_is_not_found() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;

        assert!(matches!(
            client.add_comment(ada, Id::from(9_u64), body("hello")).await,
            Err(DbError::PostNotFound(_))
        ));
        assert!(matches!(
            client.comments_for_post(Id::from(9_u64), None).await,
            Err(DbError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_the_comment_author_edits_or_deletes() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let post = publish(&client, ada, "Talk").await;
        let comment = client.add_comment(bob, post.id, body("hi")).await.unwrap();

        // Owning the post does not grant control over its comments.
        assert!(matches!(
            client.update_comment(ada, comment.id, &body("edited")).await,
            Err(DbError::NotAuthor("comment"))
        ));
        assert!(matches!(
            client.delete_comment(ada, comment.id).await,
            Err(DbError::NotAuthor("comment"))
        ));

        let edited = client
            .update_comment(bob, comment.id, &body("edited"))
            .await
            .unwrap();
        assert_eq!(edited.content.get(), "edited");

        client.delete_comment(bob, comment.id).await.unwrap();
        assert!(client.comments_for_post(post.id, None).await.unwrap().is_empty());
    }
}
