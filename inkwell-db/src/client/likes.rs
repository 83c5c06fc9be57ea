use crate::client::{DbClient, DbError, Result};
use inkwell_common::model::{
    Id,
    social::{LikeState, LikeTarget, MembershipChange},
    user::UserMarker,
};
use tracing::debug;

impl DbClient {
    pub async fn toggle_like(&self, actor: Id<UserMarker>, target: LikeTarget) -> Result<LikeState> {
        self.change_like(actor, target, MembershipChange::Toggle)
            .await
    }

    pub async fn set_like(
        &self,
        actor: Id<UserMarker>,
        target: LikeTarget,
        like: bool,
    ) -> Result<LikeState> {
        self.change_like(actor, target, MembershipChange::explicit(like))
            .await
    }

    async fn change_like(
        &self,
        actor: Id<UserMarker>,
        target: LikeTarget,
        change: MembershipChange,
    ) -> Result<LikeState> {
        let state = self
            .store
            .change_like(actor, target, change)
            .await?
            .ok_or_else(|| DbError::target_not_found(target))?;
        debug!(%actor, %target, ?change, liked = state.liked, "Changed like");

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{
        DbClient, DbError,
        test_support::{publish, sign_up},
    };
    use inkwell_common::model::{
        Id,
        comment::CommentBody,
        social::LikeTarget,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn like_flips_count_up_then_down() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let post = publish(&client, ada, "Engines").await;
        let target = LikeTarget::Post(post.id);

        let liked = client.toggle_like(bob, target).await.unwrap();
        assert!(liked.liked);
        assert_eq!(liked.likes_count, 1);

        let unliked = client.toggle_like(bob, target).await.unwrap();
        assert!(!unliked.liked);
        assert_eq!(unliked.likes_count, 0);
    }

    #[tokio::test]
    async fn likes_by_different_users_commute() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let post = publish(&client, ada, "Engines").await;
        let comment = client
            .add_comment(ada, post.id, CommentBody::new("First!").unwrap())
            .await
            .unwrap();
        let target = LikeTarget::Comment(comment.id);

        client.toggle_like(bob, target).await.unwrap();
        let state = client.toggle_like(ada, target).await.unwrap();
        assert_eq!(state.likes_count, 2);

        let stored = client.comments_for_post(post.id, None).await.unwrap();
        assert!(stored[0].likes.contains(&ada) && stored[0].likes.contains(&bob));
    }

    #[tokio::test]
    async fn explicit_likes_are_idempotent() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let post = publish(&client, ada, "Engines").await;
        let target = LikeTarget::Post(post.id);

        for _ in 0..3 {
            assert_eq!(client.set_like(ada, target, true).await.unwrap().likes_count, 1);
        }
        assert_eq!(client.set_like(ada, target, false).await.unwrap().likes_count, 0);
    }

    #[tokio::test]
    async fn liking_missing_targets_is_not_found() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;

        assert!(matches!(
            client.toggle_like(ada, LikeTarget::Post(Id::from(7_u64))).await,
            Err(DbError::PostNotFound(_))
        ));
        assert!(matches!(
            client.toggle_like(ada, LikeTarget::Comment(Id::from(7_u64))).await,
            Err(DbError::CommentNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_never_duplicate_a_like() {
        let client = Arc::new(DbClient::in_memory());
        let ada = sign_up(&client, "ada").await;
        let post = publish(&client, ada, "Engines").await;
        let target = LikeTarget::Post(post.id);

        let tasks: Vec<_> = (0..15)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.toggle_like(ada, target).await })
            })
            .collect();

        let mut liked_results = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().liked {
                liked_results += 1;
            }
        }

        // Serialized flips alternate, so an odd count leaves the like in place.
        assert_eq!(liked_results, 8);
        let stored = client.fetch_post(post.id).await.unwrap();
        assert_eq!(stored.likes.len(), 1);
        assert!(stored.likes.contains(&ada));
    }
}
