use crate::client::{DbClient, DbError, Result};
use inkwell_common::model::{
    Id,
    user::{Bio, User, UserMarker, UserSummary},
};
use tracing::debug;

impl DbClient {
    pub async fn profile(&self, user: Id<UserMarker>) -> Result<User> {
        self.store
            .fetch_user(user)
            .await?
            .ok_or(DbError::UserNotFound(user))
    }

    /// Users whose name or email contains `query`, ignoring case. Never includes `actor`.
    pub async fn search_users(
        &self,
        actor: Id<UserMarker>,
        query: &str,
    ) -> Result<Vec<UserSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.store.search_users(query, actor).await
    }

    pub async fn update_bio(&self, actor: Id<UserMarker>, bio: &Bio) -> Result<User> {
        let user = self
            .store
            .update_bio(actor, bio)
            .await?
            .ok_or(DbError::UserNotFound(actor))?;
        debug!(user = %actor, "Updated bio");

        Ok(user)
    }

    pub async fn followers(&self, user: Id<UserMarker>) -> Result<Vec<UserSummary>> {
        let user = self.profile(user).await?;
        self.store.fetch_user_summaries(&user.followers).await
    }

    pub async fn following(&self, user: Id<UserMarker>) -> Result<Vec<UserSummary>> {
        let user = self.profile(user).await?;
        self.store.fetch_user_summaries(&user.following).await
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, DbError, test_support::sign_up};
    use inkwell_common::model::{Id, user::Bio};

    #[tokio::test]
    async fn search_matches_name_or_email_and_skips_the_caller() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let adam = sign_up(&client, "adam").await;
        let bob = sign_up(&client, "bob").await;

        let by_name: Vec<_> = client
            .search_users(bob, "ADA")
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.id)
            .collect();
        assert_eq!(by_name, [ada, adam]);

        let by_email = client.search_users(ada, "example.ORG").await.unwrap();
        assert!(by_email.iter().all(|user| user.id != ada));
        assert_eq!(by_email.len(), 2);

        assert!(client.search_users(ada, "   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn connections_list_summaries() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        client.toggle_follow(ada, bob).await.unwrap();

        let followers = client.followers(bob).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].name.get(), "ada");
        assert_eq!(client.following(ada).await.unwrap()[0].id, bob);
        assert!(client.following(bob).await.unwrap().is_empty());

        assert!(matches!(
            client.followers(Id::from(404_u64)).await,
            Err(DbError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn bio_updates_show_in_profile() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;

        let bio = Bio::new("  Counting machines  ").unwrap();
        let updated = client.update_bio(ada, &bio).await.unwrap();
        assert_eq!(updated.bio.get(), "Counting machines");
        assert_eq!(client.profile(ada).await.unwrap().bio, bio);
    }
}
