use crate::{
    client::{DbClient, Result},
    store::PostQuery,
};
use inkwell_common::model::{Id, post::Post, user::UserMarker};

impl DbClient {
    /// Published posts by everyone `actor` follows, newest first.
    pub async fn following_feed(&self, actor: Id<UserMarker>) -> Result<Vec<Post>> {
        let actor = self.profile(actor).await?;
        if actor.following.is_empty() {
            return Ok(Vec::new());
        }

        self.store
            .fetch_posts(&PostQuery::PublishedByAuthors(actor.following))
            .await
    }
}
