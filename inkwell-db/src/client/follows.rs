use crate::client::{DbClient, DbError, Result};
use inkwell_common::model::{
    Id,
    social::{FollowState, MembershipChange},
    user::UserMarker,
};
use tracing::debug;

impl DbClient {
    /// Follows `target` if `actor` does not follow them yet, unfollows otherwise.
    pub async fn toggle_follow(
        &self,
        actor: Id<UserMarker>,
        target: Id<UserMarker>,
    ) -> Result<FollowState> {
        self.change_follow(actor, target, MembershipChange::Toggle)
            .await
    }

    /// Makes `actor` follow or unfollow `target` regardless of the current state.
    pub async fn set_follow(
        &self,
        actor: Id<UserMarker>,
        target: Id<UserMarker>,
        follow: bool,
    ) -> Result<FollowState> {
        self.change_follow(actor, target, MembershipChange::explicit(follow))
            .await
    }

    async fn change_follow(
        &self,
        actor: Id<UserMarker>,
        target: Id<UserMarker>,
        change: MembershipChange,
    ) -> Result<FollowState> {
        if actor == target {
            return Err(DbError::SelfFollow);
        }

        let Some(state) = self.store.change_follow(actor, target, change).await? else {
            let missing = if self.store.fetch_user(target).await?.is_none() {
                target
            } else {
                actor
            };
            return Err(DbError::UserNotFound(missing));
        };

        debug!(%actor, %target, ?change, followed = state.followed, "Changed follow");
        Ok(state)
    }
}
