use crate::client::{DbClient, DbError, Result};
use inkwell_common::model::{
    Id,
    post::PostMarker,
    reading::{Bookmark, BookmarkState, HistoryEntry},
    social::MembershipChange,
    user::UserMarker,
};
use time::OffsetDateTime;
use tracing::debug;

impl DbClient {
    pub async fn toggle_bookmark(
        &self,
        actor: Id<UserMarker>,
        post: Id<PostMarker>,
    ) -> Result<BookmarkState> {
        self.change_bookmark(actor, post, MembershipChange::Toggle)
            .await
    }

    pub async fn set_bookmark(
        &self,
        actor: Id<UserMarker>,
        post: Id<PostMarker>,
        bookmark: bool,
    ) -> Result<BookmarkState> {
        self.change_bookmark(actor, post, MembershipChange::explicit(bookmark))
            .await
    }

    async fn change_bookmark(
        &self,
        actor: Id<UserMarker>,
        post: Id<PostMarker>,
        change: MembershipChange,
    ) -> Result<BookmarkState> {
        let state = self
            .store
            .change_bookmark(
                actor,
                post,
                change,
                OffsetDateTime::now_utc(),
                self.config.reading.bookmark_cap,
            )
            .await?
            .ok_or(DbError::PostNotFound(post))?;
        debug!(%actor, %post, ?change, bookmarked = state.bookmarked, "Changed bookmark");

        Ok(state)
    }

    /// The reading list, newest first.
    pub async fn bookmarks(&self, actor: Id<UserMarker>) -> Result<Vec<Bookmark>> {
        self.store.fetch_bookmarks(actor).await
    }

    /// Most recently read first.
    pub async fn history(&self, actor: Id<UserMarker>) -> Result<Vec<HistoryEntry>> {
        self.store.fetch_history(actor).await
    }

    pub async fn clear_history(&self, actor: Id<UserMarker>) -> Result<()> {
        self.store.clear_history(actor).await?;
        debug!(%actor, "Cleared reading history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        client::{
            ClientConfig, DbClient, DbError,
            test_support::{publish, sign_up},
        },
        store::MemoryStore,
    };
    use inkwell_common::{
        model::{Id, reading::ReadingLimits},
        snowflake::{ProcessId, WorkerId},
    };
    use std::{num::NonZeroUsize, sync::Arc};

    fn small_client() -> DbClient {
        DbClient::new(
            Arc::new(MemoryStore::new()),
            WorkerId::new_unchecked(1),
            ProcessId::new_unchecked(1),
            ClientConfig {
                reading: ReadingLimits {
                    history_cap: NonZeroUsize::new(3).unwrap(),
                    bookmark_cap: NonZeroUsize::new(2).unwrap(),
                },
                ..ClientConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn bookmarks_toggle_and_stay_capped() {
        let client = small_client();
        let ada = sign_up(&client, "ada").await;
        let first = publish(&client, ada, "First").await;
        let second = publish(&client, ada, "Second").await;
        let third = publish(&client, ada, "Third").await;

        let state = client.toggle_bookmark(ada, first.id).await.unwrap();
        assert!(state.bookmarked);
        let state = client.toggle_bookmark(ada, first.id).await.unwrap();
        assert!(!state.bookmarked);
        assert_eq!(state.bookmarks_count, 0);

        for post in [&first, &second, &third] {
            client.set_bookmark(ada, post.id, true).await.unwrap();
        }
        client.set_bookmark(ada, third.id, true).await.unwrap();

        let listed: Vec<_> = client
            .bookmarks(ada)
            .await
            .unwrap()
            .into_iter()
            .map(|bookmark| bookmark.post_id)
            .collect();
        assert_eq!(listed, [third.id, second.id]);

        assert!(matches!(
            client.toggle_bookmark(ada, Id::from(5_u64)).await,
            Err(DbError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn history_is_deduplicated_and_capped() {
        let client = small_client();
        let ada = sign_up(&client, "ada").await;
        let mut posts = Vec::new();
        for title in ["One", "Two", "Three", "Four"] {
            posts.push(publish(&client, ada, title).await);
        }

        for post in &posts {
            client.view_post(post.id, Some(ada)).await.unwrap();
        }
        client.view_post(posts[2].id, Some(ada)).await.unwrap();
        client.view_post(posts[0].id, None).await.unwrap();

        let titles: Vec<_> = client
            .history(ada)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.title.into_inner())
            .collect();
        assert_eq!(titles, ["Three", "Four", "Two"]);

        client.clear_history(ada).await.unwrap();
        assert!(client.history(ada).await.unwrap().is_empty());
    }
}
