use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Json, Message},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::{
    Id,
    post::PostMarker,
    reading::{Bookmark, BookmarkState, HistoryEntry},
};
use inkwell_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_put(toggle_bookmark)
        .typed_get(get_reading_list)
        .typed_get(get_reading_history)
        .typed_delete(clear_reading_history)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/bookmark", rejection(ServerError))]
struct BookmarkPath {
    id: Id<PostMarker>,
}

async fn toggle_bookmark(
    BookmarkPath { id }: BookmarkPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<BookmarkState>> {
    Ok(Json(db.toggle_bookmark(user.user_id(), id).await?))
}

#[derive(TypedPath)]
#[typed_path("/reading-list")]
struct ReadingListPath;

async fn get_reading_list(
    _: ReadingListPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Bookmark>>> {
    Ok(Json(db.bookmarks(user.user_id()).await?))
}

#[derive(TypedPath)]
#[typed_path("/reading-history")]
struct ReadingHistoryPath;

async fn get_reading_history(
    _: ReadingHistoryPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<HistoryEntry>>> {
    Ok(Json(db.history(user.user_id()).await?))
}

async fn clear_reading_history(
    _: ReadingHistoryPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Message>> {
    db.clear_history(user.user_id()).await?;

    Ok(Message::new("Reading history cleared"))
}
