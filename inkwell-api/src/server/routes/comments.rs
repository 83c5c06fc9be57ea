use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json, Message},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::{
    Id,
    comment::{Comment, CommentContent, CommentMarker},
    post::PostMarker,
    social::{LikeState, LikeTarget},
};
use inkwell_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_post_comments)
        .typed_post(add_comment)
        .typed_put(update_comment)
        .typed_delete(delete_comment)
        .typed_put(toggle_comment_like)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/post/{post_id}", rejection(ServerError))]
struct PostCommentsPath {
    post_id: Id<PostMarker>,
}

async fn get_post_comments(
    PostCommentsPath { post_id }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Vec<Comment>>> {
    let comments = db
        .comments_for_post(post_id, viewer.map(AuthenticatedUser::user_id))
        .await?;

    Ok(Json(comments))
}

async fn add_comment(
    PostCommentsPath { post_id }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(comment): Json<CommentContent>,
) -> Result<Created<Comment>> {
    let comment = db
        .add_comment(user.user_id(), post_id, comment.content)
        .await?;

    Ok(Created(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/{id}", rejection(ServerError))]
struct CommentPath {
    id: Id<CommentMarker>,
}

async fn update_comment(
    CommentPath { id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(comment): Json<CommentContent>,
) -> Result<Json<Comment>> {
    let comment = db
        .update_comment(user.user_id(), id, &comment.content)
        .await?;

    Ok(Json(comment))
}

async fn delete_comment(
    CommentPath { id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Message>> {
    db.delete_comment(user.user_id(), id).await?;

    Ok(Message::new("Comment deleted"))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/{id}/like", rejection(ServerError))]
struct CommentLikePath {
    id: Id<CommentMarker>,
}

async fn toggle_comment_like(
    CommentLikePath { id }: CommentLikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeState>> {
    let state = db
        .toggle_like(user.user_id(), LikeTarget::Comment(id))
        .await?;

    Ok(Json(state))
}
