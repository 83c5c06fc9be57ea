use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json, Message},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::{
    Id,
    post::{CreatePost, Post, PostMarker, PostPatch},
    social::{LikeState, LikeTarget},
    user::UserMarker,
};
use inkwell_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_published_posts)
        .typed_post(create_post)
        .typed_get(get_my_posts)
        .typed_get(get_following_feed)
        .typed_get(get_user_posts)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
        .typed_put(toggle_post_like)
}

#[derive(TypedPath)]
#[typed_path("/posts")]
struct PostsPath;

async fn get_published_posts(
    _: PostsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Post>>> {
    Ok(Json(db.published_posts().await?))
}

async fn create_post(
    _: PostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<CreatePost>,
) -> Result<Created<Post>> {
    let post = db.create_post(user.user_id(), post).await?;

    Ok(Created(post))
}

#[derive(TypedPath)]
#[typed_path("/posts/my-posts")]
struct MyPostsPath;

async fn get_my_posts(
    _: MyPostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Post>>> {
    Ok(Json(db.posts_by_author(user.user_id(), true).await?))
}

#[derive(TypedPath)]
#[typed_path("/posts/following")]
struct FollowingFeedPath;

async fn get_following_feed(
    _: FollowingFeedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Post>>> {
    Ok(Json(db.following_feed(user.user_id()).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/user/{user_id}", rejection(ServerError))]
struct UserPostsPath {
    user_id: Id<UserMarker>,
}

async fn get_user_posts(
    UserPostsPath { user_id }: UserPostsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Post>>> {
    db.profile(user_id).await?;

    Ok(Json(db.posts_by_author(user_id, false).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Post>> {
    let post = db
        .view_post(id, viewer.map(AuthenticatedUser::user_id))
        .await?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>> {
    let post = db.update_post(user.user_id(), id, &patch).await?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Message>> {
    db.delete_post(user.user_id(), id).await?;

    Ok(Message::new("Post deleted successfully"))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct PostLikePath {
    id: Id<PostMarker>,
}

async fn toggle_post_like(
    PostLikePath { id }: PostLikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeState>> {
    let state = db.toggle_like(user.user_id(), LikeTarget::Post(id)).await?;

    Ok(Json(state))
}
