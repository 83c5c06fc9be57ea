use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Json, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::{
    Id,
    social::FollowState,
    user::{UpdateProfile, User, UserMarker, UserSummary},
};
use inkwell_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(search_users)
        .typed_put(update_profile)
        .typed_get(get_user)
        .typed_post(toggle_follow)
        .typed_get(get_followers)
        .typed_get(get_following)
}

#[derive(TypedPath)]
#[typed_path("/users/search")]
struct SearchPath;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search_users(
    _: SearchPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(SearchParams { q }): Query<SearchParams>,
) -> Result<Json<Vec<UserSummary>>> {
    Ok(Json(db.search_users(user.user_id(), &q).await?))
}

#[derive(TypedPath)]
#[typed_path("/users/profile")]
struct ProfilePath;

async fn update_profile(
    _: ProfilePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(profile): Json<UpdateProfile>,
) -> Result<Json<User>> {
    Ok(Json(db.update_bio(user.user_id(), &profile.bio).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
    _: AuthenticatedUser,
) -> Result<Json<User>> {
    Ok(Json(db.profile(id).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/follow", rejection(ServerError))]
struct FollowPath {
    id: Id<UserMarker>,
}

async fn toggle_follow(
    FollowPath { id }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<FollowState>> {
    Ok(Json(db.toggle_follow(user.user_id(), id).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/followers", rejection(ServerError))]
struct FollowersPath {
    id: Id<UserMarker>,
}

async fn get_followers(
    FollowersPath { id }: FollowersPath,
    State(db): State<Arc<DbClient>>,
    _: AuthenticatedUser,
) -> Result<Json<Vec<UserSummary>>> {
    Ok(Json(db.followers(id).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/following", rejection(ServerError))]
struct FollowingPath {
    id: Id<UserMarker>,
}

async fn get_following(
    FollowingPath { id }: FollowingPath,
    State(db): State<Arc<DbClient>>,
    _: AuthenticatedUser,
) -> Result<Json<Vec<UserSummary>>> {
    Ok(Json(db.following(id).await?))
}
