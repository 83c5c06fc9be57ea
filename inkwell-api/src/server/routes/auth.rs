use crate::server::{
    Result, ServerRouter,
    json::{Created, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::user::{CreateUser, Email, UserSummary};
use inkwell_db::client::{DbClient, SignedIn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(sign_up)
        .typed_post(log_in)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct SessionResponse {
    msg: &'static str,
    token: String,
    user: UserSummary,
}

impl SessionResponse {
    fn new(msg: &'static str, signed_in: &SignedIn) -> Self {
        Self {
            msg,
            token: signed_in.token.as_token_str(),
            user: signed_in.user.summary(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct LogIn {
    email: Email,
    password: String,
}

#[derive(TypedPath)]
#[typed_path("/auth/signup")]
struct SignUpPath;

async fn sign_up(
    _: SignUpPath,
    State(db): State<Arc<DbClient>>,
    Json(user): Json<CreateUser>,
) -> Result<Created<SessionResponse>> {
    let signed_in = db.sign_up(user).await?;

    Ok(Created(SessionResponse::new("Signup successful", &signed_in)))
}

#[derive(TypedPath)]
#[typed_path("/auth/login")]
struct LogInPath;

async fn log_in(
    _: LogInPath,
    State(db): State<Arc<DbClient>>,
    Json(credentials): Json<LogIn>,
) -> Result<Json<SessionResponse>> {
    let signed_in = db.log_in(&credentials.email, &credentials.password).await?;

    Ok(Json(SessionResponse::new("Login successful", &signed_in)))
}
