use crate::server::ServerRouter;

mod auth;
mod comments;
mod posts;
mod reading;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(auth::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(users::routes())
        .merge(reading::routes())
}
