use axum::http::{HeaderValue, header::InvalidHeaderValue};
use inkwell_api::{
    config::{ConfigError, Env, get_env},
    server,
};
use inkwell_db::{
    client::{DbClient, DbError},
    store::{MemoryStore, PgStore, Store},
};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error connecting to the database: {0}")]
    Database(#[from] DbError),
    #[error("Invalid CORS origin: {0}")]
    CorsOrigin(#[from] InvalidHeaderValue),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inkwell_api=debug,inkwell_db=debug,inkwell_common=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn connect_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    if let Some(url) = &env.database_url {
        info!("Connecting to postgres");
        Ok(Arc::new(PgStore::connect(url).await?))
    } else {
        warn!("DATABASE_URL is not set, keeping all data in memory");
        Ok(Arc::new(MemoryStore::new()))
    }
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "Could not listen for ctrl-c");
            return;
        }
        info!("Shutting down");
        trigger.cancel();
    });

    token
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let store = connect_store(&env).await?;
    let db_client = Arc::new(DbClient::new(
        store,
        env.worker_id,
        env.process_id,
        env.client_config()?,
    ));

    let mut app = server::app(db_client).layer(TraceLayer::new_for_http());
    if let Some(origin) = &env.cors_origin {
        let cors = CorsLayer::permissive().allow_origin(origin.parse::<HeaderValue>()?);
        app = app.layer(cors);
    }

    let server_address = env.socket_address();
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = shutdown_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
