use inkwell_common::{
    model::reading::{DEFAULT_BOOKMARK_CAP, DEFAULT_HISTORY_CAP, ReadingLimits},
    snowflake::{ProcessId, WorkerId},
    util::{NonPositiveDurationError, PositiveDuration},
};
use inkwell_db::client::ClientConfig;
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroUsize,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid token lifetime: {0}")]
    TokenLifetime(#[from] NonPositiveDurationError),
}

fn default_token_lifetime_days() -> u16 {
    7
}

fn default_history_cap() -> NonZeroUsize {
    DEFAULT_HISTORY_CAP
}

fn default_bookmark_cap() -> NonZeroUsize {
    DEFAULT_BOOKMARK_CAP
}

/// Process configuration, read from the environment.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without a database the server keeps everything in memory.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
    #[serde(default = "default_token_lifetime_days")]
    pub token_lifetime_days: u16,
    #[serde(default = "default_history_cap")]
    pub reading_history_cap: NonZeroUsize,
    #[serde(default = "default_bookmark_cap")]
    pub reading_list_cap: NonZeroUsize,
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl Env {
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        Ok(ClientConfig {
            token_lifetime: Some(PositiveDuration::days(self.token_lifetime_days)?),
            reading: ReadingLimits {
                history_cap: self.reading_history_cap,
                bookmark_cap: self.reading_list_cap,
            },
        })
    }
}

/// Loads `.env` if there is one, then reads [`Env`] from the process environment.
pub fn get_env() -> Result<Env, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(ConfigError::from)
}

#[cfg(test)]
mod tests {
    use super::Env;
    use time::Duration;

    #[test]
    fn optional_keys_fall_back_to_defaults() {
        let vars = [
            ("SERVER_ADDRESS".to_owned(), "127.0.0.1".to_owned()),
            ("SERVER_PORT".to_owned(), "8080".to_owned()),
        ];
        let env: Env = envy::from_iter(vars).unwrap();

        assert_eq!(env.socket_address().to_string(), "127.0.0.1:8080");
        assert!(env.database_url.is_none());
        assert_eq!(env.worker_id.get(), 0);

        let config = env.client_config().unwrap();
        assert_eq!(config.token_lifetime.unwrap().get(), Duration::days(7));
        assert_eq!(config.reading.history_cap.get(), 50);
        assert_eq!(config.reading.bookmark_cap.get(), 500);
    }

    #[test]
    fn zero_token_lifetime_is_rejected() {
        let vars = [
            ("SERVER_ADDRESS".to_owned(), "::1".to_owned()),
            ("SERVER_PORT".to_owned(), "80".to_owned()),
            ("TOKEN_LIFETIME_DAYS".to_owned(), "0".to_owned()),
        ];
        let env: Env = envy::from_iter(vars).unwrap();

        assert!(env.client_config().is_err());
    }

    #[test]
    fn zero_reading_caps_are_rejected() {
        for key in ["READING_LIST_CAP", "READING_HISTORY_CAP"] {
            let vars = [
                ("SERVER_ADDRESS".to_owned(), "::1".to_owned()),
                ("SERVER_PORT".to_owned(), "80".to_owned()),
                (key.to_owned(), "0".to_owned()),
            ];
            assert!(envy::from_iter::<_, Env>(vars).is_err(), "{key}=0 should be rejected");
        }

        let vars = [
            ("SERVER_ADDRESS".to_owned(), "::1".to_owned()),
            ("SERVER_PORT".to_owned(), "80".to_owned()),
            ("READING_LIST_CAP".to_owned(), "1".to_owned()),
        ];
        let env: Env = envy::from_iter(vars).unwrap();
        assert_eq!(env.client_config().unwrap().reading.bookmark_cap.get(), 1);
    }
}
