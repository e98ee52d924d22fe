//! Service settings.
//!
//! Values come from built-in defaults, then an optional `dispatch.toml` in
//! the working directory, then `DISPATCH__*` environment variables, with
//! later sources winning. Nested keys use `__`, so `database.uri` is set with
//! `DISPATCH__DATABASE__URI`.

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub email: EmailSettings,
    pub log: LogSettings,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerSettings {
    pub address: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    pub uri: String,
    pub name: String,
    /// Drop everything and load demo data on startup
    pub seed: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheSettings {
    pub ttl_seconds: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmailSettings {
    /// Without a relay, test sends are logged instead of delivered
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub default_sender: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogSettings {
    /// Fallback filter when `RUST_LOG` is unset
    pub level: String,
}

impl Settings {
    pub fn load() -> Result<Settings, Error> {
        Settings::load_from("dispatch")
    }

    fn load_from(file: &str) -> Result<Settings, Error> {
        let settings = Config::builder()
            .set_default("server.address", "127.0.0.1:8080")?
            .set_default("database.uri", "mongodb://localhost:27017")?
            .set_default("database.name", "dispatch")?
            .set_default("database.seed", false)?
            .set_default("cache.ttl_seconds", 300)?
            .set_default("email.smtp_port", 587)?
            .set_default("email.default_sender", "no-reply@localhost")?
            .set_default("log.level", "info")?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("DISPATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}
