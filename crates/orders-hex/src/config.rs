use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: String,
    /// Selects the sqlite store when set; see `orders_repo::build_store`.
    pub database_url: Option<String>,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let server_port = lookup("SERVER_PORT").unwrap_or_else(|| "3000".into());
        if server_port.parse::<u16>().is_err() {
            anyhow::bail!("SERVER_PORT must be a port number, got {server_port:?}");
        }
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| "debug".into());
        Ok(Self {
            server_port,
            database_url,
            log_filter,
        })
    }
}
