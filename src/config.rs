use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_MODEL_PATH: &str = "models/tea_model.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub model_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub cors_origin: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_raw = lookup("TEA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse()
            .with_context(|| format!("TEA_BIND_ADDR is not a socket address: {bind_raw}"))?;

        let max_connections = match lookup("TEA_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("TEA_DB_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            model_path: lookup("TEA_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            bind_addr,
            cors_origin: lookup("TEA_CORS_ORIGIN")
                .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            max_connections,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.cors_origin, DEFAULT_CORS_ORIGIN);
        assert_eq!(config.max_connections, 5);
        assert!(config.database_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/tea"),
            ("TEA_MODEL_PATH", "/srv/model.json"),
            ("TEA_BIND_ADDR", "127.0.0.1:9000"),
            ("TEA_DB_MAX_CONNECTIONS", "12"),
        ])
        .expect("config");
        assert_eq!(config.database_url().expect("url"), "postgres://localhost/tea");
        assert_eq!(config.model_path, PathBuf::from("/srv/model.json"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(config_from(&[("TEA_BIND_ADDR", "nowhere")]).is_err());
        assert!(config_from(&[("TEA_DB_MAX_CONNECTIONS", "many")]).is_err());
    }
}
