use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("Unknown store kind '{other}', expected 'postgres' or 'memory'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_url: Option<String>,
    pub store: StoreKind,
    pub log_dir: String,
    pub query_timeout_secs: u64,
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub db_max_connections: u32,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    database_url: Option<String>,
    store: Option<StoreKind>,
    log_dir: Option<String>,
    query_timeout_secs: Option<u64>,
    default_page_size: Option<u64>,
    max_page_size: Option<u64>,
    db_max_connections: Option<u32>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            database_url: None,
            store: StoreKind::Postgres,
            log_dir: default_log_dir(),
            query_timeout_secs: 5,
            default_page_size: 10,
            max_page_size: 100,
            db_max_connections: 10,
        }
    }
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key}: {e}")),
        _ => Ok(None),
    }
}

impl PartialServerConfig {
    fn from_file(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }

    fn from_env() -> Result<Self, String> {
        Ok(PartialServerConfig {
            listen_addr: env_value("LISTEN_ADDR")?,
            database_url: env_value("DATABASE_URL")?,
            store: env_value("STORE")?,
            log_dir: env_value("LOG_DIR")?,
            query_timeout_secs: env_value("QUERY_TIMEOUT_SECS")?,
            default_page_size: env_value("DEFAULT_PAGE_SIZE")?,
            max_page_size: env_value("MAX_PAGE_SIZE")?,
            db_max_connections: env_value("DB_MAX_CONNECTIONS")?,
        })
    }

    /// Fields set in `self` win over `lower`; anything left falls back to defaults.
    fn merge(self, lower: PartialServerConfig) -> Result<ServerConfig, String> {
        let defaults = ServerConfig::default();
        let config = ServerConfig {
            listen_addr: self.listen_addr.or(lower.listen_addr).unwrap_or(defaults.listen_addr),
            database_url: self.database_url.or(lower.database_url),
            store: self.store.or(lower.store).unwrap_or(defaults.store),
            log_dir: self.log_dir.or(lower.log_dir).unwrap_or(defaults.log_dir),
            query_timeout_secs: self
                .query_timeout_secs
                .or(lower.query_timeout_secs)
                .unwrap_or(defaults.query_timeout_secs),
            default_page_size: self
                .default_page_size
                .or(lower.default_page_size)
                .unwrap_or(defaults.default_page_size),
            max_page_size: self
                .max_page_size
                .or(lower.max_page_size)
                .unwrap_or(defaults.max_page_size),
            db_max_connections: self
                .db_max_connections
                .or(lower.db_max_connections)
                .unwrap_or(defaults.db_max_connections),
        };
        config.validate()?;
        Ok(config)
    }
}

impl ServerConfig {
    /// Loads the optional TOML file, then lets environment variables override it.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        let file_config = match config_path.map(Path::new) {
            Some(path) if path.exists() => PartialServerConfig::from_file(path)?,
            _ => PartialServerConfig::default(),
        };
        let env_config = PartialServerConfig::from_env()?;

        env_config.merge(file_config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.store == StoreKind::Postgres && self.database_url.is_none() {
            return Err("DATABASE_URL is required when STORE=postgres".to_string());
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err("Page sizes must be greater than zero".to_string());
        }
        if self.default_page_size > self.max_page_size {
            return Err("DEFAULT_PAGE_SIZE cannot exceed MAX_PAGE_SIZE".to_string());
        }
        if self.query_timeout_secs == 0 {
            return Err("QUERY_TIMEOUT_SECS must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
