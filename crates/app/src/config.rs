//! Process configuration
//!
//! Read from a TOML file, then overridden by environment variables. The
//! file is looked up at `--config`, then `LIVEPOLL_CONFIG`, then the
//! platform config directory. With no file at all the defaults apply.

use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use livepoll_net::ServerConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "LIVEPOLL_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub server: ServerConfig,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log_filter: "info".into(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load from the first config file found, then apply the environment
    pub fn load(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::locate(cli_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<platform config dir>/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "onyx", "livepoll")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// An explicitly named file must exist; the default one is optional
    fn locate(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_path {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        Self::default_path().filter(|path| path.is_file())
    }

    /// Apply `PORT`, `HOST` and `CLIENT_URL`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(port) = var("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(host) = var("HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
        if let Some(origin) = var("CLIENT_URL").filter(|o| !o.trim().is_empty()) {
            let origin = origin.trim().trim_end_matches('/').to_string();
            if !self.server.allowed_origins.contains(&origin) {
                self.server.allowed_origins.push(origin);
            }
        }
        Ok(())
    }
}
