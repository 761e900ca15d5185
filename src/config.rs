//! Configuration management for bdfs.
//!
//! Values are resolved in this order (first wins):
//! 1. Environment variables (`BDFS_*`), including those loaded from the `.env`
//!    file in the local data directory
//! 2. A TOML file at `BDFS_CONFIG_FILE_PATH`, or `config.toml` in the local data
//!    directory when that variable is unset
//! 3. Application defaults (token path, endpoints, timeouts)
//!
//! `client_id` and `client_secret` have no default and must come from one of
//! the first two sources.

use std::{env, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{Res, error::PanError};

pub const DEFAULT_OAUTH_URL: &str = "https://openapi.baidu.com/oauth/2.0";
pub const DEFAULT_API_URL: &str = "https://pan.baidu.com";
pub const DEFAULT_PCS_URL: &str = "https://d.pcs.baidu.com";

const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 300;

/// Base URLs of the three hosts the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub oauth_url: String,
    pub api_url: String,
    pub pcs_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            pcs_url: DEFAULT_PCS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub token_path: PathBuf,
    pub endpoints: Endpoints,
    /// Deadline for metadata calls.
    pub api_timeout: Duration,
    /// Deadline for slice uploads and downloads.
    pub transfer_timeout: Duration,
}

/// Shape of the optional TOML configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_path: Option<PathBuf>,
    pub oauth_url: Option<String>,
    pub api_url: Option<String>,
    pub pcs_url: Option<String>,
    pub api_timeout_secs: Option<u64>,
    pub transfer_timeout_secs: Option<u64>,
}

/// Platform-specific data directory of the application.
///
/// - Linux: `~/.local/share/bdfs`
/// - macOS: `~/Library/Application Support/bdfs`
/// - Windows: `%LOCALAPPDATA%/bdfs`
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("bdfs");
    path
}

/// Loads environment variables from `<data_dir>/.env` if the file exists.
///
/// Creates the data directory when missing so that users find the place to
/// drop their `.env` (the build script copies `.env.example` there).
pub async fn load_env() -> Res<()> {
    let dir = data_dir();
    async_fs::create_dir_all(&dir)
        .await
        .map_err(|e| PanError::io("cannot create", &dir, e))?;

    let path = dir.join(".env");
    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| PanError::Config(e.to_string()))?;
    }
    Ok(())
}

impl Config {
    /// Resolves the configuration from the process environment and the
    /// optional TOML file.
    pub async fn load() -> Res<Self> {
        let file_path = env::var("BDFS_CONFIG_FILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir().join("config.toml"));

        let file = if file_path.is_file() {
            let content = async_fs::read_to_string(&file_path)
                .await
                .map_err(|e| PanError::io("cannot read", &file_path, e))?;
            Some(parse_file_config(&content)?)
        } else {
            None
        };

        Self::from_sources(file, |key| env::var(key).ok())
    }

    /// Merges the file values with variables provided by `lookup`.
    pub fn from_sources(
        file: Option<FileConfig>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Res<Self> {
        let file = file.unwrap_or_default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = var("BDFS_CLIENT_ID").or(file.client_id).ok_or_else(missing)?;
        let client_secret = var("BDFS_CLIENT_SECRET")
            .or(file.client_secret)
            .ok_or_else(missing)?;

        let token_path = var("BDFS_TOKEN_PATH")
            .map(PathBuf::from)
            .or(file.token_path)
            .unwrap_or_else(|| data_dir().join("token.json"));

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            oauth_url: var("BDFS_OAUTH_URL")
                .or(file.oauth_url)
                .unwrap_or(defaults.oauth_url),
            api_url: var("BDFS_API_URL")
                .or(file.api_url)
                .unwrap_or(defaults.api_url),
            pcs_url: var("BDFS_PCS_URL")
                .or(file.pcs_url)
                .unwrap_or(defaults.pcs_url),
        };

        let api_timeout = secs(
            var("BDFS_API_TIMEOUT_SECS"),
            file.api_timeout_secs,
            DEFAULT_API_TIMEOUT_SECS,
        )?;
        let transfer_timeout = secs(
            var("BDFS_TRANSFER_TIMEOUT_SECS"),
            file.transfer_timeout_secs,
            DEFAULT_TRANSFER_TIMEOUT_SECS,
        )?;

        Ok(Self {
            client_id,
            client_secret,
            token_path,
            endpoints,
            api_timeout,
            transfer_timeout,
        })
    }
}

pub fn parse_file_config(content: &str) -> Res<FileConfig> {
    toml::from_str(content).map_err(|e| PanError::Config(e.to_string()))
}

fn secs(from_env: Option<String>, from_file: Option<u64>, default: u64) -> Res<Duration> {
    let value = match from_env {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| PanError::Config(format!("invalid timeout {raw:?}: {e}")))?,
        None => from_file.unwrap_or(default),
    };
    Ok(Duration::from_secs(value))
}

fn missing() -> PanError {
    PanError::Config(
        "missing client credentials; set BDFS_CLIENT_ID and BDFS_CLIENT_SECRET \
         (environment or .env), or client_id and client_secret in the file \
         pointed to by BDFS_CONFIG_FILE_PATH"
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_overrides_file() {
        let file = parse_file_config(
            r#"
            client_id = "file-id"
            client_secret = "file-secret"
            token_path = "/tmp/file-token.json"
            api_timeout_secs = 10
            "#,
        )
        .unwrap();

        let cfg = Config::from_sources(Some(file), env_of(&[("BDFS_CLIENT_ID", "env-id")])).unwrap();
        assert_eq!(cfg.client_id, "env-id");
        assert_eq!(cfg.client_secret, "file-secret");
        assert_eq!(cfg.token_path, PathBuf::from("/tmp/file-token.json"));
        assert_eq!(cfg.api_timeout, Duration::from_secs(10));
        assert_eq!(cfg.transfer_timeout, Duration::from_secs(300));
        assert_eq!(cfg.endpoints, Endpoints::default());
    }

    #[test]
    fn missing_credentials_is_a_config_error() {
        let err = Config::from_sources(None, env_of(&[("BDFS_CLIENT_ID", "id")])).unwrap_err();
        assert!(matches!(err, PanError::Config(_)));
    }

    #[test]
    fn blank_variables_are_ignored() {
        let err = Config::from_sources(
            None,
            env_of(&[("BDFS_CLIENT_ID", " "), ("BDFS_CLIENT_SECRET", "s")]),
        )
        .unwrap_err();
        assert!(matches!(err, PanError::Config(_)));
    }

    #[test]
    fn token_path_defaults_to_data_dir() {
        let cfg = Config::from_sources(
            None,
            env_of(&[("BDFS_CLIENT_ID", "id"), ("BDFS_CLIENT_SECRET", "secret")]),
        )
        .unwrap();
        assert_eq!(cfg.token_path, data_dir().join("token.json"));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let err = Config::from_sources(
            None,
            env_of(&[
                ("BDFS_CLIENT_ID", "id"),
                ("BDFS_CLIENT_SECRET", "secret"),
                ("BDFS_TRANSFER_TIMEOUT_SECS", "soon"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, PanError::Config(_)));
    }
}
