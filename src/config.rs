use anyhow::Context;
use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use std::{fs, path::Path};

pub const DEFAULT_API_URL: &str = "https://api.openshift.com";
pub const DEFAULT_TOKEN_URL: &str =
    "https://sso.redhat.com/auth/realms/redhat-external/protocol/openid-connect/token";
pub const DEFAULT_CLIENT_ID: &str = "cloud-services";

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "ROSA_CONFIG";

/// Environment variable supplying an offline token, overriding the config file
pub const TOKEN_ENV: &str = "ROSA_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Version of the rosa config
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Base URL of the cluster-management API
    #[serde(default = "default_api_url")]
    pub url: String,

    /// SSO endpoint used to exchange the refresh token
    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Offline token as handed out by the console
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Bearer token used as-is, skipping the refresh exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Config {
    /// Return default config file in yaml format
    pub fn yaml(&self) -> Result<String> {
        let config_yaml = serde_yaml::to_string(self)?;
        Ok(config_yaml)
    }

    /// Load from specified path, then environment variable, or finally default location.
    /// Only an explicitly given path must exist, otherwise a missing file yields the
    /// default config. `ROSA_TOKEN` always wins over a stored refresh token.
    pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config> {
        let mut config = if let Some(path) = path {
            let data = fs::read_to_string(path).context("failed to load file")?;
            parse_config(&data)?
        } else if let Some(path) = env_config_path()
            .or_else(default_config_path)
            .filter(|p| p.exists())
        {
            let data = fs::read_to_string(path).context("failed to load file")?;
            parse_config(&data)?
        } else {
            Config::default()
        };

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                config.refresh_token = Some(token);
            }
        }
        Ok(config)
    }

    /// Writes the config to `path`, creating parent directories as needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.yaml()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.refresh_token.is_some() || self.access_token.is_some()
    }
}

/// Resolves where `login` writes and `logout` removes the config
pub fn resolve_config_path<P: AsRef<Path>>(path: Option<P>) -> Result<PathBuf> {
    if let Some(path) = path {
        Ok(path.as_ref().to_path_buf())
    } else if let Some(path) = env_config_path() {
        Ok(path)
    } else {
        default_config_path().ok_or_else(|| anyhow!("failed to determine home directory"))
    }
}

fn parse_config(c: &str) -> Result<Config> {
    Ok(serde_yaml::from_str(c)?)
}

fn default_config_path() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".config").join("rosa").join("config.yaml"))
}

fn env_config_path() -> Option<PathBuf> {
    let path = std::env::var(CONFIG_ENV);
    if let Ok(p) = path {
        Some(PathBuf::from(p))
    } else {
        None
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.into()
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_version: "rosa/v1alpha1".into(),
            url: default_api_url(),
            token_url: default_token_url(),
            client_id: default_client_id(),
            refresh_token: None,
            access_token: None,
        }
    }
}
