//! Process configuration.
//!
//! Values come from an optional TOML file (named by `REDDIT_MCP_CONFIG`) and
//! are then overridden by environment variables. Everything is read once at
//! start-up; request handling never looks at the environment.

use crate::error::ConfigError;
use crate::types::Credentials;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const CONFIG_PATH_VAR: &str = "REDDIT_MCP_CONFIG";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_USER_AGENT: &str = "reddit-mcp/0.1 (MCP server)";
pub const DEFAULT_API_BASE_URL: &str = "https://oauth.reddit.com";
pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upstream endpoints and HTTP behaviour shared by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditSettings {
    pub user_agent: String,
    pub api_base_url: String,
    pub token_url: String,
    pub request_timeout: Duration,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub reddit: RedditSettings,
    /// Fallback identity used when a request carries no credential hints.
    pub default_credentials: Option<Credentials>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    reddit: FileRedditConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileRedditConfig {
    client_id: Option<String>,
    client_secret: Option<String>,
    user_agent: Option<String>,
    api_base_url: Option<String>,
    token_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl ServerConfig {
    /// Loads configuration from the real process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration using `lookup` in place of the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match non_empty(&lookup, CONFIG_PATH_VAR) {
            Some(path) => load_file(Path::new(&path))?,
            None => FileConfig::default(),
        };
        Self::build(file, &lookup)
    }

    /// Parses a TOML document, then applies overrides from `lookup`.
    pub fn from_toml_str<F>(contents: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = toml::from_str(contents)?;
        Self::build(file, &lookup)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn build<F>(file: FileConfig, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = non_empty(lookup, "HOST")
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match non_empty(lookup, "PORT") {
            Some(raw) => parse_field("PORT", &raw)?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };

        let timeout_secs = match non_empty(lookup, "REDDIT_REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_field("REDDIT_REQUEST_TIMEOUT_SECS", &raw)?,
            None => file
                .reddit
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "request timeout must be greater than zero".to_string(),
            });
        }

        let reddit = RedditSettings {
            user_agent: non_empty(lookup, "REDDIT_USER_AGENT")
                .or(file.reddit.user_agent)
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            api_base_url: validate_url(
                "REDDIT_API_BASE_URL",
                non_empty(lookup, "REDDIT_API_BASE_URL")
                    .or(file.reddit.api_base_url)
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            )?,
            token_url: validate_url(
                "REDDIT_TOKEN_URL",
                non_empty(lookup, "REDDIT_TOKEN_URL")
                    .or(file.reddit.token_url)
                    .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            )?,
            request_timeout: Duration::from_secs(timeout_secs),
        };

        let client_id = non_empty(lookup, "REDDIT_CLIENT_ID").or(file.reddit.client_id);
        let client_secret = non_empty(lookup, "REDDIT_CLIENT_SECRET").or(file.reddit.client_secret);
        let default_credentials =
            Credentials::from_parts(client_id.as_deref(), client_secret.as_deref());
        if default_credentials.is_none() && (client_id.is_some() || client_secret.is_some()) {
            warn!("Ignoring incomplete default Reddit credentials: both REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET are required");
        }

        debug!(
            "Loaded configuration: listen {}:{}, default credentials {}",
            host,
            port,
            if default_credentials.is_some() {
                "present"
            } else {
                "absent"
            }
        );

        Ok(Self {
            host,
            port,
            reddit,
            default_credentials,
        })
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => ConfigError::ValidationFailed {
            reason: format!("cannot read {}: {}", path.display(), e),
        },
    })?;
    Ok(toml::from_str(&contents)?)
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_field<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn validate_url(field: &str, raw: String) -> Result<String, ConfigError> {
    match url::Url::parse(&raw) {
        Ok(_) => Ok(raw.trim_end_matches('/').to_string()),
        Err(_) => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw,
        }),
    }
}
