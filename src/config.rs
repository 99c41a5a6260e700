use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.twitter.com/1.1/";
const TIMEOUT_SEC: u64 = 10;
const PAGE_SIZE: u32 = 200;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No {name} set (use --{flag} or {env})")]
    MissingCredential {
        name: &'static str,
        flag: &'static str,
        env: &'static str,
    },
    #[error("Unable to read auth file {}", .0.display())]
    AuthFileUnreadable(PathBuf, #[source] std::io::Error),
    #[error("Unable to deserialize auth file {}", .0.display())]
    AuthFileInvalid(PathBuf, #[source] serde_json::Error),
}

/// OAuth 1.0a user-context credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
    pub bearer_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"<redacted>")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Partially filled credentials, as they come from flags, the environment or
/// an auth file.
#[derive(Deserialize, Default, Debug, Clone)]
pub struct CredentialSource {
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(default)]
    pub consumer_secret: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_secret: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl CredentialSource {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::AuthFileUnreadable(path.to_path_buf(), e))?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::AuthFileInvalid(path.to_path_buf(), e))
    }

    /// Fills every field that is still empty from `fallback`.
    pub fn or(self, fallback: CredentialSource) -> Self {
        Self {
            consumer_key: non_empty(self.consumer_key).or_else(|| non_empty(fallback.consumer_key)),
            consumer_secret: non_empty(self.consumer_secret)
                .or_else(|| non_empty(fallback.consumer_secret)),
            access_token: non_empty(self.access_token).or_else(|| non_empty(fallback.access_token)),
            access_token_secret: non_empty(self.access_token_secret)
                .or_else(|| non_empty(fallback.access_token_secret)),
            bearer_token: non_empty(self.bearer_token).or_else(|| non_empty(fallback.bearer_token)),
        }
    }

    pub fn resolve(self) -> Result<Credentials, ConfigError> {
        Ok(Credentials {
            consumer_key: required(self.consumer_key, "api key", "key", "TWITTER_API_KEY")?,
            consumer_secret: required(
                self.consumer_secret,
                "secret key",
                "key-secret",
                "TWITTER_API_KEY_SECRET",
            )?,
            access_token: required(self.access_token, "access token", "token", "TWITTER_API_TOKEN")?,
            access_token_secret: required(
                self.access_token_secret,
                "access token secret",
                "token-secret",
                "TWITTER_API_TOKEN_SECRET",
            )?,
            bearer_token: non_empty(self.bearer_token),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(
    value: Option<String>,
    name: &'static str,
    flag: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::MissingCredential { name, flag, env })
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the v1.1 REST API, with a trailing slash
    pub api_url: String,
    pub timeout: Duration,
    pub page_size: u32,
    /// `None` waits out the rate limit as often as the server asks
    pub max_rate_limit_waits: Option<u32>,
    /// Consecutive failed page fetches tolerated before a run stops
    pub max_page_failures: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(TIMEOUT_SEC),
            page_size: PAGE_SIZE,
            max_rate_limit_waits: None,
            max_page_failures: 3,
        }
    }
}

impl ApiConfig {
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };
        self
    }
}
