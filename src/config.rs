//! Process configuration.
//!
//! Non-secret settings come from a TOML file; every section has defaults so
//! a missing file yields a runnable configuration. Credentials are never
//! read from the TOML file: they come from the environment (after loading a
//! local `.env` file, if one exists) and are held in [`SecretString`]s.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5000"
//!
//! [index]
//! path = "./storage/index.sqlite"
//! top_k = 4
//!
//! [answer]
//! model = "gpt-3.5-turbo"
//! max_context_chars = 12000
//! # timeout_secs = 60
//!
//! [line]
//! api_base = "https://api.line.me"
//! ```

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable holding the answer backend API key.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable holding the LINE channel access token.
pub const CHANNEL_ACCESS_TOKEN: &str = "OA_CHANNEL_ACCESS_TOKEN";
/// Environment variable holding the LINE channel secret used for signatures.
pub const CHANNEL_SECRET: &str = "OA_CHANNEL_SECRET";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub line: LineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Number of chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            top_k: default_top_k(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./storage/index.sqlite")
}
fn default_top_k() -> i64 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    /// Character budget for the retrieved context packed into one prompt.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Client-side timeout. Unset means the call waits for the backend.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            base_url: default_answer_base_url(),
            model: default_model(),
            temperature: 0.0,
            max_context_chars: default_max_context_chars(),
            timeout_secs: None,
        }
    }
}

fn default_answer_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_max_context_chars() -> usize {
    12_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LineConfig {
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base: default_line_api_base(),
        }
    }
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

/// Loads and validates the TOML configuration at `path`.
///
/// A missing file is not an error: defaults are used instead.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Parses configuration text without touching the filesystem.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn validate(config: &Config) -> Result<()> {
    if config.server.bind.parse::<SocketAddr>().is_err() {
        bail!(
            "server.bind must be a socket address (got '{}')",
            config.server.bind
        );
    }

    if config.index.top_k < 1 {
        bail!("index.top_k must be >= 1");
    }

    if config.answer.model.trim().is_empty() {
        bail!("answer.model must not be empty");
    }
    if config.answer.max_context_chars == 0 {
        bail!("answer.max_context_chars must be > 0");
    }
    if config.answer.timeout_secs == Some(0) {
        bail!("answer.timeout_secs must be > 0 when set");
    }

    for (key, url) in [
        ("answer.base_url", &config.answer.base_url),
        ("line.api_base", &config.line.api_base),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("{} must be an http(s) URL (got '{}')", key, url);
        }
    }

    Ok(())
}

/// Credentials required to serve traffic.
///
/// Constructed once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct Secrets {
    pub openai_api_key: SecretString,
    pub channel_access_token: SecretString,
    pub channel_secret: SecretString,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secrets { .. }")
    }
}

impl Secrets {
    /// Reads all secrets from the process environment, loading `.env` first.
    ///
    /// Fails with one error naming every missing variable.
    pub fn from_env() -> Result<Self> {
        // A missing .env is normal in container deployments.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds secrets from an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fetch = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = fetch(OPENAI_API_KEY);
        let channel_access_token = fetch(CHANNEL_ACCESS_TOKEN);
        let channel_secret = fetch(CHANNEL_SECRET);

        let missing: Vec<&str> = [
            (OPENAI_API_KEY, openai_api_key.is_none()),
            (CHANNEL_ACCESS_TOKEN, channel_access_token.is_none()),
            (CHANNEL_SECRET, channel_secret.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        match (openai_api_key, channel_access_token, channel_secret) {
            (Some(api_key), Some(token), Some(secret)) => Ok(Self {
                openai_api_key: SecretString::from(api_key),
                channel_access_token: SecretString::from(token),
                channel_secret: SecretString::from(secret),
            }),
            _ => bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            ),
        }
    }

    /// Reads only the channel secret (used by `relay sign`).
    pub fn channel_secret_from_env() -> Result<SecretString> {
        let _ = dotenvy::dotenv();
        std::env::var(CHANNEL_SECRET)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from)
            .with_context(|| format!("missing required environment variable: {}", CHANNEL_SECRET))
    }
}
