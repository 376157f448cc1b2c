use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "MEMEFEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    crate::api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("meme-feed/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_scroll_offset")]
    pub scroll_offset: u32,
    #[serde(default = "default_enrich_workers")]
    pub enrich_workers: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            scroll_offset: default_scroll_offset(),
            enrich_workers: default_enrich_workers(),
        }
    }
}

fn default_scroll_offset() -> u32 {
    crate::scroll::DEFAULT_OFFSET
}

fn default_enrich_workers() -> usize {
    crate::enrich::DEFAULT_WORKERS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("meme-feed").join("meme-feed.log"))
}

fn default_log_filter() -> String {
    "meme_feed=info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

// Values equal to the defaults count as "unset" so that the env layer, which
// starts from defaults, does not clobber the file layer.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    if other.api.base_url != defaults.api.base_url {
        base.api.base_url = other.api.base_url;
    }
    if other.api.user_agent != defaults.api.user_agent && !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if other.api.timeout != defaults.api.timeout {
        base.api.timeout = other.api.timeout;
    }

    if !other.auth.token.is_empty() {
        base.auth.token = other.auth.token;
    }

    if other.feed.scroll_offset != defaults.feed.scroll_offset {
        base.feed.scroll_offset = other.feed.scroll_offset;
    }
    if other.feed.enrich_workers != 0 && other.feed.enrich_workers != defaults.feed.enrich_workers {
        base.feed.enrich_workers = other.feed.enrich_workers;
    }

    if other.log.file != defaults.log.file {
        base.log.file = other.log.file;
    }
    if !other.log.filter.is_empty() && other.log.filter != defaults.log.filter {
        base.log.filter = other.log.filter;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "auth.token" => cfg.auth.token = value,
        "feed.scroll_offset" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.feed.scroll_offset = parsed;
            }
        }
        "feed.enrich_workers" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.enrich_workers = parsed;
            }
        }
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "log.filter" | "log" => cfg.log.filter = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("meme-feed").join("config.yaml"))
}

/// Stores `token` in the config file, keeping every other setting.
pub fn save_token(path: Option<PathBuf>, token: &str) -> Result<PathBuf> {
    let token = token.trim();
    anyhow::ensure!(!token.is_empty(), "config: auth.token is required");

    let path = if let Some(path) = path {
        path
    } else {
        default_config_path().context("config: unable to determine default config path")?
    };

    let mut cfg = if path.exists() {
        read_config_file(&path)?
    } else {
        Config::default()
    };
    cfg.auth.token = token.to_string();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("config: failed to create directory {}", parent.display()))?;
    }

    let contents = serde_yaml::to_string(&cfg).context("config: failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("config: failed to write file {}", path.display()))?;

    Ok(path)
}
