use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use stickerme_contracts::GenerationDefaults;

pub const DEFAULT_API_BASE: &str = "https://api.stability.ai";
pub const DEFAULT_MODEL: &str = "stable-diffusion-xl-1024-v1-0";
pub const DEFAULT_IMAGES_DIR: &str = "images";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AUDIT_LOG: &str = "stickerme-events.jsonl";

/// Upstream credential. Never printed, not even through `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a positive number of seconds (got '{value}')")]
    InvalidSeconds { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_base: String,
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub images_dir: PathBuf,
    pub request_timeout: Duration,
    pub write_timeout: Duration,
    pub audit_log: Option<PathBuf>,
    pub defaults: GenerationDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            audit_log: None,
            defaults: GenerationDefaults::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();
        if let Some(base) = get("STABILITY_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        config.api_key = get("STABILITY_API_KEY").map(ApiKey::new);
        if let Some(model) = get("STICKERME_MODEL") {
            config.model = model;
        }
        if let Some(dir) = get("STICKERME_IMAGES_DIR") {
            config.images_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("STICKERME_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_seconds("STICKERME_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("STICKERME_WRITE_TIMEOUT_SECS") {
            config.write_timeout = parse_seconds("STICKERME_WRITE_TIMEOUT_SECS", &raw)?;
        }
        config.audit_log = get("STICKERME_AUDIT_LOG").map(PathBuf::from);
        Ok(config)
    }

    /// Explicit audit path, or `{images_dir}-events.jsonl` beside the artifact root.
    pub fn audit_log_path(&self) -> PathBuf {
        if let Some(path) = &self.audit_log {
            return path.clone();
        }
        match self.images_dir.file_name() {
            Some(name) => self
                .images_dir
                .with_file_name(format!("{}-events.jsonl", name.to_string_lossy())),
            None => PathBuf::from(DEFAULT_AUDIT_LOG),
        }
    }
}

fn parse_seconds(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidSeconds {
        key,
        value: raw.to_string(),
    };
    match raw.parse::<f64>() {
        Ok(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
