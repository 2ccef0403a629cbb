use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::ARCHIVAL_USER_AGENT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Output
    pub data_root: PathBuf,
    pub media_dir: PathBuf,
    pub skip_existing: bool,
    /// Directory for per-run JSONL reports; `None` disables them.
    pub reports_dir: Option<PathBuf>,

    // Archive Policy
    pub download_media: bool,
    pub include_comments: bool,
    pub comments_depth: usize,
    pub comments_limit: usize,

    // HTTP
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
    pub connect_timeout: Duration,
    pub backoff_cap: Duration,
    pub user_agent: String,

    // External tools
    pub ffmpeg_path: String,

    // Driver
    pub post_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Output
            data_root: PathBuf::from(env_or_default("DATA_ROOT", "out")),
            media_dir: PathBuf::from(env_or_default("MEDIA_DIR", "media")),
            skip_existing: parse_env_bool("SKIP_EXISTING", true)?,
            reports_dir: parse_env_bool("WRITE_REPORT", true)?
                .then(|| PathBuf::from(env_or_default("REPORTS_DIR", "reports"))),

            // Archive Policy
            download_media: parse_env_bool("DOWNLOAD_MEDIA", true)?,
            include_comments: parse_env_bool("INCLUDE_COMMENTS", true)?,
            comments_depth: parse_env_usize("COMMENTS_DEPTH", 2)?,
            comments_limit: parse_env_usize("COMMENTS_LIMIT", 500)?,

            // HTTP
            max_retries: parse_env_u32("MAX_RETRIES", 5)?,
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 30)?),
            download_timeout: Duration::from_secs(parse_env_u64("DOWNLOAD_TIMEOUT_SECS", 60)?),
            connect_timeout: Duration::from_secs(parse_env_u64("CONNECT_TIMEOUT_SECS", 10)?),
            backoff_cap: Duration::from_secs(parse_env_u64("BACKOFF_CAP_SECS", 60)?),
            user_agent: env_or_default("USER_AGENT", ARCHIVAL_USER_AGENT),

            // External tools
            ffmpeg_path: env_or_default("FFMPEG_PATH", "ffmpeg"),

            // Driver
            post_delay: Duration::from_millis(parse_env_u64("POST_DELAY_MS", 2000)?),
        })
    }

    /// Configuration for tests: short timeouts, no skipping, no delay.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            data_root: PathBuf::from("./test-out"),
            media_dir: PathBuf::from("./test-media"),
            skip_existing: false,
            reports_dir: None,
            download_media: true,
            include_comments: true,
            comments_depth: 2,
            comments_limit: 500,
            max_retries: 2,
            request_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(1),
            user_agent: ARCHIVAL_USER_AGENT.to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            post_delay: Duration::ZERO,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.comments_depth == 0 {
            return Err(ConfigError::InvalidValue {
                name: "COMMENTS_DEPTH".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.download_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "DOWNLOAD_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.ffmpeg_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "FFMPEG_PATH".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
