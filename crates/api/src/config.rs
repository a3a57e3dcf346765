use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use qedit_core::api_keys::hash_api_key;
use qedit_core::prompt_filter::PromptFilterConfig;
use qedit_queue::QueueConfig;

/// Key used when `QEDIT_API_KEY` is unset. Startup logs a warning.
pub const INSECURE_DEFAULT_API_KEY: &str = "changeme-insecure-default-key";

/// An environment variable that is set but cannot be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var}={value:?} is invalid: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// SHA-256 hex digest of the accepted `X-API-Key`.
    pub api_key_hash: String,
    /// True when no key was configured and the insecure default is in use.
    pub api_key_is_default: bool,
    /// Where generated images are written.
    pub output_dir: PathBuf,
    /// Upper bound on a submit request body.
    pub max_upload_bytes: usize,
    /// Base URL of the inference server.
    pub engine_url: String,
    pub queue: QueueConfig,
    pub prompt_filter: PromptFilterConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                      |
    /// |----------------------------|------------------------------|
    /// | `HOST`                     | `0.0.0.0`                    |
    /// | `PORT`                     | `8000`                       |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`      |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                         |
    /// | `QEDIT_API_KEY`            | insecure default (warned)    |
    /// | `OUTPUT_DIR`               | `generated-images/api`       |
    /// | `MAX_UPLOAD_BYTES`         | `20971520`                   |
    /// | `ENGINE_URL`               | `http://127.0.0.1:8188`      |
    /// | `QUEUE_MAX_SIZE`           | `10`                         |
    /// | `QUEUE_CLEANUP_AGE_SECS`   | `3600`                       |
    /// | `QUEUE_REAP_INTERVAL_SECS` | `300`                        |
    /// | `LOAD_TIMEOUT_SECS`        | `900`                        |
    /// | `GENERATE_TIMEOUT_SECS`    | `600`                        |
    /// | `PROMPT_FILTER_ENABLED`    | `true`                       |
    /// | `PROMPT_BLOCKED_TERMS`     | built-in list                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let cors_origins = env
            .string("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let (api_key, api_key_is_default) = match env.get("QEDIT_API_KEY") {
            Some(key) if !key.trim().is_empty() => (key.trim().to_string(), false),
            _ => (INSECURE_DEFAULT_API_KEY.to_string(), true),
        };

        let defaults = QueueConfig::default();
        let queue = QueueConfig {
            max_size: env.parse("QUEUE_MAX_SIZE", defaults.max_size)?,
            cleanup_age: env.secs("QUEUE_CLEANUP_AGE_SECS", defaults.cleanup_age)?,
            reap_interval: env.secs("QUEUE_REAP_INTERVAL_SECS", defaults.reap_interval)?,
            load_timeout: env.secs("LOAD_TIMEOUT_SECS", defaults.load_timeout)?,
            generate_timeout: env.secs("GENERATE_TIMEOUT_SECS", defaults.generate_timeout)?,
        };

        let mut prompt_filter = PromptFilterConfig {
            enabled: env.parse("PROMPT_FILTER_ENABLED", true)?,
            ..Default::default()
        };
        if let Some(terms) = env.get("PROMPT_BLOCKED_TERMS") {
            prompt_filter.blocked_terms = terms.split(',').map(|t| t.trim().to_string()).collect();
        }

        Ok(Self {
            host: env.string("HOST", "0.0.0.0"),
            port: env.parse("PORT", 8000)?,
            cors_origins,
            request_timeout_secs: env.parse("REQUEST_TIMEOUT_SECS", 30)?,
            api_key_hash: hash_api_key(&api_key),
            api_key_is_default,
            output_dir: PathBuf::from(env.string("OUTPUT_DIR", "generated-images/api")),
            max_upload_bytes: env.parse("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            engine_url: env.string("ENGINE_URL", "http://127.0.0.1:8188"),
            queue,
            prompt_filter,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
                var,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn secs(&self, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(var, default.as_secs()).map(Duration::from_secs)
    }
}
