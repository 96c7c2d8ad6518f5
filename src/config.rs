//! Configuration parsing and validation for vramroute.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

/// Context window handed to both backends when the config does not set one.
pub const DEFAULT_MAX_CONTEXT_TOKENS: u32 = 8192;

/// Per-call bound on a backend invocation, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend with limited working memory; carries the admission threshold.
    pub constrained: BackendConfig,
    /// Preferred backend for in-budget requests.
    pub high_capacity: BackendConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Request sequence for `vramroute run` when no prompts file is given.
    #[serde(default)]
    pub requests: Vec<RequestConfig>,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "./vramroute.db".to_string()
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Only accessible via `.expose_secret()`, so every use is grep-auditable.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How a backend's API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Configuration for one inference backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Unique name for this backend (used in logs and reports)
    pub name: String,
    /// Base URL of the Ollama-compatible server (e.g., "http://INTELoLLAMA:11434")
    pub url: String,
    /// Optional bearer token for servers behind an authenticating proxy
    pub api_key: Option<ApiKey>,
    /// Model identifier passed to `generate`
    pub model: String,
    /// Context window requested on every call (`num_ctx`)
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
    /// Cost above which requests skip the high-capacity backend.
    /// Only valid on the constrained backend.
    pub admission_threshold: Option<u64>,
    /// Sampling temperature; unset leaves the server default
    pub temperature: Option<f32>,
    /// Upper bound on a single `generate` call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_context_tokens() -> u32 {
    DEFAULT_MAX_CONTEXT_TOKENS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// What the orchestration loop does when a request fails on its primary
/// attempt with a failure that is not eligible for fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnUnrecovered {
    /// Record the failure for that request and keep going.
    #[default]
    Continue,
    /// Stop the run and return the failure.
    Abort,
}

/// Orchestration loop configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default)]
    pub on_unrecovered: OnUnrecovered,
}

/// A single entry of the configured request sequence.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    pub prompt: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to record dispatches in the database
    #[serde(default = "default_true")]
    pub log_dispatches: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dispatches: true,
        }
    }
}

impl Config {
    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// The constrained backend must carry the admission threshold and the
    /// high-capacity backend must not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for backend in [&self.constrained, &self.high_capacity] {
            if backend.url.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Backend '{}' has empty URL",
                    backend.name
                )));
            }
            if backend.model.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Backend '{}' has empty model",
                    backend.name
                )));
            }
            if backend.max_context_tokens == 0 {
                return Err(ConfigError::Validation(format!(
                    "Backend '{}' has max_context_tokens = 0",
                    backend.name
                )));
            }
            if backend.timeout_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "Backend '{}' has timeout_secs = 0",
                    backend.name
                )));
            }
        }

        if self.constrained.name == self.high_capacity.name {
            return Err(ConfigError::Validation(format!(
                "Both backends are named '{}'",
                self.constrained.name
            )));
        }

        if self.constrained.admission_threshold.is_none() {
            return Err(ConfigError::Validation(format!(
                "Constrained backend '{}' must set admission_threshold",
                self.constrained.name
            )));
        }

        if self.high_capacity.admission_threshold.is_some() {
            return Err(ConfigError::Validation(format!(
                "High-capacity backend '{}' must not set admission_threshold",
                self.high_capacity.name
            )));
        }

        if self.requests.iter().any(|r| r.prompt.trim().is_empty()) {
            tracing::warn!("Configured request sequence contains empty prompts");
        }

        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for backend '{backend}': {message}")]
    EnvVar {
        var: String,
        backend: String,
        message: String,
    },
}

/// Raw backend config deserialized directly from TOML.
/// `url` and `api_key` may contain `${VAR}` references not yet expanded.
#[derive(Deserialize)]
pub struct RawBackendConfig {
    name: String,
    url: String,
    api_key: Option<String>,
    model: String,
    #[serde(default = "default_max_context_tokens")]
    max_context_tokens: u32,
    admission_threshold: Option<u64>,
    temperature: Option<f32>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

/// Raw configuration deserialized directly from TOML.
#[derive(Deserialize)]
pub struct RawConfig {
    constrained: RawBackendConfig,
    high_capacity: RawBackendConfig,
    #[serde(default)]
    orchestration: OrchestrationConfig,
    database: Option<DatabaseConfig>,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    requests: Vec<RequestConfig>,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}:11434`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(
    input: &str,
    backend_name: &str,
    lookup: F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            backend: backend_name.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                backend: backend_name.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            backend: backend_name.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in backend '{}')",
                var_name, backend_name
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

fn expand_env_vars(input: &str, backend_name: &str) -> Result<String, ConfigError> {
    expand_env_vars_with(input, backend_name, |name| std::env::var(name).ok())
}

/// Derive the convention-based env var name for a backend.
///
/// - "intel" -> "VRAMROUTE_INTEL_API_KEY"
/// - "gpu-box" -> "VRAMROUTE_GPU_BOX_API_KEY"
pub fn convention_env_var_name(backend_name: &str) -> String {
    let upper_snake = backend_name.to_uppercase().replace(['-', ' '], "_");
    format!("VRAMROUTE_{}_API_KEY", upper_snake)
}

fn convention_key_lookup(backend_name: &str) -> Option<(String, String)> {
    let var_name = convention_env_var_name(backend_name);
    std::env::var(&var_name).ok().map(|value| (var_name, value))
}

impl RawBackendConfig {
    fn resolve(self) -> Result<(BackendConfig, KeySource), ConfigError> {
        let url = expand_env_vars(&self.url, &self.name)?;

        let (api_key, source) = match self.api_key {
            Some(ref raw_key) if raw_key.contains("${") => {
                let expanded = expand_env_vars(raw_key, &self.name)?;
                (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
            }
            Some(ref raw_key) => (Some(ApiKey::from(raw_key.as_str())), KeySource::Literal),
            None => match convention_key_lookup(&self.name) {
                Some((var_name, value)) => {
                    (Some(ApiKey::from(value)), KeySource::Convention(var_name))
                }
                None => (None, KeySource::None),
            },
        };

        let backend = BackendConfig {
            name: self.name,
            url,
            api_key,
            model: self.model,
            max_context_tokens: self.max_context_tokens,
            admission_threshold: self.admission_threshold,
            temperature: self.temperature,
            timeout_secs: self.timeout_secs,
        };

        Ok((backend, source))
    }
}

impl Config {
    /// Convert raw (deserialized) config to final config with env var expansion.
    ///
    /// For each backend, `${VAR}` references in `url` are expanded. The API key is:
    /// - expanded when it contains `${VAR}` (`EnvExpanded`)
    /// - wrapped directly when literal (`Literal`)
    /// - looked up as `VRAMROUTE_<NAME>_API_KEY` when absent (`Convention` or `None`)
    pub fn from_raw(raw: RawConfig) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let (constrained, constrained_source) = raw.constrained.resolve()?;
        let (high_capacity, high_capacity_source) = raw.high_capacity.resolve()?;

        let key_sources = vec![
            (constrained.name.clone(), constrained_source),
            (high_capacity.name.clone(), high_capacity_source),
        ];

        let config = Config {
            constrained,
            high_capacity,
            orchestration: raw.orchestration,
            database: raw.database,
            logging: raw.logging,
            requests: raw.requests,
        };

        Ok((config, key_sources))
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// Returns the config and per-backend key source information.
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let content = read_config_file(path.as_ref())?;

        let raw: RawConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
        let (config, key_sources) = Self::from_raw(raw)?;
        config.validate()?;

        Ok((config, key_sources))
    }
}
