//! Backend descriptors and the two-member registry.

use serde::Serialize;
use std::time::Duration;

use crate::config::{ApiKey, BackendConfig, Config, ConfigError};

/// Sampling temperature for the high-capacity backend when the config
/// leaves it unset.
pub const DEFAULT_HIGH_CAPACITY_TEMPERATURE: f32 = 0.7;

/// Which of the two backends a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendRole {
    /// Limited working memory; fallback target and home of oversized requests.
    Constrained,
    /// Preferred backend for in-budget requests.
    HighCapacity,
}

impl BackendRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendRole::Constrained => "constrained",
            BackendRole::HighCapacity => "high_capacity",
        }
    }
}

impl std::fmt::Display for BackendRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation options sent with every call to a backend.
///
/// Serializes to the Ollama `options` object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    /// Context window in tokens.
    pub num_ctx: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Immutable configuration of one backend.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub role: BackendRole,
    pub name: String,
    pub url: String,
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub max_context_tokens: u32,
    pub admission_threshold: Option<u64>,
    pub options: GenerationOptions,
    pub timeout: Duration,
}

impl BackendDescriptor {
    fn from_config(role: BackendRole, config: &BackendConfig) -> Self {
        let temperature = match role {
            BackendRole::HighCapacity => config
                .temperature
                .or(Some(DEFAULT_HIGH_CAPACITY_TEMPERATURE)),
            BackendRole::Constrained => config.temperature,
        };

        Self {
            role,
            name: config.name.clone(),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_context_tokens: config.max_context_tokens,
            admission_threshold: config.admission_threshold,
            options: GenerationOptions {
                num_ctx: config.max_context_tokens,
                temperature,
            },
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// The fixed pair of backends, read-only for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct Registry {
    constrained: BackendDescriptor,
    high_capacity: BackendDescriptor,
    admission_threshold: u64,
}

impl Registry {
    /// Build the registry from a configuration, validating it first.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let constrained =
            BackendDescriptor::from_config(BackendRole::Constrained, &config.constrained);
        let high_capacity =
            BackendDescriptor::from_config(BackendRole::HighCapacity, &config.high_capacity);

        let admission_threshold = constrained.admission_threshold.ok_or_else(|| {
            ConfigError::Validation(format!(
                "Constrained backend '{}' must set admission_threshold",
                constrained.name
            ))
        })?;

        Ok(Self {
            constrained,
            high_capacity,
            admission_threshold,
        })
    }

    pub fn constrained(&self) -> &BackendDescriptor {
        &self.constrained
    }

    pub fn high_capacity(&self) -> &BackendDescriptor {
        &self.high_capacity
    }

    pub fn get(&self, role: BackendRole) -> &BackendDescriptor {
        match role {
            BackendRole::Constrained => &self.constrained,
            BackendRole::HighCapacity => &self.high_capacity,
        }
    }

    /// Cost above which requests bypass the high-capacity backend.
    pub fn admission_threshold(&self) -> u64 {
        self.admission_threshold
    }

    /// Both descriptors, constrained first.
    pub fn descriptors(&self) -> [&BackendDescriptor; 2] {
        [&self.constrained, &self.high_capacity]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::parse_str(
            r#"
            [constrained]
            name = "intel"
            url = "http://INTELoLLAMA:11434"
            model = "phi3:3.8b"
            admission_threshold = 4000

            [high_capacity]
            name = "nvidia"
            url = "http://NVIDIAoLLAMA:11435"
            model = "gemma:2b"
            timeout_secs = 30
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_registry_from_config() {
        let registry = Registry::from_config(&test_config()).unwrap();

        assert_eq!(registry.admission_threshold(), 4000);
        assert_eq!(registry.constrained().role, BackendRole::Constrained);
        assert_eq!(registry.constrained().model, "phi3:3.8b");
        assert_eq!(registry.high_capacity().name, "nvidia");
        assert_eq!(registry.high_capacity().timeout, Duration::from_secs(30));
        assert_eq!(registry.get(BackendRole::Constrained).name, "intel");
    }

    #[test]
    fn test_options_use_full_context_window() {
        let registry = Registry::from_config(&test_config()).unwrap();
        for descriptor in registry.descriptors() {
            assert_eq!(descriptor.options.num_ctx, 8192);
        }
    }

    #[test]
    fn test_high_capacity_gets_default_temperature() {
        let registry = Registry::from_config(&test_config()).unwrap();
        assert_eq!(
            registry.high_capacity().options.temperature,
            Some(DEFAULT_HIGH_CAPACITY_TEMPERATURE)
        );
        assert_eq!(registry.constrained().options.temperature, None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.high_capacity.admission_threshold = Some(1);
        assert!(matches!(
            Registry::from_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_options_serialize_as_ollama_options() {
        let options = GenerationOptions {
            num_ctx: 8192,
            temperature: None,
        };
        assert_eq!(
            serde_json::to_value(options).unwrap(),
            serde_json::json!({"num_ctx": 8192})
        );
    }
}
