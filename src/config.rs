//! Run configuration.
//!
//! Every field has a default so a config file only needs the values it
//! changes. CLI flags are applied on top by the binary; credentials never
//! live in the config file.
use crate::geocode::GOOGLE_GEOCODE_ENDPOINT;
use crate::pipeline::GeocodeFailurePolicy;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub schema_version: u32,
    /// Posts processed between checkpoint snapshots.
    pub checkpoint_interval: usize,
    /// Region bias for geocoding; `null` sends no hint.
    pub region: Option<String>,
    pub language: String,
    pub geocode_failure: GeocodeFailurePolicy,
    pub completion: CompletionConfig,
    pub geocode: GeocodeConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            region: Some("us".to_string()),
            language: "en".to_string(),
            geocode_failure: GeocodeFailurePolicy::default(),
            completion: CompletionConfig::default(),
            geocode: GeocodeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Local LM command; replaces the HTTP endpoint when set.
    pub command: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            timeout_secs: 60,
            command: None,
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeocodeConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            endpoint: GOOGLE_GEOCODE_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl GeocodeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Service keys handed to the pipeline at construction.
///
/// The completion key may be absent when a local LM command is configured.
#[derive(Clone)]
pub struct Credentials {
    pub maps_api_key: String,
    pub completion_api_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("maps_api_key", &"<redacted>")
            .field(
                "completion_api_key",
                &self.completion_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Render the default config as pretty JSON.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&RunConfig::default()).context("serialize config stub")
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: RunConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &RunConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.checkpoint_interval == 0 {
        return Err(anyhow!("checkpoint_interval must be at least 1"));
    }
    if config.language.trim().is_empty() {
        return Err(anyhow!("language must be non-empty"));
    }
    if config
        .region
        .as_deref()
        .is_some_and(|region| region.trim().is_empty())
    {
        return Err(anyhow!("region must be non-empty when set (use null for no hint)"));
    }
    match config.completion.command.as_deref() {
        Some(command) if command.trim().is_empty() => {
            return Err(anyhow!("completion.command must be non-empty when set"));
        }
        Some(_) => {}
        None => {
            if config.completion.base_url.trim().is_empty() {
                return Err(anyhow!("completion.base_url must be non-empty"));
            }
            if config.completion.model.trim().is_empty() {
                return Err(anyhow!("completion.model must be non-empty"));
            }
        }
    }
    if config.completion.timeout_secs == 0 || config.geocode.timeout_secs == 0 {
        return Err(anyhow!("timeouts must be at least one second"));
    }
    if config.geocode.endpoint.trim().is_empty() {
        return Err(anyhow!("geocode.endpoint must be non-empty"));
    }
    Ok(())
}
