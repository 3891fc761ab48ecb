//! Model catalog: logical model names resolved from a JSON
//! configuration file into chat clients.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chat::ChatClient;
use crate::error::LlmError;
use crate::hosted::HostedApiClient;
use crate::local::LocalDaemonClient;

/// Provider family of a configured model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFamily {
    /// Cloud chat-completions API authenticated with an API key.
    HostedApi,

    /// Local inference daemon reached over plain HTTP.
    LocalDaemon,
}

/// One catalog entry. Hosted and local entries share the common fields;
/// family-specific fields are optional and validated on resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_family: ModelFamily,

    /// Provider-side model identifier.
    pub model: String,

    pub temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    // Hosted-api fields
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,

    // Local-daemon fields
    #[serde(default)]
    pub num_ctx: Option<u32>,
    #[serde(default)]
    pub num_predict: Option<i64>,
    #[serde(default)]
    pub num_batch: Option<u32>,

    // Optional pricing used for usage-cost accounting.
    #[serde(default)]
    pub prompt_cost_per_1k: Option<f64>,
    #[serde(default)]
    pub completion_cost_per_1k: Option<f64>,
}

/// Catalog of configured models, keyed by logical name.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: HashMap<String, ModelConfig>,
}

impl ModelCatalog {
    /// Load the catalog from a JSON file
    /// (`{ "<logical name>": { ...entry... }, ... }`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LlmError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LlmError::Config(format!("cannot read {}: {e}", path.display())))?;
        let models: HashMap<String, ModelConfig> = serde_json::from_str(&content)
            .map_err(|e| LlmError::Config(format!("cannot parse {}: {e}", path.display())))?;

        info!(path = %path.display(), models = models.len(), "Loaded model catalog");
        Ok(Self { models })
    }

    /// Build a catalog from entries directly (tests, embedding).
    pub fn from_entries(models: HashMap<String, ModelConfig>) -> Self {
        Self { models }
    }

    /// Look up a logical model name.
    pub fn get(&self, name: &str) -> Result<&ModelConfig, LlmError> {
        self.models
            .get(name)
            .ok_or_else(|| LlmError::UnknownModel(name.to_string()))
    }

    /// Resolve a logical model name into a chat client, optionally
    /// overriding the configured temperature.
    pub fn client(
        &self,
        name: &str,
        temperature: Option<f32>,
    ) -> Result<Box<dyn ChatClient>, LlmError> {
        let mut config = self.get(name)?.clone();

        if let Some(temperature) = temperature {
            config.temperature = temperature;
        }
        if !(0.0..=1.0).contains(&config.temperature) {
            return Err(LlmError::Config(format!(
                "model temperature must be in [0, 1], got {}",
                config.temperature
            )));
        }

        match config.model_family {
            ModelFamily::HostedApi => Ok(Box::new(HostedApiClient::new(name, config)?)),
            ModelFamily::LocalDaemon => Ok(Box::new(LocalDaemonClient::new(name, config)?)),
        }
    }
}
