//! Provider Registry for managing multiple LLM providers
//!
//! This module resolves the `[agents]` → `[models.<kind>]` → `[providers.<name>]`
//! chain from `atlas.toml` into concrete clients. [`ConfigBasedLLMFactory`] is
//! the role-keyed factory that the research graph receives at construction
//! time; no clients are cached process-wide.

use crate::llm::client::{
    AgentRole, GenerationParams, LLMClient, LLMClientFactoryTrait, ModelKind, Provider,
};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{AgentModelMap, AtlasConfig, ModelConfig, ProviderConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of named providers and per-kind model configurations
pub struct ProviderRegistry {
    /// Provider configurations keyed by name
    providers: HashMap<String, ProviderConfig>,
    /// Model configurations keyed by model kind
    models: HashMap<ModelKind, ModelConfig>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            models: HashMap::new(),
        }
    }

    /// Create a provider registry from TOML configuration.
    ///
    /// Model entries whose key is not a known kind are skipped; validation
    /// already rejects them when the file is loaded.
    pub fn from_config(config: &AtlasConfig) -> Self {
        let models = config
            .models
            .iter()
            .filter_map(|(name, model)| name.parse::<ModelKind>().ok().map(|k| (k, model.clone())))
            .collect();

        Self {
            providers: config.providers.clone(),
            models,
        }
    }

    /// Register a provider configuration
    pub fn register_provider(&mut self, name: &str, config: ProviderConfig) {
        self.providers.insert(name.to_string(), config);
    }

    /// Register the model configuration for a kind
    pub fn register_model(&mut self, kind: ModelKind, config: ModelConfig) {
        self.models.insert(kind, config);
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn get_model(&self, kind: ModelKind) -> Option<&ModelConfig> {
        self.models.get(&kind)
    }

    pub fn has_model(&self, kind: ModelKind) -> bool {
        self.models.contains_key(&kind)
    }

    /// Resolve the provider for a model kind without creating a client
    pub fn resolve(&self, kind: ModelKind) -> Result<Provider> {
        let model_config = self.get_model(kind).ok_or_else(|| {
            AppError::Configuration(format!("No [models.{}] entry in configuration", kind))
        })?;

        let provider_config = self.get_provider(&model_config.provider).ok_or_else(|| {
            AppError::Configuration(format!(
                "Provider '{}' referenced by model '{}' not found",
                model_config.provider, kind
            ))
        })?;

        provider_from_config(model_config, provider_config)
    }

    /// Create an LLM client for a model kind
    pub fn create_client_for_kind(&self, kind: ModelKind) -> Result<Box<dyn LLMClient>> {
        self.resolve(kind)?.create_client()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn provider_from_config(model: &ModelConfig, provider: &ProviderConfig) -> Result<Provider> {
    let params = GenerationParams {
        temperature: model.temperature,
        max_tokens: model.max_tokens,
    };

    match provider {
        ProviderConfig::OpenAI {
            api_key_env,
            api_base,
            default_model,
        } => {
            let api_key = match api_key_env {
                Some(env) => Some(std::env::var(env).map_err(|_| {
                    AppError::Configuration(format!("Environment variable '{}' is not set", env))
                })?),
                None => None,
            };
            Ok(Provider::OpenAI {
                api_key,
                api_base: api_base.clone(),
                model: model.model.clone().unwrap_or_else(|| default_model.clone()),
                params,
            })
        }
        ProviderConfig::Ollama {
            base_url,
            default_model,
        } => Ok(Provider::Ollama {
            base_url: base_url.clone(),
            model: model.model.clone().unwrap_or_else(|| default_model.clone()),
            params,
        }),
    }
}

/// LLM client factory driven by `atlas.toml`
pub struct ConfigBasedLLMFactory {
    registry: Arc<ProviderRegistry>,
    agents: AgentModelMap,
}

impl ConfigBasedLLMFactory {
    pub fn new(registry: Arc<ProviderRegistry>, agents: AgentModelMap) -> Self {
        Self { registry, agents }
    }

    /// Create a factory from TOML configuration
    pub fn from_config(config: &AtlasConfig) -> Self {
        Self {
            registry: Arc::new(ProviderRegistry::from_config(config)),
            agents: config.agents.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }
}

#[async_trait]
impl LLMClientFactoryTrait for ConfigBasedLLMFactory {
    fn model_kind(&self, role: AgentRole) -> ModelKind {
        self.agents.kind_for(role)
    }

    async fn create_for_kind(&self, kind: ModelKind) -> Result<Box<dyn LLMClient>> {
        self.registry.create_client_for_kind(kind)
    }
}
