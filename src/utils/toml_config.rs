//! TOML-based configuration for Atlas
//!
//! This module provides declarative configuration for providers, model kinds,
//! the agent-to-model mapping, research defaults, tools and checkpoint storage
//! via a TOML file (`atlas.toml`).
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `AtlasConfigManager` for thread-safe access to the current configuration.
//! Runs already in flight keep the settings they were started with.

use crate::llm::client::{AgentRole, ModelKind};
use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from atlas.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Model configurations keyed by model kind (basic, reasoning, code, vision)
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,

    /// Which model kind each agent role uses
    #[serde(default)]
    pub agents: AgentModelMap,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        default_model: String,
    },
    OpenAI {
        /// Environment variable containing the API key. Optional for
        /// OpenAI-compatible gateways that do not authenticate.
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default = "default_openai_base")]
        api_base: String,
        default_model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

// ============= Model Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model name/identifier to use with the provider. Falls back to the
    /// provider's `default_model` when omitted.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_model_max_tokens() -> u32 {
    4096
}

// ============= Agent → Model Mapping =============

/// Maps each agent role to the model kind it runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentModelMap {
    #[serde(default = "default_basic")]
    pub coordinator: ModelKind,
    #[serde(default = "default_basic")]
    pub planner: ModelKind,
    #[serde(default = "default_basic")]
    pub researcher: ModelKind,
    #[serde(default = "default_basic")]
    pub coder: ModelKind,
    #[serde(default = "default_basic")]
    pub reporter: ModelKind,
}

fn default_basic() -> ModelKind {
    ModelKind::Basic
}

impl Default for AgentModelMap {
    fn default() -> Self {
        Self {
            coordinator: ModelKind::Basic,
            planner: ModelKind::Basic,
            researcher: ModelKind::Basic,
            coder: ModelKind::Basic,
            reporter: ModelKind::Basic,
        }
    }
}

impl AgentModelMap {
    pub fn kind_for(&self, role: AgentRole) -> ModelKind {
        match role {
            AgentRole::Coordinator => self.coordinator,
            AgentRole::Planner => self.planner,
            AgentRole::Researcher => self.researcher,
            AgentRole::Coder => self.coder,
            AgentRole::Reporter => self.reporter,
        }
    }
}

// ============= Research Defaults =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_max_plan_iterations")]
    pub max_plan_iterations: u32,

    #[serde(default = "default_max_step_num")]
    pub max_step_num: usize,

    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    #[serde(default)]
    pub enable_deep_thinking: bool,

    #[serde(default = "default_true")]
    pub enable_background_investigation: bool,

    #[serde(default)]
    pub auto_accepted_plan: bool,

    /// Ceiling on node transitions for a whole graph run
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,

    /// Tool-loop ceiling for a single agent invocation. Signed so that
    /// non-positive values can be detected and replaced.
    #[serde(default = "default_agent_recursion_limit")]
    pub agent_recursion_limit: i64,

    #[serde(default = "default_planner_stream_timeout")]
    pub planner_stream_timeout_secs: u64,

    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_max_plan_iterations() -> u32 {
    1
}

fn default_max_step_num() -> usize {
    3
}

fn default_max_search_results() -> usize {
    3
}

fn default_recursion_limit() -> usize {
    100
}

fn default_agent_recursion_limit() -> i64 {
    25
}

fn default_planner_stream_timeout() -> u64 {
    300
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_plan_iterations: default_max_plan_iterations(),
            max_step_num: default_max_step_num(),
            max_search_results: default_max_search_results(),
            enable_deep_thinking: false,
            enable_background_investigation: true,
            auto_accepted_plan: false,
            recursion_limit: default_recursion_limit(),
            agent_recursion_limit: default_agent_recursion_limit(),
            planner_stream_timeout_secs: default_planner_stream_timeout(),
            locale: default_locale(),
        }
    }
}

// ============= Tool Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_python_timeout")]
    pub python_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_python_timeout() -> u64 {
    60
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout(),
            python_timeout_secs: default_python_timeout(),
            parallel_tool_calls: true,
        }
    }
}

// ============= Checkpoint Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_backend")]
    pub backend: CheckpointBackend,

    #[serde(default = "default_checkpoint_path")]
    pub path: String,

    /// Seconds a finished run stays in the memory backend. 0 keeps runs
    /// until they are deleted. The sqlite backend keeps every run.
    #[serde(default = "default_checkpoint_retention")]
    pub retention_secs: u64,
}

fn default_checkpoint_backend() -> CheckpointBackend {
    CheckpointBackend::Memory
}

fn default_checkpoint_path() -> String {
    "./data/checkpoints.db".to_string()
}

fn default_checkpoint_retention() -> u64 {
    3600
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: default_checkpoint_backend(),
            path: default_checkpoint_path(),
            retention_secs: default_checkpoint_retention(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    UnusedProvider,
    UnusedModel,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    #[error("Model kind '{0}' used by agent '{1}' has no [models.{0}] entry")]
    MissingModel(String, String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl AtlasConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without validating it
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        for provider in self.providers.values() {
            if let ProviderConfig::OpenAI {
                api_key_env: Some(env),
                ..
            } = provider
            {
                self.validate_env_var(env)?;
            }
        }

        for (kind_name, model_config) in &self.models {
            ModelKind::from_str(kind_name).map_err(|_| {
                ConfigError::ValidationError(format!(
                    "Unknown model kind '{}' (expected basic, reasoning, code or vision)",
                    kind_name
                ))
            })?;

            if !self.providers.contains_key(&model_config.provider) {
                return Err(ConfigError::MissingProvider(
                    model_config.provider.clone(),
                    kind_name.clone(),
                ));
            }
        }

        for role in AgentRole::ALL {
            let kind = self.agents.kind_for(role);
            if !self.models.contains_key(kind.as_str()) {
                return Err(ConfigError::MissingModel(
                    kind.as_str().to_string(),
                    role.as_str().to_string(),
                ));
            }
        }

        if self.research.enable_deep_thinking
            && !self.models.contains_key(ModelKind::Reasoning.as_str())
        {
            return Err(ConfigError::MissingModel(
                ModelKind::Reasoning.as_str().to_string(),
                AgentRole::Planner.as_str().to_string(),
            ));
        }

        if self.research.recursion_limit == 0 {
            return Err(ConfigError::ValidationError(
                "research.recursion_limit must be greater than zero".to_string(),
            ));
        }

        if self.checkpoint.backend == CheckpointBackend::Sqlite
            && self.checkpoint.path.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "checkpoint.path is required for the sqlite backend".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate configuration with warnings for unused items
    ///
    /// Returns Ok with warnings, or Err if validation fails
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(self.check_unused_providers());
        warnings.extend(self.check_unused_models());
        Ok(warnings)
    }

    /// Check for providers that aren't referenced by any model
    fn check_unused_providers(&self) -> Vec<ConfigWarning> {
        let referenced: HashSet<_> = self.models.values().map(|m| m.provider.as_str()).collect();

        self.providers
            .keys()
            .filter(|name| !referenced.contains(name.as_str()))
            .map(|name| ConfigWarning {
                kind: ConfigWarningKind::UnusedProvider,
                message: format!(
                    "Provider '{}' is defined but not referenced by any model",
                    name
                ),
            })
            .collect()
    }

    /// Check for model kinds that no agent role ends up using
    fn check_unused_models(&self) -> Vec<ConfigWarning> {
        let mut referenced: HashSet<&str> = AgentRole::ALL
            .iter()
            .map(|role| self.agents.kind_for(*role).as_str())
            .collect();
        if self.research.enable_deep_thinking {
            referenced.insert(ModelKind::Reasoning.as_str());
        }

        self.models
            .keys()
            .filter(|name| !referenced.contains(name.as_str()))
            .map(|name| ConfigWarning {
                kind: ConfigWarningKind::UnusedModel,
                message: format!(
                    "Model kind '{}' is defined but not used by any agent",
                    name
                ),
            })
            .collect()
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Get the model configuration for a model kind
    pub fn get_model(&self, kind: ModelKind) -> Option<&ModelConfig> {
        self.models.get(kind.as_str())
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct AtlasConfigManager {
    config: Arc<ArcSwap<AtlasConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
    reload_tx: Option<mpsc::UnboundedSender<()>>,
}

impl AtlasConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = AtlasConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
            reload_tx: None,
        })
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<AtlasConfig> {
        self.config.load_full()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = AtlasConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.reload_tx = Some(tx.clone());

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload = std::time::Instant::now();
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.elapsed() < debounce_duration {
                    continue;
                }

                // Let the writer finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match AtlasConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = std::time::Instant::now();
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: AtlasConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("atlas.toml"),
            watcher: RwLock::new(None),
            reload_tx: None,
        }
    }
}

impl Clone for AtlasConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
            reload_tx: self.reload_tx.clone(),
        }
    }
}
