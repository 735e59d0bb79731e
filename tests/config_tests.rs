//! Integration tests for the TOML configuration system
//!
//! These tests verify that configuration works end-to-end:
//! - Loading and validation
//! - Role to model-kind routing
//! - Agent creation from config against a mocked provider
//! - Graph construction from config

use atlas::agents::{Agent, AgentFactory, AgentKind, AgentSetup};
use atlas::tools::Tool;
use atlas::llm::{AgentRole, LLMClientFactoryTrait, ModelKind};
use atlas::utils::toml_config::{ConfigError, ConfigWarningKind};
use atlas::{AgentRegistry, AtlasConfig, AtlasConfigManager, ConfigBasedLLMFactory, ResearchGraph};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test helper: a valid configuration pointing at `base_url`
fn config_toml(base_url: &str) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = 8000

[providers.local]
type = "ollama"
base_url = "{base_url}"
default_model = "qwen2.5"

[providers.spare]
type = "ollama"
default_model = "llama3.2"

[models.basic]
provider = "local"

[models.reasoning]
provider = "local"
model = "qwen3:thinking"
temperature = 0.6

[models.vision]
provider = "local"

[agents]
planner = "reasoning"

[research]
max_plan_iterations = 2
max_step_num = 4

[checkpoint]
backend = "memory"
"#
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_loads_and_validates() {
    let file = write_config(&config_toml("http://localhost:11434"));
    let config = AtlasConfig::load(file.path()).unwrap();

    assert_eq!(config.research.max_plan_iterations, 2);
    assert_eq!(config.research.max_step_num, 4);
    assert_eq!(config.agents.kind_for(AgentRole::Planner), ModelKind::Reasoning);
    assert_eq!(config.agents.kind_for(AgentRole::Reporter), ModelKind::Basic);
    assert_eq!(config.checkpoint.retention_secs, 3600);
}

#[test]
fn test_checkpoint_retention_can_be_disabled() {
    let content = config_toml("http://localhost:11434").replace(
        "backend = \"memory\"",
        "backend = \"memory\"\nretention_secs = 0",
    );
    let config = AtlasConfig::from_toml_str(&content).unwrap();
    assert_eq!(config.checkpoint.retention_secs, 0);
}

#[test]
fn test_config_with_warnings() {
    let config = AtlasConfig::from_toml_str(&config_toml("http://localhost:11434")).unwrap();
    let warnings = config.validate_with_warnings().unwrap();

    assert!(warnings
        .iter()
        .any(|w| w.kind == ConfigWarningKind::UnusedProvider && w.message.contains("spare")));
    assert!(warnings
        .iter()
        .any(|w| w.kind == ConfigWarningKind::UnusedModel && w.message.contains("vision")));
}

#[test]
fn test_missing_model_for_role_rejected() {
    let content = config_toml("http://localhost:11434").replace(
        "planner = \"reasoning\"",
        "planner = \"reasoning\"\ncoder = \"code\"",
    );
    let config = AtlasConfig::from_toml_str(&content).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingModel(kind, role)) if kind == "code" && role == "coder"
    ));
}

#[test]
fn test_missing_file_rejected() {
    assert!(matches!(
        AtlasConfig::load("/definitely/not/here/atlas.toml"),
        Err(ConfigError::FileNotFound(_))
    ));
}

#[test]
fn test_factory_routes_roles_to_kinds() {
    let config = AtlasConfig::from_toml_str(&config_toml("http://localhost:11434")).unwrap();
    let factory = ConfigBasedLLMFactory::from_config(&config);

    assert_eq!(factory.model_kind(AgentRole::Planner), ModelKind::Reasoning);
    assert_eq!(factory.model_kind(AgentRole::Researcher), ModelKind::Basic);
}

#[tokio::test]
async fn test_factory_uses_model_override_and_default_model() {
    let config = AtlasConfig::from_toml_str(&config_toml("http://localhost:11434")).unwrap();
    let factory = ConfigBasedLLMFactory::from_config(&config);

    let planner = factory.create_for_role(AgentRole::Planner).await.unwrap();
    assert_eq!(planner.model_name(), "qwen3:thinking");
    let reporter = factory.create_for_role(AgentRole::Reporter).await.unwrap();
    assert_eq!(reporter.model_name(), "qwen2.5");
    assert!(factory.create_for_kind(ModelKind::Code).await.is_err());
}

#[tokio::test]
async fn test_full_integration_config_to_agent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "The mean is 4.2"},
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let config = AtlasConfig::from_toml_str(&config_toml(&server.uri())).unwrap();
    let llm: Arc<dyn LLMClientFactoryTrait> = Arc::new(ConfigBasedLLMFactory::from_config(&config));
    let registry = AgentRegistry::new(llm, config.tools.clone());

    let setup = AgentSetup {
        recursion_limit: 5,
        locale: "en-US".to_string(),
        ..Default::default()
    };
    let tools: Vec<String> = registry
        .builtin_tools(AgentKind::Coder, &setup)
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    assert_eq!(tools, vec!["python_repl_tool".to_string()]);

    let agent = registry.create_agent(AgentKind::Coder, setup).await.unwrap();
    assert_eq!(agent.name(), "coder");
    let output = agent
        .invoke(vec![atlas::llm::ConversationMessage::user("Average 3, 4.4 and 5.2")])
        .await
        .unwrap();
    assert_eq!(output.final_content(), "The mean is 4.2");
}

#[tokio::test]
async fn test_graph_from_config() {
    let config = AtlasConfig::from_toml_str(&config_toml("http://localhost:11434")).unwrap();
    let graph = ResearchGraph::from_config(&config).await.unwrap();
    assert!(graph.is_checkpointed());
    assert!(graph.get("unknown").await.unwrap().is_none());
}

#[test]
fn test_config_manager_access() {
    let file = write_config(&config_toml("http://localhost:11434"));
    let manager = AtlasConfigManager::new(file.path()).unwrap();
    assert_eq!(manager.config().research.max_step_num, 4);

    let updated = config_toml("http://localhost:11434")
        .replace("max_step_num = 4", "max_step_num = 6");
    std::fs::write(file.path(), updated).unwrap();
    manager.reload().unwrap();
    assert_eq!(manager.config().research.max_step_num, 6);
}
