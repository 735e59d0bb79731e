//! Init command implementation
//!
//! Scaffolds a new Atlas project: `atlas.toml`, `.env.example` and a
//! `.gitignore`.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (atlas.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure (ollama, openai, or both)
    pub provider: String,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Atlas Project");

    let base_path = &config.path;
    let config_path = base_path.join("atlas.toml");
    if config_path.exists() && !config.force {
        output.warning("atlas.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");
    let data_dir = base_path.join("data");
    if data_dir.exists() {
        output.skipped("data", "already exists");
    } else {
        if let Err(e) = fs::create_dir_all(&data_dir) {
            output.error(&format!("Failed to create data: {}", e));
            return InitResult::Error(e.to_string());
        }
        output.created_dir("data");
    }

    output.subheader("Creating configuration files");
    if let Err(e) = write_file(&config_path, &generate_atlas_toml(&config), config.force) {
        output.error(&format!("Failed to create atlas.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "atlas.toml");

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, generate_gitignore(), false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("Atlas project initialized successfully!");

    output.header("Next Steps");
    output.newline();
    output.info("1. Set up environment variables:");
    output.command("cp .env.example .env");
    output.newline();
    if config.provider != "openai" {
        output.info("2. Start Ollama (if not running):");
        output.command("ollama serve");
        output.command("ollama pull qwen2.5:7b  # or your preferred model");
        output.newline();
    }
    output.info("3. Run a research query, or start the server:");
    output.command("atlas run \"What is the current state of Rust in the Linux kernel?\"");
    output.command("atlas serve");
    output.hint(&format!(
        "Server will be available at http://{}:{}",
        config.host, config.port
    ));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

pub(crate) fn generate_atlas_toml(config: &InitConfig) -> String {
    let ollama = r#"# Ollama - local inference (no API key required)
[providers.ollama-local]
type = "ollama"
base_url = "http://localhost:11434"
default_model = "qwen2.5:7b"
"#;
    let openai = r#"# OpenAI API (set OPENAI_API_KEY in .env)
[providers.openai]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
default_model = "gpt-4o-mini"
"#;
    let provider_section = match config.provider.as_str() {
        "openai" => openai.to_string(),
        "both" => format!("{}\n{}", ollama, openai),
        _ => ollama.to_string(),
    };
    let (model_provider, reasoning_model) = if config.provider == "openai" {
        ("openai", "o3-mini")
    } else {
        ("ollama-local", "qwen3:8b")
    };

    format!(
        r#"# Atlas Configuration
# ====================
# Generated by: atlas init
#
# Changes to this file are picked up by `atlas serve` without a restart.

[server]
host = "{host}"
port = {port}
log_level = "info"

# =============================================================================
# LLM Providers
# =============================================================================
{provider_section}
# =============================================================================
# Models, keyed by kind (basic, reasoning, code, vision)
# =============================================================================
[models.basic]
provider = "{model_provider}"
temperature = 0.0
max_tokens = 4096

[models.reasoning]
provider = "{model_provider}"
model = "{reasoning_model}"
temperature = 0.0
max_tokens = 8192

# =============================================================================
# Model kind used by each role
# =============================================================================
[agents]
coordinator = "basic"
planner = "basic"
researcher = "basic"
coder = "basic"
reporter = "basic"

# =============================================================================
# Research defaults (overridable per run and through environment variables)
# =============================================================================
[research]
max_plan_iterations = 1
max_step_num = 3
max_search_results = 3
enable_deep_thinking = false
enable_background_investigation = true
auto_accepted_plan = false
recursion_limit = 100
agent_recursion_limit = 25
planner_stream_timeout_secs = 300
locale = "en-US"

[tools]
tool_timeout_secs = 30
python_timeout_secs = 60
parallel_tool_calls = true

[checkpoint]
backend = "sqlite"
path = "./data/checkpoints.db"
# finished runs kept by the memory backend, in seconds (0 = forever)
retention_secs = 3600
"#,
        host = config.host,
        port = config.port,
        provider_section = provider_section,
        model_provider = model_provider,
        reasoning_model = reasoning_model,
    )
}

fn generate_env_example() -> &'static str {
    r#"# Atlas Environment Variables
# ===========================
# Copy this file to .env and fill in the values.

# Optional: Logging level (trace, debug, info, warn, error)
RUST_LOG=info,atlas=debug

# Optional: OpenAI API key (if using the OpenAI provider)
# OPENAI_API_KEY=sk-...

# Optional: research overrides (take precedence over atlas.toml)
# MAX_PLAN_ITERATIONS=1
# MAX_STEP_NUM=3
# MAX_SEARCH_RESULTS=3
# ENABLE_DEEP_THINKING=false
# ENABLE_BACKGROUND_INVESTIGATION=true
# AUTO_ACCEPTED_PLAN=false
# RECURSION_LIMIT=100
# AGENT_RECURSION_LIMIT=25
"#
}

fn generate_gitignore() -> &'static str {
    r#"# Atlas Generated Files
/data/
*.db
*.db-journal

# Environment
.env
.env.local

# Rust
/target/
"#
}
