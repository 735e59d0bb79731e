//! CLI module for Atlas
//!
//! Provides command-line interface parsing for the `atlas` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use crate::utils::settings::RunOverrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Atlas - multi-agent deep research
///
/// Plans a research task, dispatches the steps to research and code agents,
/// and writes a final report.
#[derive(Parser, Debug)]
#[command(
    name = "atlas",
    version,
    about = "Atlas - multi-agent deep research assistant",
    after_help = "EXAMPLES:\n    \
                  atlas init                            # Scaffold atlas.toml\n    \
                  atlas run \"What is new in Rust 1.85?\" # Research a question\n    \
                  atlas run --interactive \"...\"         # Review the plan before execution\n    \
                  atlas serve                           # Start the HTTP API\n    \
                  atlas graph                           # Print the graph as Mermaid"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "atlas.toml", global = true)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the report
    Run(RunArgs),

    /// Start the HTTP API server
    Serve,

    /// Print the research graph as a Mermaid flowchart
    Graph,

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Initialize a new Atlas project with a configuration file
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (ollama, openai, or both)
        #[arg(long, default_value = "ollama")]
        provider: String,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "8000")]
        port: u16,
    },
}

/// Arguments of `atlas run`
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// The research question
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Maximum number of planning iterations
    #[arg(long)]
    pub max_plan_iterations: Option<u32>,

    /// Maximum number of steps in a plan
    #[arg(long)]
    pub max_step_num: Option<usize>,

    /// Maximum number of web search results per search
    #[arg(long)]
    pub max_search_results: Option<usize>,

    /// Skip the web search before planning
    #[arg(long)]
    pub no_background_investigation: bool,

    /// Plan with the reasoning model
    #[arg(long)]
    pub deep_thinking: bool,

    /// Review the plan before it is executed
    #[arg(short, long)]
    pub interactive: bool,

    /// Report locale, e.g. en-US
    #[arg(long)]
    pub locale: Option<String>,

    /// Local files the researcher may search
    #[arg(long = "resource", value_name = "FILE")]
    pub resources: Vec<PathBuf>,
}

impl RunArgs {
    pub fn query_text(&self) -> String {
        self.query.join(" ")
    }

    /// Per-run overrides; flags that are not given leave the setting to env/config
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            max_plan_iterations: self.max_plan_iterations,
            max_step_num: self.max_step_num,
            max_search_results: self.max_search_results,
            enable_deep_thinking: self.deep_thinking.then_some(true),
            enable_background_investigation: self.no_background_investigation.then_some(false),
            auto_accepted_plan: Some(!self.interactive),
            locale: self.locale.clone(),
        }
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
