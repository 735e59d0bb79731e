use anyhow::{Context, Result};
use atlas::api::routes::app;
use atlas::cli::init::{self, InitConfig, InitResult};
use atlas::cli::output::Output;
use atlas::cli::{Cli, Commands, RunArgs};
use atlas::graph::plan::parse_plan;
use atlas::rag::InMemoryRetriever;
use atlas::{
    AppState, AtlasConfig, AtlasConfigManager, ResearchGraph, ResearchRequest, ResearchSettings,
    RunOutcome,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Commands::Init {
            path,
            force,
            provider,
            host,
            port,
        } => {
            init_tracing(cli.debug, cli.log_json, "info");
            let result = init::run(
                InitConfig {
                    path,
                    force,
                    provider,
                    host,
                    port,
                },
                &output,
            );
            match result {
                InitResult::Error(e) => Err(anyhow::anyhow!(e)),
                _ => Ok(()),
            }
        }
        Commands::Graph => {
            println!("{}", ResearchGraph::mermaid());
            Ok(())
        }
        Commands::Config { validate } => show_config(&cli.config, validate, &output),
        Commands::Serve => {
            let manager = AtlasConfigManager::new(&cli.config)
                .with_context(|| format!("Failed to load {}", cli.config.display()))?;
            init_tracing(cli.debug, cli.log_json, &manager.config().server.log_level);
            serve(manager).await
        }
        Commands::Run(args) => {
            let config = AtlasConfig::load(&cli.config)
                .with_context(|| format!("Failed to load {}", cli.config.display()))?;
            init_tracing(cli.debug, cli.log_json, &config.server.log_level);
            run_research(&config, args, &output).await
        }
    }
}

/// RUST_LOG wins, then --debug, then the configured level
fn init_tracing(debug: bool, json: bool, level: &str) {
    let fallback = if debug {
        "atlas=debug,tower_http=debug".to_string()
    } else {
        format!("atlas={},tower_http={}", level, level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

async fn serve(mut manager: AtlasConfigManager) -> Result<()> {
    if let Err(e) = manager.start_watching() {
        tracing::warn!("Config hot-reload disabled: {}", e);
    }
    let config = manager.config();
    let graph = ResearchGraph::from_config(&config).await?;

    let state = AppState {
        config_manager: Arc::new(manager),
        graph: Arc::new(graph),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Atlas listening on http://{}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

async fn run_research(config: &AtlasConfig, args: RunArgs, output: &Output) -> Result<()> {
    let overrides = args.overrides();
    let settings = ResearchSettings::resolve(&config.research, &overrides);

    let mut request = ResearchRequest::new(args.query_text());
    request.overrides = overrides;

    let mut graph = ResearchGraph::from_config(config).await?;
    if !args.resources.is_empty() {
        let retriever = InMemoryRetriever::new();
        for path in &args.resources {
            let resource = retriever
                .add_file(path)
                .with_context(|| format!("Failed to read resource {}", path.display()))?;
            output.info(&format!("Loaded resource {}", resource.uri));
            request.resources.push(resource);
        }
        graph = graph.with_retriever(Arc::new(retriever));
    }

    let mut outcome = graph.run(request, settings).await?;
    loop {
        match outcome {
            RunOutcome::Completed { final_report, .. } => {
                output.report(&final_report);
                output.complete("Research complete");
                return Ok(());
            }
            RunOutcome::Ended { reply, .. } => {
                match reply {
                    Some(reply) => println!("{}", reply),
                    None => output.warning("The run ended without a report"),
                }
                return Ok(());
            }
            RunOutcome::Interrupted { thread_id, plan } => {
                match parse_plan(&plan) {
                    Ok(parsed) => output.plan(&parsed),
                    Err(_) => println!("{}", plan),
                }
                output.newline();
                let answer = match output.prompt("Accept the plan? [Y] or describe your edits:") {
                    Some(answer) => answer,
                    None => {
                        output.warning(&format!("Run {} left awaiting review", thread_id));
                        return Ok(());
                    }
                };
                let feedback = feedback_from_answer(&answer);
                outcome = graph.resume(&thread_id, &feedback).await?;
            }
        }
    }
}

fn feedback_from_answer(answer: &str) -> String {
    let answer = answer.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
    {
        "[ACCEPTED]".to_string()
    } else {
        format!("[EDIT_PLAN] {}", answer)
    }
}

fn show_config(path: &Path, validate: bool, output: &Output) -> Result<()> {
    let config = AtlasConfig::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    output.kv(
        "server",
        &format!("{}:{}", config.server.host, config.server.port),
    );

    output.subheader("Providers");
    let mut providers: Vec<_> = config.providers.keys().collect();
    providers.sort();
    for name in providers {
        output.list_item(name);
    }

    output.subheader("Models");
    let mut models: Vec<_> = config.models.iter().collect();
    models.sort_by(|a, b| a.0.cmp(b.0));
    for (kind, model) in models {
        let name = model.model.as_deref().unwrap_or("provider default");
        output.kv(kind, &format!("{} ({})", name, model.provider));
    }

    output.subheader("Research");
    let research = &config.research;
    output.kv("max_plan_iterations", &research.max_plan_iterations.to_string());
    output.kv("max_step_num", &research.max_step_num.to_string());
    output.kv("max_search_results", &research.max_search_results.to_string());
    output.kv("locale", &research.locale);

    if validate {
        output.newline();
        for warning in config.validate_with_warnings()? {
            output.warning(&warning.to_string());
        }
        output.success("Configuration is valid");
    }
    Ok(())
}
