mod config;

use clap::{Parser, Subcommand, ValueEnum};
use config::CouncilConfig;
use council_agent::CompletionGateway;
use council_core::{TaskKind, TaskStatus};
use council_gateway::GatewayServer;
use council_orchestrator::{JsonFileRegistryStore, Orchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "council", about = "Council — task orchestration and agent council engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "council.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the agent roster
    Agents,
    /// Run one request to completion and print the answer
    Run {
        /// The request text
        prompt: String,
        /// Convene a council instead of routing to a single agent
        #[arg(long)]
        council: bool,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn build_orchestrator(
    config: &CouncilConfig,
    config_dir: &Path,
) -> anyhow::Result<Orchestrator> {
    let gateway = CompletionGateway::from_configs(config.engines.clone())?;
    if gateway.engines().is_empty() {
        warn!("No engines configured; every task will fail");
    }
    let registry_path = config.registry_path_in(config_dir);
    info!(
        path = %registry_path.display(),
        engines = ?gateway.engines(),
        "Loading agent registry"
    );

    let store = Arc::new(JsonFileRegistryStore::new(registry_path));
    Ok(Orchestrator::load(store, gateway, config.orchestrator.clone()).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    // A missing .env is fine; keys may come from the environment or config.
    let _ = dotenvy::dotenv();

    let config = CouncilConfig::load(&cli.config).await?;
    let config_dir = cli
        .config
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let orchestrator = build_orchestrator(&config, &config_dir).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);
            let app = GatewayServer::build(Arc::new(orchestrator));

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Council gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Agents => {
            let agents = orchestrator.list_agents();
            println!("Agents:");
            for agent in &agents {
                let mut specialties = agent.primary_specialty.clone();
                if !agent.secondary_specialties.is_empty() {
                    specialties =
                        format!("{specialties} ({})", agent.secondary_specialties.join(", "));
                }
                println!(
                    "  {} — {} [engine: {}]",
                    agent.name, specialties, agent.current_engine
                );
                for bundle in &agent.knowledge_bundles {
                    println!(
                        "    knowledge: {} ({})",
                        bundle.display_name, bundle.source_path
                    );
                }
            }
            println!("\nTotal: {} agent(s)", agents.len());
        }
        Commands::Run { prompt, council } => {
            let kind = if council {
                TaskKind::Council
            } else {
                TaskKind::Single
            };
            let task = orchestrator.create_task(&prompt, kind);
            orchestrator.wait_idle().await;

            let task = orchestrator
                .get_task(task.id)
                .ok_or_else(|| anyhow::anyhow!("task {} disappeared", task.id))?;
            let output = task
                .output
                .ok_or_else(|| anyhow::anyhow!("task {} finished without output", task.id))?;

            if task.status == TaskStatus::Failed {
                anyhow::bail!("Task failed: {}", output.content);
            }
            if let Some(agent) = &task.assigned_agent {
                println!("[{agent}]");
            }
            for contribution in output.council_transcript.iter().flatten() {
                println!("[{}]\n{}\n", contribution.agent_name, contribution.response);
            }
            if !task.council_members.is_empty() {
                println!("[council: {}]", task.council_members.join(", "));
            }
            println!("{}", output.content);
        }
    }

    Ok(())
}
