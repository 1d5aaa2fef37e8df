use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use call_event_processor::{
    ProcessorConfig,
    core::{
        assist::WebhookAgentAssist,
        aws::load_sdk_config,
        events::EventNormalizer,
        mutation::{GraphQlGateway, RetryingGateway, default_conflict_predicate},
        sentiment::{ComprehendScorer, SentimentEnricher, SentimentScorer},
        state::{DynamoDbStateBackend, MemoryStateBackend, StateBackend, StateStore},
    },
    handlers::{BatchInput, BatchOrchestrator},
};

/// Call event processor - folds call event streams into per-call state
#[derive(Parser, Debug)]
#[command(name = "call-event-processor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process one batch and print the result as JSON
    Process {
        /// Batch input JSON (reads stdin if not specified)
        #[arg(short = 'i', long = "input", value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Load and validate configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only the batch output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ProcessorConfig::from_file(&config_path)?
    } else {
        ProcessorConfig::from_env()?
    };

    match cli.command {
        Commands::CheckConfig => {
            config.graphql_config()?;
            println!("Configuration OK");
            Ok(())
        }
        Commands::Process { input } => {
            let orchestrator = build_orchestrator(&config).await?;

            let raw = read_input(input).await?;
            let batch: BatchInput =
                serde_json::from_str(&raw).context("Failed to parse batch input")?;

            let output = orchestrator.handle_batch(batch).await;
            println!("{}", serde_json::to_string(&output)?);
            Ok(())
        }
    }
}

async fn build_orchestrator(config: &ProcessorConfig) -> anyhow::Result<BatchOrchestrator> {
    let sdk_config = load_sdk_config(&config.aws).await;

    let backend: Arc<dyn StateBackend> = match &config.state_table_name {
        Some(table) => {
            info!(table = %table, "Using DynamoDB state backend");
            Arc::new(DynamoDbStateBackend::new(&sdk_config, table.clone()))
        }
        None => {
            info!("STATE_TABLE_NAME not set, state will not survive this process");
            Arc::new(MemoryStateBackend::new())
        }
    };
    let store = StateStore::new(backend, config.state_store_config());

    let gateway = GraphQlGateway::connect(config.graphql_config()?)
        .await
        .map_err(|e| anyhow!("Mutation gateway unavailable: {e}"))?;
    let gateway = RetryingGateway::new(gateway, config.retry_policy())
        .with_ignore(default_conflict_predicate());

    let scorer: Option<Arc<dyn SentimentScorer>> = config
        .sentiment_enabled
        .then(|| Arc::new(ComprehendScorer::new(&sdk_config)) as Arc<dyn SentimentScorer>);
    let enricher = SentimentEnricher::new(scorer, config.sentiment_config());

    let mut orchestrator = BatchOrchestrator::new(
        EventNormalizer::new(config.normalizer_config()),
        enricher,
        Arc::new(gateway),
        store,
        config.aggregator_config(),
    );

    if let Some(url) = &config.agent_assist_url {
        let assist = WebhookAgentAssist::new(url, config.agent_assist_timeout())?;
        orchestrator = orchestrator.with_agent_assist(Arc::new(assist));
    }

    Ok(orchestrator)
}

async fn read_input(path: Option<PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read stdin")?;
            Ok(raw)
        }
    }
}
