// CVEMAP-RELAY: Streaming Text-Command Front End for Vulnerability Lookup
// Copyright (c) 2025 CVEMAP-RELAY Core Team

use clap::Parser;
use cvemap_relay::{
    client::LookupClient,
    command::CommandRecognizer,
    config::RelayConfig,
    derive::{derive_command, Derivation, OpenAiCommandModel},
    error::{Error, Result},
    stream::ResultStreamAssembler,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        tracing::error!("Error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize logging system based on verbosity level
/// - 0: errors only
/// - 1 (-v): INFO + WARN logs
/// - 2 (-vv): + DEBUG logs
/// - 3+ (-vvv): + TRACE logs (everything)
fn init_logging(cli: &Cli) -> Result<()> {
    let filter_str = match cli.verbose {
        0 => "error".to_string(),
        1 => "cvemap_relay=info".to_string(),
        2 => "cvemap_relay=debug".to_string(),
        _ => "cvemap_relay=trace".to_string(),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Run the CLI command
async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config)?;
    config.validate()?;

    match cli.command {
        Commands::Query(args) => {
            let line = args.line.join(" ");
            run_query(config, &line, None).await?;
        }
        Commands::Ask(args) => {
            let question = args.question.join(" ");
            run_ask(config, &question, args.model, args.api_key).await?;
        }
        Commands::Version => {
            println!("cvr {}", cvemap_relay::VERSION);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<RelayConfig> {
    match path {
        Some(path) => RelayConfig::from_file(path),
        None => Ok(RelayConfig::from_env()),
    }
}

/// Drive one command line and print the chunk stream to stdout.
async fn run_query(config: RelayConfig, line: &str, preamble: Option<String>) -> Result<()> {
    let recognizer = CommandRecognizer::new();
    if !recognizer.is_command(line) {
        return Err(Error::config(format!(
            "Not a /cvemap command line: {:?}",
            line
        )));
    }

    let client = LookupClient::new(&config)?;
    let assembler = ResultStreamAssembler::new(config, Arc::new(client));
    let mut response = assembler.handle(line, preamble);

    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = response.chunks.recv().await {
        stdout.write_all(chunk.as_bytes()).await?;
        stdout.flush().await?;
    }

    let outcome = response
        .outcome
        .await
        .map_err(|e| Error::Model(format!("Stream task failed: {}", e)))?;
    tracing::info!("stream finished: {:?}", outcome_label(&outcome));

    Ok(())
}

/// Rewrite a plain-English question into a command line, then drive it.
async fn run_ask(config: RelayConfig, question: &str, model: String, api_key: String) -> Result<()> {
    if api_key.is_empty() {
        return Err(Error::config(
            "No API key provided. Set OPENAI_API_KEY or pass --api-key.",
        ));
    }

    let model = OpenAiCommandModel::new(api_key, model)?;
    match derive_command(&model, question).await? {
        Derivation::Command(derived) => {
            tracing::info!("derived command: {}", derived.command);
            run_query(config, &derived.command, derived.preamble).await
        }
        Derivation::Passthrough(text) => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn outcome_label(outcome: &cvemap_relay::stream::StreamOutcome) -> &'static str {
    use cvemap_relay::stream::StreamOutcome;
    match outcome {
        StreamOutcome::Disabled => "disabled",
        StreamOutcome::Help => "help",
        StreamOutcome::InvalidInput => "invalid-input",
        StreamOutcome::Empty => "empty",
        StreamOutcome::Results { .. } => "results",
        StreamOutcome::Failed => "failed",
    }
}
