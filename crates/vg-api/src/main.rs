//! Vantage HTTP API Service
//!
//! Entry point for the Vantage OSINT orchestration platform. Per §6 it
//! serves:
//! - `POST /chat`, this platform's own streaming/buffered endpoint
//! - `POST /v1/chat/completions`, `GET /v1/models`, an OpenAI-compatible
//!   surface
//! - `GET /health`, `GET /status`, `GET /history`, operational endpoints
//!
//! Grounded on `sr-oracles/src/main.rs`'s `clap::Parser`/`Subcommand` shape
//! for the CLI surface, and `sr-governor/src/main.rs`'s `shutdown_signal`
//! pattern for graceful shutdown.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vg_ports::Generator;

use vg_api::build_router;
use vg_api::config::AppConfig;
use vg_api::state::AppState;

#[derive(Parser)]
#[command(name = "vg-api")]
#[command(about = "Vantage OSINT orchestration platform API", long_about = None)]
struct Cli {
    /// Path to the platform YAML document (overrides `VG_CONFIG_PATH`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fail fast: surface embedder timeouts instead of degrading to empty
    /// retrieval, and refuse to start serving if the generation service is
    /// unreachable (exit code 3).
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server (default if no subcommand is given).
    Serve,
    /// Report configured corpora and workers, then exit.
    Status,
    /// Print the directory a corpus's ingested documents should land in.
    Index {
        #[arg(long)]
        corpus: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::from_env(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };
    config.strict_mode = config.strict_mode || cli.strict;

    init_tracing(&config);

    let command = cli.command.unwrap_or(Commands::Serve);

    match command {
        Commands::Serve => run_serve(config).await,
        Commands::Status => run_status(config).await,
        Commands::Index { corpus } => run_index(config, &corpus),
    }
}

fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = std::fs::create_dir_all(&config.logs_dir);
    let file_appender = tracing_appender::rolling::daily(&config.logs_dir, "vg-api.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    // Leak the guard: it must live for the process lifetime to keep
    // flushing the non-blocking writer, and this only runs once at startup.
    Box::leak(Box::new(guard));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.log_format_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .with(fmt::layer().json().with_writer(file_writer).with_ansi(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stdout))
            .with(fmt::layer().with_writer(file_writer).with_ansi(false))
            .init();
    }
}

async fn run_serve(config: AppConfig) -> ExitCode {
    let bind_addr = config.bind_addr.clone();
    let strict = config.strict_mode;
    let embedding_model_id = config.embedding_model_id.clone();

    let state = match AppState::build(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to build application state");
            return ExitCode::from(2);
        }
    };

    if strict {
        if let Err(e) = state.generator.embed("vantage startup reachability check", &embedding_model_id).await {
            tracing::error!(error = %e, "generation service unreachable at startup (--strict)");
            return ExitCode::from(3);
        }
    }

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "failed to bind");
            return ExitCode::from(2);
        }
    };

    tracing::info!(addr = %bind_addr, "vantage api listening");

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!(error = %e, "server error");
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}

async fn run_status(config: AppConfig) -> ExitCode {
    match AppState::build(config).await {
        Ok(state) => {
            println!("corpora configured: {}", state.config.platform.corpora.len());
            println!("workers configured: {}", state.config.platform.workers.len());
            for worker in &state.config.platform.workers {
                println!("  - {} (model={}, requires_evidence={})", worker.id, worker.model_id, worker.requires_evidence);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to build application state: {e}");
            ExitCode::from(2)
        }
    }
}

fn run_index(config: AppConfig, corpus_id: &str) -> ExitCode {
    let declared = config.platform.corpora.iter().find(|c| c.id == corpus_id);
    match declared {
        Some(c) => {
            println!("ingest documents for corpus '{corpus_id}' into: {}", c.path.display());
            println!("this crate does not ingest documents itself; point an external ingester at that path,");
            println!("writing manifest.json + records.jsonl under {}/vector_index/{corpus_id}/", config.data_dir.display());
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("no corpus named '{corpus_id}' in the platform document at {}", config.config_path.display());
            ExitCode::from(1)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
