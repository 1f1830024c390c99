//! Thing API server.
//!
//! ```text
//! thing-api [--config FILE] [api|version]
//! ```
//!
//! Startup order: configuration, logger, crypto provider, store, request
//! logging pipeline, routes, listener. Any startup failure is logged and the
//! process exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use thing_api::config::{config_warnings, load_config, AppConfig};
use thing_api::net::tls;
use thing_api::observability::logging;
use thing_api::{rpc, store, InterceptorChain, LoggingPipeline, Server};

#[derive(Parser)]
#[command(name = "thing-api")]
#[command(about = "gRPC and REST API for things", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server (default)
    Api,
    /// Print the version and exit
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("{}", rpc::VERSION);
        return ExitCode::SUCCESS;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Could not load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logger) {
        eprintln!("Could not initialize logger: {e}");
        return ExitCode::FAILURE;
    }
    for warning in config_warnings(&config) {
        tracing::warn!("{warning}");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        version = rpc::VERSION,
        host = %config.listener.bind_host(),
        port = config.listener.port,
        tls = config.listener.tls,
        storage = ?config.storage.kind,
        "thing-api starting"
    );

    tls::install_crypto_provider();

    let store = store::open_store(&config.storage).await?;

    let chain = LoggingPipeline::from_config(&config.request_log)
        .with_body_limit(config.http.max_body_size)
        .install(InterceptorChain::new());
    if chain.is_empty() {
        tracing::info!("Request logging disabled");
    }
    let mut server = Server::new(&config, chain);
    rpc::setup_routes(&mut server, store);

    let running = server.listen_and_serve().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        open_connections = running.active_connections(),
        "Shutdown signal received"
    );
    running.shutdown();
    Ok(())
}
