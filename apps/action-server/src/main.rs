use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use actionkit_bootstrap::{AppConfig, CliArgs};
use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

// Linked for its `register_controller!` submissions.
use home as _;

mod server;

/// Action Server - serves `Handler@action` routes over HTTP
#[derive(Parser)]
#[command(name = "action-server")]
#[command(about = "Action Server - serves Handler@action routes over HTTP")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and routes, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // defaults -> YAML (if given) -> env (APP__*) -> CLI
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    let log_base = cli
        .config
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    actionkit_bootstrap::init_logging(&logging_config, &log_base);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(&config),
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Action Server starting");

    let pool = match &config.database {
        Some(db) => Some(server::connect_pool(db).await?),
        None => {
            tracing::warn!("no database section; handlers run without a pool");
            None
        }
    };

    let app = server::build_app(&config, pool.clone())?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, routes = config.routes.len(), "HTTP server bound");

    let shutdown = async {
        if let Err(e) = actionkit_bootstrap::wait_for_shutdown().await {
            tracing::error!(error = %e, "signal handling failed; shutting down");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("Action Server stopped");
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    let router = server::action_router(config, None)?;
    println!("Configuration is valid");
    for route in router.routes() {
        println!("  {} {} -> {}", route.method, route.path, route.action);
    }
    Ok(())
}
