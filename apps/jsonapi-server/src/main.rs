use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use accounts::AccountsModule;
use anyhow::{Context, Result};
use api_ingress::{ApiIngress, ApiIngressConfig};
use clap::{Parser, Subcommand};
use jsonapi_kit::JsonApi;
use runtime::{AppConfig, CliArgs};
use tokio_util::sync::CancellationToken;

/// JSON:API server hosting the accounts resources
#[derive(Parser)]
#[command(name = "jsonapi-server")]
#[command(about = "JSON:API server hosting the accounts resources")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
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
    /// Check configuration and resource registration
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

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let home_dir = Path::new(&config.server.home_dir);
    match &config.logging {
        Some(logging) => runtime::init_logging_from_config(logging, home_dir),
        None => runtime::init_default_logging(home_dir),
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "jsonapi-server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, args).await,
        Commands::Check => check_config(config, args),
    }
}

/// Module configs, resource registration and the host router, ready to serve.
fn build_host(config: &AppConfig, args: &CliArgs) -> Result<ApiIngress> {
    let accounts = AccountsModule::from_app_config(config)?;
    let mut ingress_cfg = ApiIngressConfig::from_app_config(config)?;
    if let Some(port) = args.port {
        ingress_cfg = ingress_cfg.with_port(port)?;
    }

    let mut app = JsonApi::new().with_url_prefix(ingress_cfg.url_prefix.clone());
    accounts
        .register(&mut app)
        .context("failed to register accounts resources")?;
    let app = app.freeze().context("failed to build JSON:API router")?;
    tracing::info!(
        operations = app.operations().len(),
        base_path = %accounts.config().base_path,
        "JSON:API application ready"
    );

    let host = ApiIngress::new(ingress_cfg);
    host.set_openapi(app.openapi("jsonapi-server", env!("CARGO_PKG_VERSION")));
    host.build_router(app.into_router());
    Ok(host)
}

async fn run_server(config: AppConfig, args: CliArgs) -> Result<()> {
    let host = Arc::new(build_host(&config, &args)?);
    let listener = host.bind().await?;

    let cancel = CancellationToken::new();
    let mut server = tokio::spawn(host.serve_on(listener, cancel.clone()));

    tokio::select! {
        res = &mut server => return res.context("server task failed")?,
        _ = shutdown_signal() => tracing::info!("shutdown signal received"),
    }
    cancel.cancel();

    // timeout_sec == 0 waits for in-flight requests indefinitely
    match config.server.timeout_sec {
        0 => server.await.context("server task failed")?,
        secs => match tokio::time::timeout(Duration::from_secs(secs), &mut server).await {
            Ok(res) => res.context("server task failed")?,
            Err(_) => {
                tracing::warn!(timeout_sec = secs, "graceful shutdown timed out; aborting");
                server.abort();
                Ok(())
            }
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn check_config(config: AppConfig, args: CliArgs) -> Result<()> {
    tracing::info!("Checking configuration...");
    let host = build_host(&config, &args)?;
    println!("Configuration check passed");
    println!("Listening address: {}", host.config().bind_addr);
    println!("{}", config.to_yaml()?);
    Ok(())
}
