//! rds-dashboard main entry point
//!
//! This binary handles CLI parsing, logging setup, configuration loading
//! and running the HTTP server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rds_dashboard::config::Config;
use rds_dashboard::control::{shutdown_signal, ActionRouter, DashboardServer};
use rds_dashboard::delegate::ProcessDelegate;
use rds_dashboard::{APP_NAME, VERSION};

/// HTTP dashboard for locally managed RDS engines
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Optional TOML configuration file (environment variables take precedence)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Print the status of every configured engine as JSON
    Status,

    /// Load and validate configuration, then print a summary
    CheckConfig,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Execute command
    if let Err(e) = run(cli).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the CLI command
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config;
    let load = || -> anyhow::Result<(Arc<Config>, ProcessDelegate)> {
        let config = Arc::new(Config::load(config_path.as_deref())?);
        let delegate = ProcessDelegate::system(config.commands.clone());
        Ok((config, delegate))
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!("Starting {} v{}", APP_NAME, VERSION);
            let (config, delegate) = load()?;
            DashboardServer::new(config, delegate)
                .run(shutdown_signal())
                .await?;
            Ok(())
        }
        Commands::Status => {
            let (config, delegate) = load()?;
            let router = ActionRouter::new(config, delegate);
            let body = router.engine_statuses().await;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Commands::CheckConfig => {
            let (config, _) = load()?;
            println!("Configuration OK");
            println!("  listen:          {}", config.server.bind_addr());
            println!("  engines:         {}", config.engines.join(", "));
            println!("  backup engines:  {}", config.backup_engines.join(", "));
            println!(
                "  authentication:  {}",
                match &config.credentials {
                    Some(creds) => format!("enabled (user '{}')", creds.username()),
                    None => "disabled".to_string(),
                }
            );
            println!("  allowed origins: {}", config.allowed_origins.join(", "));
            Ok(())
        }
        Commands::Version => {
            println!("{} v{}", APP_NAME, VERSION);
            Ok(())
        }
    }
}
