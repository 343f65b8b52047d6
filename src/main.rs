use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use speedreport::config::Config;

#[derive(Parser)]
#[command(
    name = "speedreport",
    about = "Queued web performance testing with email reports",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (HTTP intake + test pipeline)
    Serve {
        /// Bind address, overrides HOST/PORT
        #[arg(long)]
        bind: Option<String>,
    },

    /// Validate the configuration and print it with secrets redacted
    CheckConfig,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match std::env::var("SPEEDREPORT_LOG_FORMAT").as_deref() {
        Ok("json") => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load().context("Invalid configuration")?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                let (host, port) = bind
                    .rsplit_once(':')
                    .with_context(|| format!("--bind must be host:port, got {bind:?}"))?;
                config.server.host = host.to_string();
                config.server.port = port
                    .parse()
                    .with_context(|| format!("invalid port in --bind {bind:?}"))?;
            }
            tracing::info!(bind = %config.server.bind_addr(), "Starting speedreport daemon");
            speedreport::serve(config).await?;
        }
        Commands::CheckConfig => {
            let rendered = toml::to_string_pretty(&config.redacted())?;
            println!("{rendered}");
        }
    }

    Ok(())
}
