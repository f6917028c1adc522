//! ask-relay - shared-secret relay for chat-completion requests
//!
//! Lets shell scripts and small tools reach a hosted completion API through a
//! fixed contract, guarded by one shared secret.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ask_relay::config::Config;

#[derive(Parser)]
#[command(name = "ask-relay")]
#[command(about = "Shared-secret relay for chat-completion requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct ConfigArgs {
    /// Optional TOML file with non-secret settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load environment from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay (default)
    Serve {
        #[command(flatten)]
        args: ConfigArgs,

        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration and print a redacted summary
    Check {
        #[command(flatten)]
        args: ConfigArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        args: ConfigArgs::default(),
        port: None,
    });
    let args = match &command {
        Commands::Serve { args, .. } | Commands::Check { args } => args.clone(),
    };

    // Environment first, so RUST_LOG from .env applies to the subscriber.
    let env_source = load_env_file(args.env_file.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ask_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(path) = env_source {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start: invalid configuration");
            return Err(e.into());
        }
    };

    match command {
        Commands::Serve { port, .. } => {
            let mut config = config;
            if let Some(port) = port {
                tracing::info!(port, "Override listen port");
                config.server.port = port;
            }
            ask_relay::proxy::run_server(config).await
        }

        Commands::Check { .. } => {
            println!("Configuration OK");
            println!("  listen:     {}", config.server.listen_addr());
            println!("  upstream:   {}", config.upstream.base_url);
            println!("  api key:    {}", config.upstream.api_key);
            println!("  secret:     {:?}", config.secret);
            Ok(())
        }
    }
}

/// Load a dotenv file into the process environment.
///
/// An explicit path must exist; the default `./.env` is optional. Variables
/// already set in the environment win over the file.
fn load_env_file(path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)?;
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(e.into()),
        },
    }
}
