use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use mediarelay_core::api_key::mask_token;
use mediarelay_core::timestamp;
use mediarelay_store::{KeyStore, LocalKeyStore};
use tokio::net::TcpListener;
use tracing::info;

use mediarelay_server::auth;
use mediarelay_server::config::RelayConfig;
use mediarelay_server::state::InnerAppState;

#[derive(Parser)]
#[command(name = "mediarelay-server", version)]
struct Cli {
    #[command(flatten)]
    config: RelayConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Issue a new API key
    Keygen {
        /// Label for the key
        #[arg(long)]
        name: String,
    },
    /// List issued API keys with masked tokens
    ListKeys,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;
    let store = Arc::new(LocalKeyStore::new(&config.key_store));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Keygen { name } => {
            let record = auth::issue_key(store.as_ref(), &name, timestamp::now_millis()).await?;
            eprintln!("Created API key for {:?}", record.name);
            eprintln!("  expires: {}", timestamp::format(&record.expires_at));
            // Print the raw key to stdout so it can be captured
            println!("{}", record.key);
        }
        Commands::ListKeys => {
            let keys = store.load().await?;
            if keys.is_empty() {
                eprintln!("No API keys found.");
            } else {
                let now = Utc::now();
                println!("{:<24} {:<16} {:<26} STATUS", "NAME", "KEY", "EXPIRES");
                for key in keys {
                    println!(
                        "{:<24} {:<16} {:<26} {}",
                        key.name,
                        mask_token(&key.key),
                        timestamp::format(&key.expires_at),
                        if key.is_expired_at(now) { "expired" } else { "active" },
                    );
                }
            }
        }
        Commands::Serve => {
            config.check_static_dir()?;
            let existing = store
                .load()
                .await
                .with_context(|| format!("opening key store {}", config.key_store.display()))?;
            info!(
                "key store {} holds {} keys",
                config.key_store.display(),
                existing.len()
            );

            let addr = SocketAddr::new(
                config
                    .bind
                    .parse()
                    .with_context(|| format!("invalid bind address {:?}", config.bind))?,
                config.port,
            );

            let gated: Vec<&str> = config
                .gated_routes
                .gated_routes()
                .iter()
                .map(|r| r.as_str())
                .collect();
            info!("routes requiring an API key: {gated:?}");
            info!("upstreams: {:?}", config.upstream);

            let state = InnerAppState::from_config(&config, store);
            let listener = TcpListener::bind(addr).await?;
            info!("mediarelay-server listening on http://{addr}");

            mediarelay_server::serve(listener, state).await?;
        }
    }

    Ok(())
}
