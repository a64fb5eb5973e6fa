//! Team Mindmap - Main Server
//!
//! Collaborative mindmaps over Neo4j with live WebSocket rooms.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use team_mindmap::{auth::jwt::encode_jwt, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mindmap-server")]
#[command(about = "Collaborative mindmap server")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API and realtime server
    Serve {
        /// Port to listen on (overrides config.yaml and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Mint a signed access token for local development
    IssueToken {
        /// User id placed in the `sub` claim
        #[arg(long)]
        user_id: Uuid,

        /// Display name carried in the token
        #[arg(long)]
        username: String,

        /// Token lifetime in seconds (defaults to auth.jwt_expiry_secs)
        #[arg(long)]
        expiry_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,team_mindmap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            team_mindmap::start_server(config).await
        }
        Commands::IssueToken {
            user_id,
            username,
            expiry_secs,
        } => {
            let Some(auth) = config.auth_config else {
                bail!("No auth section configured (set JWT_SECRET or auth.jwt_secret)");
            };
            let expiry = expiry_secs.unwrap_or(auth.jwt_expiry_secs);
            let token = encode_jwt(user_id, &username, &auth.jwt_secret, expiry)?;
            println!("{}", token);
            Ok(())
        }
    }
}
