//! Team Mindmap
//!
//! A collaborative mindmap engine:
//! - Neo4j graph store for mindmaps, nodes, connections and comments
//! - Team-scoped access gate in front of every read and write
//! - WebSocket rooms broadcasting live node moves and cursors
//! - Optional NATS relay so rooms span several server instances

pub mod api;
pub mod auth;
pub mod events;
pub mod mindmap;
pub mod neo4j;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub neo4j: Neo4jYamlConfig,
    pub nats: NatsYamlConfig,
    pub realtime: RealtimeYamlConfig,
    /// Auth section — if absent, auth_config will be None (deny-by-default)
    pub auth: Option<AuthConfig>,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "mindmap123".into(),
        }
    }
}

/// NATS configuration section. Without a `url` rooms stay in-process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsYamlConfig {
    pub url: Option<String>,
    pub subject_prefix: String,
}

impl Default for NatsYamlConfig {
    fn default() -> Self {
        Self {
            url: None,
            subject_prefix: "events".into(),
        }
    }
}

/// Realtime session tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeYamlConfig {
    /// Per-session outbound queue capacity
    pub outbound_queue: usize,
    /// Seconds between transport pings (0 disables them)
    pub ping_interval_secs: u64,
}

impl Default for RealtimeYamlConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 64,
            ping_interval_secs: 30,
        }
    }
}

/// Token verification settings for the enclosing authenticated context.
///
/// Users log in elsewhere; this service only checks HS256 signatures.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT signing secret (HS256, minimum 32 characters)
    pub jwt_secret: String,
    /// JWT token lifetime in seconds (default: 28800 = 8h)
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_secs: u64,
}

fn default_jwt_expiry() -> u64 {
    28800 // 8 hours
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub server_port: u16,
    pub outbound_queue: usize,
    pub ping_interval_secs: u64,
    /// Auth config — None means deny-by-default (no auth section in YAML)
    pub auth_config: Option<AuthConfig>,
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        // JWT_SECRET alone is enough to enable auth
        let auth_config = match (std::env::var("JWT_SECRET").ok(), yaml.auth) {
            (Some(secret), Some(auth)) => Some(AuthConfig {
                jwt_secret: secret,
                ..auth
            }),
            (Some(secret), None) => Some(AuthConfig {
                jwt_secret: secret,
                jwt_expiry_secs: default_jwt_expiry(),
            }),
            (None, auth) => auth,
        };

        Ok(Self {
            neo4j_uri: std::env::var("NEO4J_URI").unwrap_or(yaml.neo4j.uri),
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or(yaml.neo4j.user),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.neo4j.password),
            nats_url: std::env::var("NATS_URL").ok().or(yaml.nats.url),
            nats_subject_prefix: yaml.nats.subject_prefix,
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            outbound_queue: yaml.realtime.outbound_queue.max(1),
            ping_interval_secs: yaml.realtime.ping_interval_secs,
            auth_config,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    /// Realtime session settings derived from the config
    pub fn session_config(&self) -> api::SessionConfig {
        api::SessionConfig {
            outbound_capacity: self.outbound_queue,
            ping_interval: match self.ping_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

// ============================================================================
// Server bootstrap
// ============================================================================

/// Build the room broker: in-process only, or bridged over NATS when configured
async fn build_broker(config: &Config) -> Result<Arc<dyn events::RoomBroker>> {
    let local = Arc::new(events::RoomRegistry::new());
    match &config.nats_url {
        Some(url) => {
            let client = events::connect_nats(url).await?;
            let relay =
                events::NatsRoomRelay::new(local, client, config.nats_subject_prefix.clone());
            relay.start_bridge();
            tracing::info!(
                instance_id = %relay.instance_id(),
                "Rooms relayed over NATS"
            );
            Ok(Arc::new(relay))
        }
        None => {
            tracing::info!("No NATS url configured, rooms are local to this instance");
            Ok(local)
        }
    }
}

/// Connect to the backing services and serve the API until Ctrl+C
pub async fn start_server(config: Config) -> Result<()> {
    let store = Arc::new(
        neo4j::Neo4jClient::new(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await?,
    );
    tracing::info!("Connected to Neo4j at {}", config.neo4j_uri);

    if config.auth_config.is_none() {
        tracing::warn!("No auth section configured, every API request will be rejected");
    }

    let broker = build_broker(&config).await?;
    let state = Arc::new(api::ServerState::new(
        store,
        broker,
        config.auth_config.clone(),
        config.session_config(),
    ));
    let app = api::create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Mindmap server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

// ============================================================================
// Tests
// ============================================================================
