//! HTTP and WebSocket API for mindmaps

pub mod handlers;
pub mod query;
pub mod routes;
pub mod ws_handlers;
pub mod ws_session;

pub use handlers::{ApiState, ServerState};
pub use query::*;
pub use routes::create_router;
pub use ws_session::{MindmapSession, SessionConfig};
