//! Test helper factories and mock state builders
//!
//! Builds an `ApiState` over the in-memory `MockGraphStore` and an in-process
//! `RoomRegistry`, plus signed tokens for exercising `require_auth`.
#![allow(dead_code)]

use crate::api::handlers::{ApiState, ServerState};
use crate::api::ws_session::SessionConfig;
use crate::auth::jwt::encode_jwt;
use crate::events::RoomRegistry;
use crate::neo4j::mock::MockGraphStore;
use crate::AuthConfig;
use std::sync::Arc;
use uuid::Uuid;

/// HS256 secret shared by every test that signs or verifies tokens
pub const TEST_JWT_SECRET: &str = "test-secret-key-minimum-32-chars!!";

/// Create a test AuthConfig
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_expiry_secs: 3600,
    }
}

/// Session settings for tests: default queue size, pings disabled
pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        ping_interval: None,
        ..SessionConfig::default()
    }
}

/// Create a mock ApiState over `store` with a fresh in-process room registry
pub fn mock_api_state(store: Arc<MockGraphStore>, auth_config: Option<AuthConfig>) -> ApiState {
    Arc::new(ServerState::new(
        store,
        Arc::new(RoomRegistry::new()),
        auth_config,
        test_session_config(),
    ))
}

/// `Authorization` header value carrying a valid token for `user_id`
pub fn bearer_for(user_id: Uuid, username: &str) -> String {
    let token = encode_jwt(user_id, username, TEST_JWT_SECRET, 3600).unwrap();
    format!("Bearer {}", token)
}
