//! API route definitions

use super::handlers::{self, ApiState};
use super::ws_handlers;
use crate::auth::middleware::require_auth;
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        // ====================================================================
        // Mindmaps
        // ====================================================================
        .route(
            "/api/teams/{team_id}/mindmaps",
            get(handlers::list_mindmaps).post(handlers::create_mindmap),
        )
        .route(
            "/api/teams/{team_id}/mindmaps/{mindmap_id}",
            get(handlers::get_mindmap).delete(handlers::delete_mindmap),
        )
        // ====================================================================
        // Nodes
        // ====================================================================
        .route(
            "/api/teams/{team_id}/mindmaps/{mindmap_id}/nodes",
            post(handlers::create_node),
        )
        .route(
            "/api/teams/{team_id}/mindmaps/{mindmap_id}/nodes/{node_id}",
            delete(handlers::delete_node),
        )
        .route(
            "/api/teams/{team_id}/mindmaps/{mindmap_id}/nodes/{node_id}/position",
            patch(handlers::update_node_position),
        )
        .route(
            "/api/teams/{team_id}/mindmaps/{mindmap_id}/nodes/{node_id}/recommendation",
            post(handlers::toggle_recommendation),
        )
        .route(
            "/api/teams/{team_id}/mindmaps/{mindmap_id}/nodes/{node_id}/comments",
            get(handlers::list_comments).post(handlers::add_comment),
        )
        // ====================================================================
        // Connections
        // ====================================================================
        .route(
            "/api/teams/{team_id}/mindmaps/{mindmap_id}/connections",
            post(handlers::create_connection),
        )
        .route(
            "/api/teams/{team_id}/mindmaps/{mindmap_id}/connections/{connection_id}",
            delete(handlers::delete_connection),
        )
        // ====================================================================
        // Realtime
        // ====================================================================
        .route(
            "/ws/mindmap/{team_id}/{mindmap_id}/",
            get(ws_handlers::ws_mindmap),
        )
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        .merge(protected)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
