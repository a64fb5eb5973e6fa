//! API request handlers

use super::query::{PaginatedResponse, PaginationParams};
use super::ws_session::SessionConfig;
use crate::auth::extractor::AuthUser;
use crate::auth::AccessGate;
use crate::events::RoomBroker;
use crate::mindmap::models::*;
use crate::mindmap::MindmapManager;
use crate::neo4j::models::{Comment, Mindmap, MindmapGraph, Node, NodeConnection};
use crate::neo4j::traits::GraphStore;
use crate::AuthConfig;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<dyn GraphStore>,
    pub manager: Arc<MindmapManager>,
    pub gate: AccessGate,
    pub broker: Arc<dyn RoomBroker>,
    /// Auth config — None means deny-by-default
    pub auth_config: Option<AuthConfig>,
    pub session_config: SessionConfig,
}

/// Shared API state
pub type ApiState = Arc<ServerState>;

impl ServerState {
    pub fn new(
        store: Arc<dyn GraphStore>,
        broker: Arc<dyn RoomBroker>,
        auth_config: Option<AuthConfig>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            manager: Arc::new(MindmapManager::new(store.clone(), broker.clone())),
            gate: AccessGate::new(store.clone()),
            store,
            broker,
            auth_config,
            session_config,
        }
    }

    async fn require_team(&self, user: &AuthUser, team_id: Uuid) -> Result<(), AppError> {
        if self.gate.authorize_team(user.user_id, team_id).await {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not a member of this team".to_string()))
        }
    }

    async fn require_mindmap(
        &self,
        user: &AuthUser,
        team_id: Uuid,
        mindmap_id: Uuid,
    ) -> Result<(), AppError> {
        if self.gate.authorize(user.user_id, team_id, mindmap_id).await {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "No access to this mindmap".to_string(),
            ))
        }
    }
}

fn actor(user: &AuthUser) -> Actor {
    Actor::api(user.user_id, user.username.clone())
}

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rooms: usize,
}

/// Health check handler
///
/// Returns 200 + `"ok"` when the graph store answers, 503 + `"unhealthy"` otherwise.
pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = state.store.health_check().await.unwrap_or(false);
    let (http_status, status) = if store_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            rooms: state.broker.room_count(),
        }),
    )
}

// ============================================================================
// Mindmaps
// ============================================================================

/// List a team's mindmaps
pub async fn list_mindmaps(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(team_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<Mindmap>>, AppError> {
    pagination.validate().map_err(AppError::BadRequest)?;
    state.require_team(&user, team_id).await?;

    let limit = pagination.validated_limit();
    let (items, total) = state
        .manager
        .list_mindmaps(team_id, limit, pagination.offset)
        .await?;
    Ok(Json(PaginatedResponse::new(
        items,
        total,
        limit,
        pagination.offset,
    )))
}

/// Create a mindmap
pub async fn create_mindmap(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateMindmapRequest>,
) -> Result<(StatusCode, Json<MutationResponse<Mindmap>>), AppError> {
    state.require_team(&user, team_id).await?;
    let mindmap = state.manager.create_mindmap(team_id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::new(
            format!("Mindmap '{}' created", mindmap.title),
            mindmap,
        )),
    ))
}

/// Get a mindmap with all its nodes and connections
pub async fn get_mindmap(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MindmapGraph>, AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    Ok(Json(state.manager.get_mindmap_with_graph(mindmap_id).await?))
}

/// Delete a mindmap and everything in it
pub async fn delete_mindmap(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MutationResponse<serde_json::Value>>, AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    state
        .manager
        .delete_mindmap(mindmap_id, &actor(&user))
        .await?;
    Ok(Json(MutationResponse::new(
        "Mindmap deleted",
        serde_json::json!({ "mindmap_id": mindmap_id }),
    )))
}

// ============================================================================
// Nodes
// ============================================================================

/// Create a node, optionally linked to a parent by title
pub async fn create_node(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<MutationResponse<CreatedNode>>), AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    let created = state
        .manager
        .create_node(mindmap_id, req, &actor(&user))
        .await?;
    let message = match &created.connection {
        Some(_) => format!("Node '{}' created and linked to its parent", created.node.title),
        None => format!("Node '{}' created", created.node.title),
    };
    Ok((StatusCode::CREATED, Json(MutationResponse::new(message, created))))
}

/// Update a node's position
pub async fn update_node_position(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id, node_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<UpdatePositionRequest>,
) -> Result<Json<MutationResponse<Node>>, AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    let node = state
        .manager
        .move_node(mindmap_id, node_id, req.x, req.y, &actor(&user))
        .await?;
    Ok(Json(MutationResponse::new("Position updated", node)))
}

/// Delete a node with its connections and comments
pub async fn delete_node(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id, node_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<MutationResponse<serde_json::Value>>, AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    let (title, mindmap_id) = state
        .manager
        .delete_node(mindmap_id, node_id, &actor(&user))
        .await?;
    Ok(Json(MutationResponse::new(
        format!("Node '{}' deleted", title),
        serde_json::json!({ "node_id": node_id, "title": title, "mindmap_id": mindmap_id }),
    )))
}

/// Toggle the caller's recommendation on a node
pub async fn toggle_recommendation(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id, node_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<MutationResponse<RecommendationToggle>>, AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    let toggle = state
        .manager
        .toggle_recommendation(mindmap_id, node_id, &actor(&user))
        .await?;
    let message = match toggle.action {
        RecommendationAction::Added => "Recommendation added",
        RecommendationAction::Removed => "Recommendation removed",
    };
    Ok(Json(MutationResponse::new(message, toggle)))
}

// ============================================================================
// Comments
// ============================================================================

/// List comments on a node
pub async fn list_comments(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id, node_id)): Path<(Uuid, Uuid, Uuid)>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<Comment>>, AppError> {
    pagination.validate().map_err(AppError::BadRequest)?;
    state.require_mindmap(&user, team_id, mindmap_id).await?;

    let limit = pagination.validated_limit();
    let (items, total) = state
        .manager
        .list_comments(mindmap_id, node_id, limit, pagination.offset)
        .await?;
    Ok(Json(PaginatedResponse::new(
        items,
        total,
        limit,
        pagination.offset,
    )))
}

/// Add a comment to a node
pub async fn add_comment(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id, node_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<MutationResponse<Comment>>), AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    let comment = state
        .manager
        .add_comment(mindmap_id, node_id, req, &actor(&user))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::new("Comment added", comment)),
    ))
}

// ============================================================================
// Connections
// ============================================================================

/// Create a directed connection
pub async fn create_connection(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateConnectionRequest>,
) -> Result<(StatusCode, Json<MutationResponse<NodeConnection>>), AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    let connection = state
        .manager
        .create_connection(mindmap_id, req, &actor(&user))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::new("Connection created", connection)),
    ))
}

/// Delete a connection
pub async fn delete_connection(
    State(state): State<ApiState>,
    user: AuthUser,
    Path((team_id, mindmap_id, connection_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<MutationResponse<serde_json::Value>>, AppError> {
    state.require_mindmap(&user, team_id, mindmap_id).await?;
    state
        .manager
        .delete_connection(mindmap_id, connection_id, &actor(&user))
        .await?;
    Ok(Json(MutationResponse::new(
        "Connection deleted",
        serde_json::json!({ "connection_id": connection_id }),
    )))
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<MindmapError> for AppError {
    fn from(err: MindmapError) -> Self {
        match err {
            MindmapError::Validation(msg) => AppError::BadRequest(msg),
            e @ MindmapError::NotFound { .. } => AppError::NotFound(e.to_string()),
            MindmapError::Store(e) => AppError::Internal(e),
        }
    }
}
