//! Mindmap mutation DTOs, the acting identity, and the service error type

use crate::events::SessionId;
use crate::neo4j::models::{Node, NodeConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a new mindmap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMindmapRequest {
    pub title: String,
}

/// Request to create a new node
///
/// Coordinates are signed so that a negative value is reported as a
/// validation error instead of a body parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    pub x: i64,
    pub y: i64,
    pub title: String,
    pub content: String,
    /// Title of an existing node to link the new node to
    #[serde(default)]
    pub parent_title: Option<String>,
}

/// Request to move a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePositionRequest {
    pub x: i64,
    pub y: i64,
}

/// Request to create a directed connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConnectionRequest {
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
}

/// Request to add a comment to a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCommentRequest {
    pub text: String,
}

/// A freshly created node and, when a parent was found, its link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedNode {
    pub node: Node,
    pub connection: Option<NodeConnection>,
}

/// Direction of a recommendation toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationAction {
    Added,
    Removed,
}

/// Outcome of a recommendation toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationToggle {
    pub action: RecommendationAction,
    pub recommendation_count: u32,
}

/// Mutation envelope returned by the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> MutationResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Who is performing a mutation.
///
/// `session` is set only for realtime sessions; broadcasts carry it as their
/// origin so that session does not receive its own echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
    pub session: Option<SessionId>,
}

impl Actor {
    /// An actor calling through the HTTP API
    pub fn api(user_id: Uuid, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            session: None,
        }
    }

    /// An actor calling from a realtime session
    pub fn session(user_id: Uuid, username: impl Into<String>, session: SessionId) -> Self {
        Self {
            user_id,
            username: username.into(),
            session: Some(session),
        }
    }
}

/// Errors returned by the mutation service
#[derive(Debug, thiserror::Error)]
pub enum MindmapError {
    /// Input rejected before anything was written
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl MindmapError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type MindmapResult<T> = std::result::Result<T, MindmapError>;

/// Check that a coordinate is non-negative and fits the stored width.
pub fn validate_coordinate(name: &str, value: i64) -> MindmapResult<u32> {
    if value < 0 {
        return Err(MindmapError::validation(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    u32::try_from(value)
        .map_err(|_| MindmapError::validation(format!("{} is out of range: {}", name, value)))
}

/// Check that a required text field has visible content.
pub fn require_text(name: &str, value: &str) -> MindmapResult<()> {
    if value.trim().is_empty() {
        return Err(MindmapError::validation(format!("{} must not be blank", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_coordinate() {
        assert_eq!(validate_coordinate("x", 0).unwrap(), 0);
        assert_eq!(validate_coordinate("x", 150).unwrap(), 150);
        assert_eq!(
            validate_coordinate("x", u32::MAX as i64).unwrap(),
            u32::MAX
        );
        assert!(matches!(
            validate_coordinate("x", -1),
            Err(MindmapError::Validation(_))
        ));
        assert!(matches!(
            validate_coordinate("y", u32::MAX as i64 + 1),
            Err(MindmapError::Validation(_))
        ));
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("title", "Root").is_ok());
        assert!(require_text("title", "").is_err());
        assert!(require_text("text", " \t\n").is_err());
    }

    #[test]
    fn test_recommendation_action_wire_format() {
        assert_eq!(
            serde_json::to_string(&RecommendationAction::Added).unwrap(),
            "\"added\""
        );
        assert_eq!(
            serde_json::to_string(&RecommendationAction::Removed).unwrap(),
            "\"removed\""
        );
    }

    #[test]
    fn test_create_node_request_parent_optional() {
        let req: CreateNodeRequest =
            serde_json::from_str(r#"{"x":10,"y":10,"title":"Root","content":"c"}"#).unwrap();
        assert!(req.parent_title.is_none());

        let req: CreateNodeRequest = serde_json::from_str(
            r#"{"x":-5,"y":10,"title":"Child","content":"c","parent_title":"Root"}"#,
        )
        .unwrap();
        assert_eq!(req.x, -5);
        assert_eq!(req.parent_title.as_deref(), Some("Root"));
    }

    #[test]
    fn test_error_messages() {
        let id = Uuid::nil();
        assert_eq!(
            MindmapError::not_found("Node", id).to_string(),
            format!("Node {} not found", id)
        );
        assert_eq!(
            MindmapError::validation("bad").to_string(),
            "bad"
        );
    }
}
