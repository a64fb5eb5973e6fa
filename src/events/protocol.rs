//! Realtime wire protocol for mindmap rooms
//!
//! Both directions use a JSON object with a `type` tag plus type-specific fields.
//! Inbound frames decode into [`ClientMessage`]; everything a room member can
//! receive is a [`ServerMessage`], wrapped in a [`RoomEvent`] that records which
//! session (if any) originated it.

use crate::mindmap::models::RecommendationAction;
use crate::neo4j::models::{Comment, Mindmap, Node, NodeConnection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Session identity
// ============================================================================

/// Identity of one realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Public view of a room member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub session_id: SessionId,
    pub user_id: Uuid,
    pub username: String,
}

// ============================================================================
// Inbound
// ============================================================================

/// Messages a client may send over the realtime channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Persist a new position for a node
    NodeMove { node_id: Uuid, x: f64, y: f64 },
    /// Share the pointer position; never persisted
    CursorMove { x: f64, y: f64 },
    /// Reserved: node creation goes through the HTTP API
    NodeCreate {},
    /// Reserved: node deletion goes through the HTTP API
    NodeDelete {},
}

impl ClientMessage {
    /// Every tag this protocol version understands
    pub const KNOWN_TYPES: [&'static str; 4] =
        ["node_move", "cursor_move", "node_create", "node_delete"];

    /// Decode one inbound text frame.
    ///
    /// Unknown tags are reported separately from structurally invalid payloads so
    /// the session can log them differently.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(DecodeError::MissingType)?;
        if !Self::KNOWN_TYPES.contains(&tag) {
            return Err(DecodeError::UnknownType(tag.to_string()));
        }
        serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

/// Why an inbound frame could not be turned into a [`ClientMessage`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("message has no string `type` field")]
    MissingType,
    #[error("unrecognized message type `{0}`")]
    UnknownType(String),
}

// ============================================================================
// Outbound
// ============================================================================

/// Messages delivered to room members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent only to a session that just became active
    MindmapState {
        mindmap: Mindmap,
        nodes: Vec<Node>,
        connections: Vec<NodeConnection>,
        members: Vec<MemberInfo>,
    },
    UserJoined {
        user_id: Uuid,
        username: String,
    },
    UserLeft {
        user_id: Uuid,
        username: String,
    },
    NodeMoved {
        node_id: Uuid,
        x: u32,
        y: u32,
        user_id: Uuid,
        username: String,
    },
    CursorMoved {
        x: f64,
        y: f64,
        user_id: Uuid,
        username: String,
    },
    NodeCreated {
        node: Node,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection: Option<NodeConnection>,
        user_id: Uuid,
        username: String,
    },
    NodeDeleted {
        node_id: Uuid,
        title: String,
        user_id: Uuid,
        username: String,
    },
    ConnectionCreated {
        connection: NodeConnection,
        user_id: Uuid,
        username: String,
    },
    ConnectionDeleted {
        connection_id: Uuid,
        user_id: Uuid,
        username: String,
    },
    RecommendationToggled {
        node_id: Uuid,
        action: RecommendationAction,
        recommendation_count: u32,
        user_id: Uuid,
        username: String,
    },
    CommentAdded {
        comment: Comment,
        username: String,
    },
    MindmapDeleted {
        mindmap_id: Uuid,
        user_id: Uuid,
        username: String,
    },
}

impl ServerMessage {
    /// The wire tag, for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerMessage::MindmapState { .. } => "mindmap_state",
            ServerMessage::UserJoined { .. } => "user_joined",
            ServerMessage::UserLeft { .. } => "user_left",
            ServerMessage::NodeMoved { .. } => "node_moved",
            ServerMessage::CursorMoved { .. } => "cursor_moved",
            ServerMessage::NodeCreated { .. } => "node_created",
            ServerMessage::NodeDeleted { .. } => "node_deleted",
            ServerMessage::ConnectionCreated { .. } => "connection_created",
            ServerMessage::ConnectionDeleted { .. } => "connection_deleted",
            ServerMessage::RecommendationToggled { .. } => "recommendation_toggled",
            ServerMessage::CommentAdded { .. } => "comment_added",
            ServerMessage::MindmapDeleted { .. } => "mindmap_deleted",
        }
    }
}

/// A broadcast envelope.
///
/// `origin` is the session whose action produced the message. Each member's
/// outbound adapter drops events it originated itself; API-triggered events
/// carry no origin and reach every member.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub origin: Option<SessionId>,
    pub message: Arc<ServerMessage>,
}

impl RoomEvent {
    /// An event delivered to every member
    pub fn to_all(message: ServerMessage) -> Self {
        Self {
            origin: None,
            message: Arc::new(message),
        }
    }

    /// An event tagged with the session that caused it
    pub fn from_session(origin: Option<SessionId>, message: ServerMessage) -> Self {
        Self {
            origin,
            message: Arc::new(message),
        }
    }

    /// Whether `session` produced this event
    pub fn originated_by(&self, session: SessionId) -> bool {
        self.origin == Some(session)
    }
}
