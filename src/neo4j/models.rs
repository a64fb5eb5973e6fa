//! Persisted entities of the collaborative mindmap graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

// ============================================================================
// Mindmap
// ============================================================================

/// A mindmap owned by exactly one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mindmap {
    pub id: Uuid,
    pub title: String,
    pub team_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Mindmap {
    pub fn new(team_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            team_id,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// A node placed on a mindmap canvas.
///
/// `recommendation_count` always equals `recommended_by.len()`; every mutation of
/// the recommender set goes through [`Node::toggle_recommendation`], which
/// recomputes the count from the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub mindmap_id: Uuid,
    pub pos_x: u32,
    pub pos_y: u32,
    pub title: String,
    pub content: String,
    pub recommendation_count: u32,
    #[serde(default)]
    pub recommended_by: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn new(
        mindmap_id: Uuid,
        pos_x: u32,
        pos_y: u32,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mindmap_id,
            pos_x,
            pos_y,
            title: title.into(),
            content: content.into(),
            recommendation_count: 0,
            recommended_by: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Flip `user_id`'s membership in the recommender set.
    ///
    /// Returns `true` if the user was added, `false` if removed.
    pub fn toggle_recommendation(&mut self, user_id: Uuid) -> bool {
        let added = if self.recommended_by.remove(&user_id) {
            false
        } else {
            self.recommended_by.insert(user_id);
            true
        };
        self.recount();
        added
    }

    /// Recompute `recommendation_count` from the recommender set
    pub fn recount(&mut self) {
        self.recommendation_count = self.recommended_by.len() as u32;
    }
}

// ============================================================================
// NodeConnection
// ============================================================================

/// A directed edge between two nodes of the same mindmap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConnection {
    pub id: Uuid,
    pub mindmap_id: Uuid,
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
}

impl NodeConnection {
    pub fn new(mindmap_id: Uuid, from_node_id: Uuid, to_node_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            mindmap_id,
            from_node_id,
            to_node_id,
        }
    }

    /// Whether this edge touches `node_id` at either end
    pub fn touches(&self, node_id: Uuid) -> bool {
        self.from_node_id == node_id || self.to_node_id == node_id
    }
}

// ============================================================================
// Comment
// ============================================================================

/// An append-only comment attached to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub node_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(node_id: Uuid, user_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id,
            user_id,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Combined read
// ============================================================================

/// A mindmap together with all of its nodes and connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindmapGraph {
    pub mindmap: Mindmap,
    pub nodes: Vec<Node>,
    pub connections: Vec<NodeConnection>,
}
