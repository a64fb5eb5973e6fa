//! GraphStore trait definition
//!
//! Abstract interface for all mindmap persistence. `Neo4jClient` is the
//! production implementation; tests run against the in-memory mock.

use crate::neo4j::models::*;
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Abstract interface for all graph database operations.
///
/// Every multi-entity write (cascading deletes, toggle, conditional edge
/// creation) is atomic within a single call.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========================================================================
    // Team membership (read-only, owned by the team subsystem)
    // ========================================================================

    /// Whether a membership record exists for `(team_id, user_id)`
    async fn is_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool>;

    // ========================================================================
    // Mindmap operations
    // ========================================================================

    /// Create a new mindmap
    async fn create_mindmap(&self, mindmap: &Mindmap) -> Result<()>;

    /// Get a mindmap by ID
    async fn get_mindmap(&self, id: Uuid) -> Result<Option<Mindmap>>;

    /// List a team's mindmaps, newest first. Returns the page and the total count.
    async fn list_mindmaps(
        &self,
        team_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Mindmap>, usize)>;

    /// Delete a mindmap with all of its nodes, connections and comments.
    /// Returns `false` if the mindmap did not exist.
    async fn delete_mindmap(&self, id: Uuid) -> Result<bool>;

    /// Mindmap plus all of its nodes and connections in one round trip
    async fn get_mindmap_with_graph(&self, id: Uuid) -> Result<Option<MindmapGraph>>;

    // ========================================================================
    // Node operations
    // ========================================================================

    /// Create a new node
    async fn create_node(&self, node: &Node) -> Result<()>;

    /// Get a node by ID
    async fn get_node(&self, id: Uuid) -> Result<Option<Node>>;

    /// Create a node linked to the oldest node of its mindmap titled
    /// `parent_title`, resolving the parent and writing both in one atomic step.
    /// Returns the new edge, or `None` when no such parent exists.
    async fn create_node_with_parent(
        &self,
        node: &Node,
        parent_title: &str,
    ) -> Result<Option<NodeConnection>>;

    /// Overwrite a node's position. Returns the updated node, or `None` if missing.
    async fn update_node_position(&self, id: Uuid, pos_x: u32, pos_y: u32)
        -> Result<Option<Node>>;

    /// Delete a node with every connection touching it and every comment on it.
    /// Returns the deleted node, or `None` if missing.
    async fn delete_node(&self, id: Uuid) -> Result<Option<Node>>;

    /// Atomically flip `user_id` in the node's recommender set and recompute the
    /// count. Returns the updated node and whether the user was added.
    async fn toggle_recommendation(&self, node_id: Uuid, user_id: Uuid)
        -> Result<Option<(Node, bool)>>;

    // ========================================================================
    // Connection operations
    // ========================================================================

    /// Create the edge unless an identical `(from, to, mindmap)` edge exists.
    /// Returns `false` when a duplicate was found and nothing was written.
    async fn create_connection_if_absent(&self, connection: &NodeConnection) -> Result<bool>;

    /// Get a connection by ID
    async fn get_connection(&self, id: Uuid) -> Result<Option<NodeConnection>>;

    /// Delete a connection. Returns `false` if it did not exist.
    async fn delete_connection(&self, id: Uuid) -> Result<bool>;

    // ========================================================================
    // Comment operations
    // ========================================================================

    /// Append a comment
    async fn create_comment(&self, comment: &Comment) -> Result<()>;

    /// List a node's comments, oldest first. Returns the page and the total count.
    async fn list_comments(
        &self,
        node_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Comment>, usize)>;

    // ========================================================================
    // Health
    // ========================================================================

    /// Check connectivity with the backing database
    async fn health_check(&self) -> Result<bool>;
}
