//! Mindmap mutation operations
//!
//! Every mutation persists first and broadcasts to the mindmap's room only
//! after the store call succeeded.

use super::models::*;
use crate::events::{RoomBroker, RoomEvent, ServerMessage};
use crate::neo4j::models::*;
use crate::neo4j::traits::GraphStore;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Manager for mindmap graph operations
pub struct MindmapManager {
    store: Arc<dyn GraphStore>,
    broker: Arc<dyn RoomBroker>,
}

impl MindmapManager {
    /// Create a new mindmap manager
    pub fn new(store: Arc<dyn GraphStore>, broker: Arc<dyn RoomBroker>) -> Self {
        Self { store, broker }
    }

    fn broadcast(&self, mindmap_id: Uuid, actor: &Actor, message: ServerMessage) {
        let event_type = message.event_type();
        let delivered = self
            .broker
            .publish(mindmap_id, RoomEvent::from_session(actor.session, message));
        debug!(
            mindmap_id = %mindmap_id,
            event_type,
            delivered,
            "Broadcast mutation"
        );
    }

    /// Load a node and check that it lives in `mindmap_id`
    async fn node_in(&self, mindmap_id: Uuid, node_id: Uuid) -> MindmapResult<Node> {
        match self.store.get_node(node_id).await? {
            Some(node) if node.mindmap_id == mindmap_id => Ok(node),
            _ => Err(MindmapError::not_found("Node", node_id)),
        }
    }

    // ========================================================================
    // Mindmap operations
    // ========================================================================

    /// Create a new mindmap owned by `team_id`
    pub async fn create_mindmap(
        &self,
        team_id: Uuid,
        req: CreateMindmapRequest,
    ) -> MindmapResult<Mindmap> {
        require_text("title", &req.title)?;
        let mindmap = Mindmap::new(team_id, req.title);
        self.store.create_mindmap(&mindmap).await?;
        info!(mindmap_id = %mindmap.id, team_id = %team_id, "Mindmap created");
        Ok(mindmap)
    }

    /// Get a mindmap by ID
    pub async fn get_mindmap(&self, mindmap_id: Uuid) -> MindmapResult<Mindmap> {
        self.store
            .get_mindmap(mindmap_id)
            .await?
            .ok_or_else(|| MindmapError::not_found("Mindmap", mindmap_id))
    }

    /// List a team's mindmaps, newest first
    pub async fn list_mindmaps(
        &self,
        team_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> MindmapResult<(Vec<Mindmap>, usize)> {
        Ok(self.store.list_mindmaps(team_id, limit, offset).await?)
    }

    /// Mindmap plus all its nodes and connections in one read
    pub async fn get_mindmap_with_graph(&self, mindmap_id: Uuid) -> MindmapResult<MindmapGraph> {
        self.store
            .get_mindmap_with_graph(mindmap_id)
            .await?
            .ok_or_else(|| MindmapError::not_found("Mindmap", mindmap_id))
    }

    /// Delete a mindmap together with its nodes, connections and comments
    pub async fn delete_mindmap(&self, mindmap_id: Uuid, actor: &Actor) -> MindmapResult<()> {
        if !self.store.delete_mindmap(mindmap_id).await? {
            return Err(MindmapError::not_found("Mindmap", mindmap_id));
        }
        info!(mindmap_id = %mindmap_id, user_id = %actor.user_id, "Mindmap deleted");
        self.broadcast(
            mindmap_id,
            actor,
            ServerMessage::MindmapDeleted {
                mindmap_id,
                user_id: actor.user_id,
                username: actor.username.clone(),
            },
        );
        Ok(())
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    /// Get a node of a mindmap
    pub async fn get_node(&self, mindmap_id: Uuid, node_id: Uuid) -> MindmapResult<Node> {
        self.node_in(mindmap_id, node_id).await
    }

    /// Create a node, linking it to the node titled `parent_title` if one exists.
    ///
    /// A parent title that matches nothing is not an error: the node is created
    /// without a connection.
    pub async fn create_node(
        &self,
        mindmap_id: Uuid,
        req: CreateNodeRequest,
        actor: &Actor,
    ) -> MindmapResult<CreatedNode> {
        let pos_x = validate_coordinate("x", req.x)?;
        let pos_y = validate_coordinate("y", req.y)?;
        require_text("title", &req.title)?;
        require_text("content", &req.content)?;

        if self.store.get_mindmap(mindmap_id).await?.is_none() {
            return Err(MindmapError::not_found("Mindmap", mindmap_id));
        }

        let node = Node::new(mindmap_id, pos_x, pos_y, req.title, req.content);
        // Parent lookup and insert are a single store write
        let connection = match req.parent_title.as_deref() {
            Some(title) if !title.is_empty() => {
                let connection = self.store.create_node_with_parent(&node, title).await?;
                if connection.is_none() {
                    debug!(mindmap_id = %mindmap_id, parent_title = title, "Parent node not found, created unlinked node");
                }
                connection
            }
            _ => {
                self.store.create_node(&node).await?;
                None
            }
        };

        self.broadcast(
            mindmap_id,
            actor,
            ServerMessage::NodeCreated {
                node: node.clone(),
                connection: connection.clone(),
                user_id: actor.user_id,
                username: actor.username.clone(),
            },
        );
        Ok(CreatedNode { node, connection })
    }

    /// Persist a new position for a node
    pub async fn move_node(
        &self,
        mindmap_id: Uuid,
        node_id: Uuid,
        x: i64,
        y: i64,
        actor: &Actor,
    ) -> MindmapResult<Node> {
        let pos_x = validate_coordinate("x", x)?;
        let pos_y = validate_coordinate("y", y)?;
        self.node_in(mindmap_id, node_id).await?;

        let node = self
            .store
            .update_node_position(node_id, pos_x, pos_y)
            .await?
            .ok_or_else(|| MindmapError::not_found("Node", node_id))?;

        self.broadcast(
            mindmap_id,
            actor,
            ServerMessage::NodeMoved {
                node_id,
                x: pos_x,
                y: pos_y,
                user_id: actor.user_id,
                username: actor.username.clone(),
            },
        );
        Ok(node)
    }

    /// Delete a node and everything attached to it.
    ///
    /// Returns the deleted node's title and its mindmap id.
    pub async fn delete_node(
        &self,
        mindmap_id: Uuid,
        node_id: Uuid,
        actor: &Actor,
    ) -> MindmapResult<(String, Uuid)> {
        self.node_in(mindmap_id, node_id).await?;
        let node = self
            .store
            .delete_node(node_id)
            .await?
            .ok_or_else(|| MindmapError::not_found("Node", node_id))?;

        self.broadcast(
            mindmap_id,
            actor,
            ServerMessage::NodeDeleted {
                node_id,
                title: node.title.clone(),
                user_id: actor.user_id,
                username: actor.username.clone(),
            },
        );
        Ok((node.title, node.mindmap_id))
    }

    /// Add or remove the actor's recommendation on a node
    pub async fn toggle_recommendation(
        &self,
        mindmap_id: Uuid,
        node_id: Uuid,
        actor: &Actor,
    ) -> MindmapResult<RecommendationToggle> {
        self.node_in(mindmap_id, node_id).await?;
        let (node, added) = self
            .store
            .toggle_recommendation(node_id, actor.user_id)
            .await?
            .ok_or_else(|| MindmapError::not_found("Node", node_id))?;

        let toggle = RecommendationToggle {
            action: if added {
                RecommendationAction::Added
            } else {
                RecommendationAction::Removed
            },
            recommendation_count: node.recommended_by.len() as u32,
        };

        self.broadcast(
            mindmap_id,
            actor,
            ServerMessage::RecommendationToggled {
                node_id,
                action: toggle.action,
                recommendation_count: toggle.recommendation_count,
                user_id: actor.user_id,
                username: actor.username.clone(),
            },
        );
        Ok(toggle)
    }

    // ========================================================================
    // Connection operations
    // ========================================================================

    /// Create a directed connection between two nodes of the same mindmap
    pub async fn create_connection(
        &self,
        mindmap_id: Uuid,
        req: CreateConnectionRequest,
        actor: &Actor,
    ) -> MindmapResult<NodeConnection> {
        if req.from_node_id == req.to_node_id {
            return Err(MindmapError::validation(
                "A node cannot be connected to itself",
            ));
        }

        for node_id in [req.from_node_id, req.to_node_id] {
            match self.store.get_node(node_id).await? {
                Some(node) if node.mindmap_id == mindmap_id => {}
                Some(_) => {
                    return Err(MindmapError::validation(format!(
                        "Node {} does not belong to mindmap {}",
                        node_id, mindmap_id
                    )))
                }
                None => return Err(MindmapError::not_found("Node", node_id)),
            }
        }

        let connection = NodeConnection::new(mindmap_id, req.from_node_id, req.to_node_id);
        if !self.store.create_connection_if_absent(&connection).await? {
            return Err(MindmapError::validation("Connection already exists"));
        }

        self.broadcast(
            mindmap_id,
            actor,
            ServerMessage::ConnectionCreated {
                connection: connection.clone(),
                user_id: actor.user_id,
                username: actor.username.clone(),
            },
        );
        Ok(connection)
    }

    /// Delete a connection of a mindmap
    pub async fn delete_connection(
        &self,
        mindmap_id: Uuid,
        connection_id: Uuid,
        actor: &Actor,
    ) -> MindmapResult<()> {
        match self.store.get_connection(connection_id).await? {
            Some(c) if c.mindmap_id == mindmap_id => {}
            _ => return Err(MindmapError::not_found("Connection", connection_id)),
        }
        if !self.store.delete_connection(connection_id).await? {
            return Err(MindmapError::not_found("Connection", connection_id));
        }

        self.broadcast(
            mindmap_id,
            actor,
            ServerMessage::ConnectionDeleted {
                connection_id,
                user_id: actor.user_id,
                username: actor.username.clone(),
            },
        );
        Ok(())
    }

    // ========================================================================
    // Comment operations
    // ========================================================================

    /// Append a comment to a node
    pub async fn add_comment(
        &self,
        mindmap_id: Uuid,
        node_id: Uuid,
        req: AddCommentRequest,
        actor: &Actor,
    ) -> MindmapResult<Comment> {
        require_text("text", &req.text)?;
        self.node_in(mindmap_id, node_id).await?;

        let comment = Comment::new(node_id, actor.user_id, req.text);
        self.store.create_comment(&comment).await?;

        self.broadcast(
            mindmap_id,
            actor,
            ServerMessage::CommentAdded {
                comment: comment.clone(),
                username: actor.username.clone(),
            },
        );
        Ok(comment)
    }

    /// Comments on a node, oldest first
    pub async fn list_comments(
        &self,
        mindmap_id: Uuid,
        node_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> MindmapResult<(Vec<Comment>, usize)> {
        self.node_in(mindmap_id, node_id).await?;
        Ok(self.store.list_comments(node_id, limit, offset).await?)
    }
}
