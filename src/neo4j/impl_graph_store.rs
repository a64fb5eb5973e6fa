//! `GraphStore` implementation for `Neo4jClient`.
//!
//! Every method simply delegates to the corresponding inherent method on `Neo4jClient`.

use async_trait::async_trait;
use uuid::Uuid;

use super::client::Neo4jClient;
use super::models::*;
use super::traits::GraphStore;

#[async_trait]
impl GraphStore for Neo4jClient {
    async fn is_team_member(&self, team_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        self.is_team_member(team_id, user_id).await
    }

    // ========================================================================
    // Mindmap operations
    // ========================================================================

    async fn create_mindmap(&self, mindmap: &Mindmap) -> anyhow::Result<()> {
        self.create_mindmap(mindmap).await
    }

    async fn get_mindmap(&self, id: Uuid) -> anyhow::Result<Option<Mindmap>> {
        self.get_mindmap(id).await
    }

    async fn list_mindmaps(
        &self,
        team_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> anyhow::Result<(Vec<Mindmap>, usize)> {
        self.list_mindmaps(team_id, limit, offset).await
    }

    async fn delete_mindmap(&self, id: Uuid) -> anyhow::Result<bool> {
        self.delete_mindmap(id).await
    }

    async fn get_mindmap_with_graph(&self, id: Uuid) -> anyhow::Result<Option<MindmapGraph>> {
        self.get_mindmap_with_graph(id).await
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    async fn create_node(&self, node: &Node) -> anyhow::Result<()> {
        self.create_node(node).await
    }

    async fn get_node(&self, id: Uuid) -> anyhow::Result<Option<Node>> {
        self.get_node(id).await
    }

    async fn create_node_with_parent(
        &self,
        node: &Node,
        parent_title: &str,
    ) -> anyhow::Result<Option<NodeConnection>> {
        self.create_node_with_parent(node, parent_title).await
    }

    async fn update_node_position(
        &self,
        id: Uuid,
        pos_x: u32,
        pos_y: u32,
    ) -> anyhow::Result<Option<Node>> {
        self.update_node_position(id, pos_x, pos_y).await
    }

    async fn delete_node(&self, id: Uuid) -> anyhow::Result<Option<Node>> {
        self.delete_node(id).await
    }

    async fn toggle_recommendation(
        &self,
        node_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<(Node, bool)>> {
        self.toggle_recommendation(node_id, user_id).await
    }

    // ========================================================================
    // Connection operations
    // ========================================================================

    async fn create_connection_if_absent(
        &self,
        connection: &NodeConnection,
    ) -> anyhow::Result<bool> {
        self.create_connection_if_absent(connection).await
    }

    async fn get_connection(&self, id: Uuid) -> anyhow::Result<Option<NodeConnection>> {
        self.get_connection(id).await
    }

    async fn delete_connection(&self, id: Uuid) -> anyhow::Result<bool> {
        self.delete_connection(id).await
    }

    // ========================================================================
    // Comment operations
    // ========================================================================

    async fn create_comment(&self, comment: &Comment) -> anyhow::Result<()> {
        self.create_comment(comment).await
    }

    async fn list_comments(
        &self,
        node_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> anyhow::Result<(Vec<Comment>, usize)> {
        self.list_comments(node_id, limit, offset).await
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        self.health_check().await
    }
}
