//! In-memory mock implementation of GraphStore for testing.
//!
//! Provides a complete mock of all graph operations using
//! `tokio::sync::RwLock<HashMap<K, V>>` collections.
//! Conditionally compiled with `#[cfg(test)]`.
//!
//! Locks are always taken in the order mindmaps → nodes → connections → comments.

use crate::neo4j::models::*;
use crate::neo4j::traits::GraphStore;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory mock implementation of GraphStore for testing.
pub struct MockGraphStore {
    pub mindmaps: RwLock<HashMap<Uuid, Mindmap>>,
    pub nodes: RwLock<HashMap<Uuid, Node>>,
    pub connections: RwLock<HashMap<Uuid, NodeConnection>>,
    pub comments: RwLock<HashMap<Uuid, Comment>>,
    /// (team_id, user_id) membership records
    pub memberships: RwLock<HashSet<(Uuid, Uuid)>>,
    /// When set, every call fails as if the database were unreachable
    pub fail_all: AtomicBool,
}

impl Default for MockGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGraphStore {
    /// Create a new empty MockGraphStore.
    pub fn new() -> Self {
        Self {
            mindmaps: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            comments: RwLock::new(HashMap::new()),
            memberships: RwLock::new(HashSet::new()),
            fail_all: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Builder / seeding methods for tests
    // ========================================================================

    /// Seed a team membership record.
    pub async fn with_member(self, team_id: Uuid, user_id: Uuid) -> Self {
        self.memberships.write().await.insert((team_id, user_id));
        self
    }

    /// Seed a mindmap.
    pub async fn with_mindmap(self, mindmap: Mindmap) -> Self {
        self.mindmaps.write().await.insert(mindmap.id, mindmap);
        self
    }

    /// Seed a node.
    pub async fn with_node(self, node: Node) -> Self {
        self.nodes.write().await.insert(node.id, node);
        self
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            bail!("mock store unavailable");
        }
        Ok(())
    }
}

fn paginate<T: Clone>(items: &[T], limit: usize, offset: usize) -> Vec<T> {
    items.iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn is_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_available()?;
        Ok(self.memberships.read().await.contains(&(team_id, user_id)))
    }

    // ========================================================================
    // Mindmap operations
    // ========================================================================

    async fn create_mindmap(&self, mindmap: &Mindmap) -> Result<()> {
        self.check_available()?;
        self.mindmaps
            .write()
            .await
            .insert(mindmap.id, mindmap.clone());
        Ok(())
    }

    async fn get_mindmap(&self, id: Uuid) -> Result<Option<Mindmap>> {
        self.check_available()?;
        Ok(self.mindmaps.read().await.get(&id).cloned())
    }

    async fn list_mindmaps(
        &self,
        team_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Mindmap>, usize)> {
        self.check_available()?;
        let mindmaps = self.mindmaps.read().await;
        let mut owned: Vec<Mindmap> = mindmaps
            .values()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = owned.len();
        Ok((paginate(&owned, limit, offset), total))
    }

    async fn delete_mindmap(&self, id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut mindmaps = self.mindmaps.write().await;
        let mut nodes = self.nodes.write().await;
        let mut connections = self.connections.write().await;
        let mut comments = self.comments.write().await;

        if mindmaps.remove(&id).is_none() {
            return Ok(false);
        }
        let node_ids: HashSet<Uuid> = nodes
            .values()
            .filter(|n| n.mindmap_id == id)
            .map(|n| n.id)
            .collect();
        comments.retain(|_, c| !node_ids.contains(&c.node_id));
        connections.retain(|_, c| c.mindmap_id != id);
        nodes.retain(|_, n| n.mindmap_id != id);
        Ok(true)
    }

    async fn get_mindmap_with_graph(&self, id: Uuid) -> Result<Option<MindmapGraph>> {
        self.check_available()?;
        let mindmaps = self.mindmaps.read().await;
        let nodes = self.nodes.read().await;
        let connections = self.connections.read().await;

        let mindmap = match mindmaps.get(&id) {
            Some(m) => m.clone(),
            None => return Ok(None),
        };
        let mut graph_nodes: Vec<Node> = nodes
            .values()
            .filter(|n| n.mindmap_id == id)
            .cloned()
            .collect();
        graph_nodes.sort_by_key(|n| n.created_at);
        let graph_connections = connections
            .values()
            .filter(|c| c.mindmap_id == id)
            .cloned()
            .collect();

        Ok(Some(MindmapGraph {
            mindmap,
            nodes: graph_nodes,
            connections: graph_connections,
        }))
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    async fn create_node(&self, node: &Node) -> Result<()> {
        self.check_available()?;
        if !self.mindmaps.read().await.contains_key(&node.mindmap_id) {
            bail!("Mindmap {} not found", node.mindmap_id);
        }
        self.nodes.write().await.insert(node.id, node.clone());
        Ok(())
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        self.check_available()?;
        Ok(self.nodes.read().await.get(&id).cloned())
    }

    async fn create_node_with_parent(
        &self,
        node: &Node,
        parent_title: &str,
    ) -> Result<Option<NodeConnection>> {
        self.check_available()?;
        let mindmaps = self.mindmaps.read().await;
        let mut nodes = self.nodes.write().await;
        let mut connections = self.connections.write().await;

        if !mindmaps.contains_key(&node.mindmap_id) {
            bail!("Mindmap {} not found", node.mindmap_id);
        }
        let parent_id = nodes
            .values()
            .filter(|n| n.mindmap_id == node.mindmap_id && n.title == parent_title)
            .min_by_key(|n| n.created_at)
            .map(|n| n.id);

        nodes.insert(node.id, node.clone());
        let connection = parent_id.map(|parent_id| {
            let connection = NodeConnection::new(node.mindmap_id, node.id, parent_id);
            connections.insert(connection.id, connection.clone());
            connection
        });
        Ok(connection)
    }

    async fn update_node_position(
        &self,
        id: Uuid,
        pos_x: u32,
        pos_y: u32,
    ) -> Result<Option<Node>> {
        self.check_available()?;
        let mut nodes = self.nodes.write().await;
        Ok(nodes.get_mut(&id).map(|node| {
            node.pos_x = pos_x;
            node.pos_y = pos_y;
            node.updated_at = chrono::Utc::now();
            node.clone()
        }))
    }

    async fn delete_node(&self, id: Uuid) -> Result<Option<Node>> {
        self.check_available()?;
        let mut nodes = self.nodes.write().await;
        let mut connections = self.connections.write().await;
        let mut comments = self.comments.write().await;

        let removed = nodes.remove(&id);
        if removed.is_some() {
            connections.retain(|_, c| !c.touches(id));
            comments.retain(|_, c| c.node_id != id);
        }
        Ok(removed)
    }

    async fn toggle_recommendation(
        &self,
        node_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<(Node, bool)>> {
        self.check_available()?;
        let mut nodes = self.nodes.write().await;
        Ok(nodes.get_mut(&node_id).map(|node| {
            let added = node.toggle_recommendation(user_id);
            node.updated_at = chrono::Utc::now();
            (node.clone(), added)
        }))
    }

    // ========================================================================
    // Connection operations
    // ========================================================================

    async fn create_connection_if_absent(&self, connection: &NodeConnection) -> Result<bool> {
        self.check_available()?;
        let nodes = self.nodes.read().await;
        let mut connections = self.connections.write().await;

        let endpoints_ok = [connection.from_node_id, connection.to_node_id]
            .iter()
            .all(|id| {
                nodes
                    .get(id)
                    .is_some_and(|n| n.mindmap_id == connection.mindmap_id)
            });
        if !endpoints_ok {
            bail!(
                "Connection endpoints {} -> {} not found in mindmap {}",
                connection.from_node_id,
                connection.to_node_id,
                connection.mindmap_id
            );
        }

        let duplicate = connections.values().any(|c| {
            c.mindmap_id == connection.mindmap_id
                && c.from_node_id == connection.from_node_id
                && c.to_node_id == connection.to_node_id
        });
        if duplicate {
            return Ok(false);
        }
        connections.insert(connection.id, connection.clone());
        Ok(true)
    }

    async fn get_connection(&self, id: Uuid) -> Result<Option<NodeConnection>> {
        self.check_available()?;
        Ok(self.connections.read().await.get(&id).cloned())
    }

    async fn delete_connection(&self, id: Uuid) -> Result<bool> {
        self.check_available()?;
        Ok(self.connections.write().await.remove(&id).is_some())
    }

    // ========================================================================
    // Comment operations
    // ========================================================================

    async fn create_comment(&self, comment: &Comment) -> Result<()> {
        self.check_available()?;
        if !self.nodes.read().await.contains_key(&comment.node_id) {
            bail!("Node {} not found", comment.node_id);
        }
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        Ok(())
    }

    async fn list_comments(
        &self,
        node_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Comment>, usize)> {
        self.check_available()?;
        let comments = self.comments.read().await;
        let mut on_node: Vec<Comment> = comments
            .values()
            .filter(|c| c.node_id == node_id)
            .cloned()
            .collect();
        on_node.sort_by_key(|c| c.created_at);
        let total = on_node.len();
        Ok((paginate(&on_node, limit, offset), total))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail_all.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_node_cascades_edges_and_comments_only() {
        let mindmap = Mindmap::new(Uuid::new_v4(), "Map");
        let a = Node::new(mindmap.id, 0, 0, "A", "a");
        let b = Node::new(mindmap.id, 0, 0, "B", "b");
        let c = Node::new(mindmap.id, 0, 0, "C", "c");
        let store = MockGraphStore::new()
            .with_mindmap(mindmap.clone())
            .await
            .with_node(a.clone())
            .await
            .with_node(b.clone())
            .await
            .with_node(c.clone())
            .await;

        assert!(store
            .create_connection_if_absent(&NodeConnection::new(mindmap.id, a.id, b.id))
            .await
            .unwrap());
        assert!(store
            .create_connection_if_absent(&NodeConnection::new(mindmap.id, c.id, a.id))
            .await
            .unwrap());
        let sibling = NodeConnection::new(mindmap.id, b.id, c.id);
        assert!(store.create_connection_if_absent(&sibling).await.unwrap());
        store
            .create_comment(&Comment::new(a.id, Uuid::new_v4(), "on a"))
            .await
            .unwrap();
        let kept = Comment::new(b.id, Uuid::new_v4(), "on b");
        store.create_comment(&kept).await.unwrap();

        let removed = store.delete_node(a.id).await.unwrap().unwrap();
        assert_eq!(removed.id, a.id);

        let connections = store.connections.read().await;
        assert_eq!(connections.len(), 1);
        assert!(connections.contains_key(&sibling.id));
        let comments = store.comments.read().await;
        assert_eq!(comments.len(), 1);
        assert!(comments.contains_key(&kept.id));
    }

    #[tokio::test]
    async fn test_duplicate_connection_not_written() {
        let mindmap = Mindmap::new(Uuid::new_v4(), "Map");
        let a = Node::new(mindmap.id, 0, 0, "A", "a");
        let b = Node::new(mindmap.id, 0, 0, "B", "b");
        let store = MockGraphStore::new()
            .with_mindmap(mindmap.clone())
            .await
            .with_node(a.clone())
            .await
            .with_node(b.clone())
            .await;

        assert!(store
            .create_connection_if_absent(&NodeConnection::new(mindmap.id, a.id, b.id))
            .await
            .unwrap());
        assert!(!store
            .create_connection_if_absent(&NodeConnection::new(mindmap.id, a.id, b.id))
            .await
            .unwrap());
        // Reverse direction is a different edge
        assert!(store
            .create_connection_if_absent(&NodeConnection::new(mindmap.id, b.id, a.id))
            .await
            .unwrap());
        assert_eq!(store.connections.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_create_node_with_parent_links_oldest_match() {
        let mindmap = Mindmap::new(Uuid::new_v4(), "Map");
        let mut older = Node::new(mindmap.id, 0, 0, "Root", "first");
        older.created_at -= chrono::Duration::seconds(10);
        let newer = Node::new(mindmap.id, 0, 0, "Root", "second");
        let store = MockGraphStore::new()
            .with_mindmap(mindmap.clone())
            .await
            .with_node(older.clone())
            .await
            .with_node(newer)
            .await;

        let child = Node::new(mindmap.id, 1, 1, "Child", "c");
        let link = store
            .create_node_with_parent(&child, "Root")
            .await
            .unwrap()
            .expect("parent exists");
        assert_eq!(link.from_node_id, child.id);
        assert_eq!(link.to_node_id, older.id);
        assert!(store.connections.read().await.contains_key(&link.id));

        let orphan = Node::new(mindmap.id, 1, 1, "Orphan", "o");
        assert!(store
            .create_node_with_parent(&orphan, "Nobody")
            .await
            .unwrap()
            .is_none());
        assert!(store.nodes.read().await.contains_key(&orphan.id));
        assert_eq!(store.connections.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_node_with_parent_never_links_to_itself() {
        let mindmap = Mindmap::new(Uuid::new_v4(), "Map");
        let store = MockGraphStore::new().with_mindmap(mindmap.clone()).await;
        let node = Node::new(mindmap.id, 0, 0, "Loop", "l");
        assert!(store
            .create_node_with_parent(&node, "Loop")
            .await
            .unwrap()
            .is_none());
        assert!(store.connections.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_mindmaps_scoped_and_paginated() {
        let team = Uuid::new_v4();
        let store = MockGraphStore::new();
        for i in 0..5 {
            store
                .create_mindmap(&Mindmap::new(team, format!("Map {}", i)))
                .await
                .unwrap();
        }
        store
            .create_mindmap(&Mindmap::new(Uuid::new_v4(), "Other team"))
            .await
            .unwrap();

        let (page, total) = store.list_mindmaps(team, 2, 1).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|m| m.team_id == team));
    }

    #[tokio::test]
    async fn test_fail_all_surfaces_errors() {
        let store = MockGraphStore::new();
        store.fail_all.store(true, Ordering::SeqCst);
        assert!(store.get_mindmap(Uuid::new_v4()).await.is_err());
        assert!(!store.health_check().await.unwrap());
    }
}
