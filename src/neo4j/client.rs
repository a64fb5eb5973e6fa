//! Neo4j client for the mindmap graph
//!
//! Graph layout:
//! - `(:Mindmap {id, title, team_id, created_at})`
//! - `(:Mindmap)-[:HAS_NODE]->(:MapNode {id, mindmap_id, pos_x, pos_y, ...})`
//! - `(:MapNode)-[:CONNECTS_TO {id, mindmap_id}]->(:MapNode)`
//! - `(:Comment {id, node_id, user_id, text, created_at})-[:COMMENTS_ON]->(:MapNode)`
//! - `(:User {id})-[:MEMBER_OF]->(:Team {id})` (written by the team subsystem, read here)

use super::models::*;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph, Query};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Client for Neo4j operations
pub struct Neo4jClient {
    graph: Arc<Graph>,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Neo4jClient {
    /// Create a new Neo4j client
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;

        let client = Self {
            graph: Arc::new(graph),
        };

        client.init_schema().await?;

        Ok(client)
    }

    /// Initialize the graph schema with constraints and indexes
    async fn init_schema(&self) -> Result<()> {
        let constraints = vec![
            "CREATE CONSTRAINT mindmap_id IF NOT EXISTS FOR (m:Mindmap) REQUIRE m.id IS UNIQUE",
            "CREATE CONSTRAINT map_node_id IF NOT EXISTS FOR (n:MapNode) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT comment_id IF NOT EXISTS FOR (c:Comment) REQUIRE c.id IS UNIQUE",
        ];

        let indexes = vec![
            "CREATE INDEX mindmap_team IF NOT EXISTS FOR (m:Mindmap) ON (m.team_id)",
            "CREATE INDEX map_node_mindmap IF NOT EXISTS FOR (n:MapNode) ON (n.mindmap_id)",
            "CREATE INDEX map_node_title IF NOT EXISTS FOR (n:MapNode) ON (n.mindmap_id, n.title)",
            "CREATE INDEX comment_node IF NOT EXISTS FOR (c:Comment) ON (c.node_id)",
        ];

        for constraint in constraints {
            if let Err(e) = self.graph.run(query(constraint)).await {
                tracing::warn!("Constraint may already exist: {}", e);
            }
        }

        for index in indexes {
            if let Err(e) = self.graph.run(query(index)).await {
                tracing::warn!("Index may already exist: {}", e);
            }
        }

        Ok(())
    }

    /// Execute a parameterized Cypher query and collect every row
    async fn execute_with_params(&self, q: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Run a single `RETURN count(...) AS total` query
    async fn count(&self, q: Query) -> Result<usize> {
        let mut result = self.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(row.get::<i64>("total")?.max(0) as usize),
            None => Ok(0),
        }
    }

    // ========================================================================
    // Team membership
    // ========================================================================

    /// Whether `(:User {id: user_id})-[:MEMBER_OF]->(:Team {id: team_id})` exists
    pub async fn is_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool> {
        let q = query(
            r#"
            MATCH (u:User {id: $user_id})-[:MEMBER_OF]->(t:Team {id: $team_id})
            RETURN count(u) AS total
            "#,
        )
        .param("user_id", user_id.to_string())
        .param("team_id", team_id.to_string());

        Ok(self.count(q).await? > 0)
    }

    // ========================================================================
    // Mindmap operations
    // ========================================================================

    /// Create a new mindmap
    pub async fn create_mindmap(&self, mindmap: &Mindmap) -> Result<()> {
        let q = query(
            r#"
            CREATE (m:Mindmap {
                id: $id,
                title: $title,
                team_id: $team_id,
                created_at: $created_at
            })
            "#,
        )
        .param("id", mindmap.id.to_string())
        .param("title", mindmap.title.clone())
        .param("team_id", mindmap.team_id.to_string())
        .param("created_at", mindmap.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Get a mindmap by ID
    pub async fn get_mindmap(&self, id: Uuid) -> Result<Option<Mindmap>> {
        let q = query(
            r#"
            MATCH (m:Mindmap {id: $id})
            RETURN m
            "#,
        )
        .param("id", id.to_string());

        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            let node: neo4rs::Node = row.get("m")?;
            Ok(Some(Self::node_to_mindmap(&node)?))
        } else {
            Ok(None)
        }
    }

    /// List a team's mindmaps, newest first
    pub async fn list_mindmaps(
        &self,
        team_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Mindmap>, usize)> {
        let total = self
            .count(
                query("MATCH (m:Mindmap {team_id: $team_id}) RETURN count(m) AS total")
                    .param("team_id", team_id.to_string()),
            )
            .await?;

        let q = query(
            r#"
            MATCH (m:Mindmap {team_id: $team_id})
            RETURN m
            ORDER BY m.created_at DESC
            SKIP $offset
            LIMIT $limit
            "#,
        )
        .param("team_id", team_id.to_string())
        .param("offset", offset as i64)
        .param("limit", limit as i64);

        let mindmaps = self
            .execute_with_params(q)
            .await?
            .into_iter()
            .filter_map(|row| row.get::<neo4rs::Node>("m").ok())
            .filter_map(|node| Self::node_to_mindmap(&node).ok())
            .collect();

        Ok((mindmaps, total))
    }

    /// Delete a mindmap and everything under it.
    ///
    /// Comments, edges, nodes and the mindmap are removed in that order inside
    /// one transaction.
    pub async fn delete_mindmap(&self, id: Uuid) -> Result<bool> {
        if self.get_mindmap(id).await?.is_none() {
            return Ok(false);
        }

        let id = id.to_string();
        let mut txn = self.graph.start_txn().await?;
        txn.run_queries([
            query(
                r#"
                MATCH (c:Comment)-[:COMMENTS_ON]->(n:MapNode {mindmap_id: $id})
                DETACH DELETE c
                "#,
            )
            .param("id", id.clone()),
            query(
                r#"
                MATCH (:MapNode {mindmap_id: $id})-[r:CONNECTS_TO]-()
                DELETE r
                "#,
            )
            .param("id", id.clone()),
            query(
                r#"
                MATCH (n:MapNode {mindmap_id: $id})
                DETACH DELETE n
                "#,
            )
            .param("id", id.clone()),
            query(
                r#"
                MATCH (m:Mindmap {id: $id})
                DETACH DELETE m
                "#,
            )
            .param("id", id),
        ])
        .await?;
        txn.commit().await?;

        Ok(true)
    }

    /// Mindmap plus all nodes and edges in a single query
    pub async fn get_mindmap_with_graph(&self, id: Uuid) -> Result<Option<MindmapGraph>> {
        let q = query(
            r#"
            MATCH (m:Mindmap {id: $id})
            OPTIONAL MATCH (m)-[:HAS_NODE]->(n:MapNode)
            WITH m, collect(n) AS nodes
            OPTIONAL MATCH (m)-[:HAS_NODE]->(a:MapNode)-[r:CONNECTS_TO]->(b:MapNode)
            RETURN m, nodes,
                   collect(r.id) AS conn_ids,
                   collect(a.id) AS conn_from,
                   collect(b.id) AS conn_to
            "#,
        )
        .param("id", id.to_string());

        let mut result = self.graph.execute(q).await?;
        let row = match result.next().await? {
            Some(r) => r,
            None => return Ok(None),
        };

        let mindmap_node: neo4rs::Node = row.get("m")?;
        let mindmap = Self::node_to_mindmap(&mindmap_node)?;

        let node_rows: Vec<neo4rs::Node> = row.get("nodes").unwrap_or_default();
        let mut nodes: Vec<Node> = node_rows
            .iter()
            .filter_map(|n| Self::node_to_map_node(n).ok())
            .collect();
        nodes.sort_by_key(|n| n.created_at);

        let conn_ids: Vec<String> = row.get("conn_ids").unwrap_or_default();
        let conn_from: Vec<String> = row.get("conn_from").unwrap_or_default();
        let conn_to: Vec<String> = row.get("conn_to").unwrap_or_default();
        let connections = conn_ids
            .iter()
            .zip(conn_from.iter())
            .zip(conn_to.iter())
            .filter_map(|((cid, from), to)| {
                Some(NodeConnection {
                    id: cid.parse().ok()?,
                    mindmap_id: mindmap.id,
                    from_node_id: from.parse().ok()?,
                    to_node_id: to.parse().ok()?,
                })
            })
            .collect();

        Ok(Some(MindmapGraph {
            mindmap,
            nodes,
            connections,
        }))
    }

    fn node_to_mindmap(node: &neo4rs::Node) -> Result<Mindmap> {
        Ok(Mindmap {
            id: node.get::<String>("id")?.parse()?,
            title: node.get("title")?,
            team_id: node.get::<String>("team_id")?.parse()?,
            created_at: node
                .get::<String>("created_at")
                .ok()
                .and_then(|s| parse_timestamp(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    /// Create a node and attach it to its mindmap
    pub async fn create_node(&self, node: &Node) -> Result<()> {
        let q = query(
            r#"
            MATCH (m:Mindmap {id: $mindmap_id})
            CREATE (m)-[:HAS_NODE]->(n:MapNode {
                id: $id,
                mindmap_id: $mindmap_id,
                pos_x: $pos_x,
                pos_y: $pos_y,
                title: $title,
                content: $content,
                recommendation_count: $recommendation_count,
                recommended_by: $recommended_by,
                created_at: $created_at,
                updated_at: $updated_at
            })
            RETURN n.id AS id
            "#,
        )
        .param("id", node.id.to_string())
        .param("mindmap_id", node.mindmap_id.to_string())
        .param("pos_x", node.pos_x as i64)
        .param("pos_y", node.pos_y as i64)
        .param("title", node.title.clone())
        .param("content", node.content.clone())
        .param("recommendation_count", node.recommended_by.len() as i64)
        .param(
            "recommended_by",
            node.recommended_by
                .iter()
                .map(|u| u.to_string())
                .collect::<Vec<_>>(),
        )
        .param("created_at", node.created_at.to_rfc3339())
        .param("updated_at", node.updated_at.to_rfc3339());

        if self.execute_with_params(q).await?.is_empty() {
            bail!("Mindmap {} not found", node.mindmap_id);
        }
        Ok(())
    }

    /// Get a node by ID
    pub async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        let q = query("MATCH (n:MapNode {id: $id}) RETURN n").param("id", id.to_string());
        self.single_map_node(q).await
    }

    /// Create a node and, in the same statement, link it to the oldest node
    /// titled `parent_title`. A parent that does not exist at write time
    /// yields an unlinked node.
    pub async fn create_node_with_parent(
        &self,
        node: &Node,
        parent_title: &str,
    ) -> Result<Option<NodeConnection>> {
        let connection_id = Uuid::new_v4();
        let q = query(
            r#"
            MATCH (m:Mindmap {id: $mindmap_id})
            OPTIONAL MATCH (p:MapNode {mindmap_id: $mindmap_id, title: $parent_title})
            WITH m, p
            ORDER BY p.created_at ASC
            LIMIT 1
            CREATE (m)-[:HAS_NODE]->(n:MapNode {
                id: $id,
                mindmap_id: $mindmap_id,
                pos_x: $pos_x,
                pos_y: $pos_y,
                title: $title,
                content: $content,
                recommendation_count: $recommendation_count,
                recommended_by: $recommended_by,
                created_at: $created_at,
                updated_at: $updated_at
            })
            FOREACH (_ IN CASE WHEN p IS NULL THEN [] ELSE [1] END |
                CREATE (n)-[:CONNECTS_TO {id: $connection_id, mindmap_id: $mindmap_id}]->(p)
            )
            RETURN n.id AS id, coalesce(p.id, '') AS parent_id
            "#,
        )
        .param("id", node.id.to_string())
        .param("mindmap_id", node.mindmap_id.to_string())
        .param("parent_title", parent_title.to_string())
        .param("connection_id", connection_id.to_string())
        .param("pos_x", node.pos_x as i64)
        .param("pos_y", node.pos_y as i64)
        .param("title", node.title.clone())
        .param("content", node.content.clone())
        .param("recommendation_count", node.recommended_by.len() as i64)
        .param(
            "recommended_by",
            node.recommended_by
                .iter()
                .map(|u| u.to_string())
                .collect::<Vec<_>>(),
        )
        .param("created_at", node.created_at.to_rfc3339())
        .param("updated_at", node.updated_at.to_rfc3339());

        let rows = self.execute_with_params(q).await?;
        let Some(row) = rows.first() else {
            bail!("Mindmap {} not found", node.mindmap_id);
        };
        let parent_id: String = row.get("parent_id")?;
        if parent_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(NodeConnection {
            id: connection_id,
            mindmap_id: node.mindmap_id,
            from_node_id: node.id,
            to_node_id: parent_id.parse()?,
        }))
    }

    /// Overwrite a node's position (last write wins)
    pub async fn update_node_position(
        &self,
        id: Uuid,
        pos_x: u32,
        pos_y: u32,
    ) -> Result<Option<Node>> {
        let q = query(
            r#"
            MATCH (n:MapNode {id: $id})
            SET n.pos_x = $pos_x, n.pos_y = $pos_y, n.updated_at = $now
            RETURN n
            "#,
        )
        .param("id", id.to_string())
        .param("pos_x", pos_x as i64)
        .param("pos_y", pos_y as i64)
        .param("now", Utc::now().to_rfc3339());
        self.single_map_node(q).await
    }

    /// Delete a node with its edges and comments in one transaction
    pub async fn delete_node(&self, id: Uuid) -> Result<Option<Node>> {
        let node = match self.get_node(id).await? {
            Some(n) => n,
            None => return Ok(None),
        };

        let id = id.to_string();
        let mut txn = self.graph.start_txn().await?;
        txn.run_queries([
            query(
                r#"
                MATCH (c:Comment {node_id: $id})
                DETACH DELETE c
                "#,
            )
            .param("id", id.clone()),
            query(
                r#"
                MATCH (:MapNode {id: $id})-[r:CONNECTS_TO]-()
                DELETE r
                "#,
            )
            .param("id", id.clone()),
            query(
                r#"
                MATCH (n:MapNode {id: $id})
                DETACH DELETE n
                "#,
            )
            .param("id", id),
        ])
        .await?;
        txn.commit().await?;

        Ok(Some(node))
    }

    /// Flip a user's recommendation and recompute the count from the list.
    ///
    /// The leading `SET` takes the node's write lock before the list is read,
    /// so concurrent toggles serialize.
    pub async fn toggle_recommendation(
        &self,
        node_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<(Node, bool)>> {
        let q = query(
            r#"
            MATCH (n:MapNode {id: $id})
            SET n.updated_at = $now
            WITH n, coalesce(n.recommended_by, []) AS current
            WITH n, current, $user_id IN current AS present
            SET n.recommended_by = CASE
                    WHEN present THEN [x IN current WHERE x <> $user_id]
                    ELSE current + $user_id
                END
            SET n.recommendation_count = size(n.recommended_by)
            RETURN n, NOT present AS added
            "#,
        )
        .param("id", node_id.to_string())
        .param("user_id", user_id.to_string())
        .param("now", Utc::now().to_rfc3339());

        let mut result = self.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => {
                let node: neo4rs::Node = row.get("n")?;
                let added: bool = row.get("added")?;
                Ok(Some((Self::node_to_map_node(&node)?, added)))
            }
            None => Ok(None),
        }
    }

    async fn single_map_node(&self, q: Query) -> Result<Option<Node>> {
        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            let node: neo4rs::Node = row.get("n")?;
            Ok(Some(Self::node_to_map_node(&node)?))
        } else {
            Ok(None)
        }
    }

    fn node_to_map_node(node: &neo4rs::Node) -> Result<Node> {
        let recommended_by: BTreeSet<Uuid> = node
            .get::<Vec<String>>("recommended_by")
            .unwrap_or_default()
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        let created_at = node
            .get::<String>("created_at")
            .ok()
            .and_then(|s| parse_timestamp(&s))
            .unwrap_or_else(Utc::now);

        let mut parsed = Node {
            id: node.get::<String>("id")?.parse()?,
            mindmap_id: node.get::<String>("mindmap_id")?.parse()?,
            pos_x: node.get::<i64>("pos_x")?.clamp(0, u32::MAX as i64) as u32,
            pos_y: node.get::<i64>("pos_y")?.clamp(0, u32::MAX as i64) as u32,
            title: node.get("title")?,
            content: node.get("content").unwrap_or_default(),
            recommendation_count: 0,
            recommended_by,
            created_at,
            updated_at: node
                .get::<String>("updated_at")
                .ok()
                .and_then(|s| parse_timestamp(&s))
                .unwrap_or(created_at),
        };
        parsed.recount();
        Ok(parsed)
    }

    // ========================================================================
    // Connection operations
    // ========================================================================

    /// MERGE the edge; the stored id tells whether this call created it
    pub async fn create_connection_if_absent(&self, connection: &NodeConnection) -> Result<bool> {
        let q = query(
            r#"
            MATCH (a:MapNode {id: $from_id, mindmap_id: $mindmap_id})
            MATCH (b:MapNode {id: $to_id, mindmap_id: $mindmap_id})
            MERGE (a)-[r:CONNECTS_TO {mindmap_id: $mindmap_id}]->(b)
            ON CREATE SET r.id = $id
            RETURN r.id AS id
            "#,
        )
        .param("id", connection.id.to_string())
        .param("mindmap_id", connection.mindmap_id.to_string())
        .param("from_id", connection.from_node_id.to_string())
        .param("to_id", connection.to_node_id.to_string());

        let rows = self.execute_with_params(q).await?;
        let row = match rows.first() {
            Some(r) => r,
            None => bail!(
                "Connection endpoints {} -> {} not found in mindmap {}",
                connection.from_node_id,
                connection.to_node_id,
                connection.mindmap_id
            ),
        };
        let stored: String = row.get("id")?;
        Ok(stored == connection.id.to_string())
    }

    /// Get a connection by ID
    pub async fn get_connection(&self, id: Uuid) -> Result<Option<NodeConnection>> {
        let q = query(
            r#"
            MATCH (a:MapNode)-[r:CONNECTS_TO {id: $id}]->(b:MapNode)
            RETURN r.id AS id, r.mindmap_id AS mindmap_id, a.id AS from_id, b.id AS to_id
            "#,
        )
        .param("id", id.to_string());

        let mut result = self.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(Some(NodeConnection {
                id: row.get::<String>("id")?.parse()?,
                mindmap_id: row.get::<String>("mindmap_id")?.parse()?,
                from_node_id: row.get::<String>("from_id")?.parse()?,
                to_node_id: row.get::<String>("to_id")?.parse()?,
            })),
            None => Ok(None),
        }
    }

    /// Delete a connection by ID
    pub async fn delete_connection(&self, id: Uuid) -> Result<bool> {
        let q = query(
            r#"
            MATCH ()-[r:CONNECTS_TO {id: $id}]->()
            DELETE r
            RETURN count(*) AS total
            "#,
        )
        .param("id", id.to_string());
        Ok(self.count(q).await? > 0)
    }

    // ========================================================================
    // Comment operations
    // ========================================================================

    /// Append a comment to a node
    pub async fn create_comment(&self, comment: &Comment) -> Result<()> {
        let q = query(
            r#"
            MATCH (n:MapNode {id: $node_id})
            CREATE (c:Comment {
                id: $id,
                node_id: $node_id,
                user_id: $user_id,
                text: $text,
                created_at: $created_at
            })-[:COMMENTS_ON]->(n)
            RETURN c.id AS id
            "#,
        )
        .param("id", comment.id.to_string())
        .param("node_id", comment.node_id.to_string())
        .param("user_id", comment.user_id.to_string())
        .param("text", comment.text.clone())
        .param("created_at", comment.created_at.to_rfc3339());

        if self.execute_with_params(q).await?.is_empty() {
            bail!("Node {} not found", comment.node_id);
        }
        Ok(())
    }

    /// List a node's comments, oldest first
    pub async fn list_comments(
        &self,
        node_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Comment>, usize)> {
        let total = self
            .count(
                query("MATCH (c:Comment {node_id: $node_id}) RETURN count(c) AS total")
                    .param("node_id", node_id.to_string()),
            )
            .await?;

        let q = query(
            r#"
            MATCH (c:Comment {node_id: $node_id})
            RETURN c
            ORDER BY c.created_at ASC
            SKIP $offset
            LIMIT $limit
            "#,
        )
        .param("node_id", node_id.to_string())
        .param("offset", offset as i64)
        .param("limit", limit as i64);

        let comments = self
            .execute_with_params(q)
            .await?
            .into_iter()
            .filter_map(|row| row.get::<neo4rs::Node>("c").ok())
            .filter_map(|node| Self::node_to_comment(&node).ok())
            .collect();

        Ok((comments, total))
    }

    fn node_to_comment(node: &neo4rs::Node) -> Result<Comment> {
        Ok(Comment {
            id: node.get::<String>("id")?.parse()?,
            node_id: node.get::<String>("node_id")?.parse()?,
            user_id: node.get::<String>("user_id")?.parse()?,
            text: node.get("text")?,
            created_at: node
                .get::<String>("created_at")
                .ok()
                .and_then(|s| parse_timestamp(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<bool> {
        let mut result = self.graph.execute(query("RETURN 1 AS ok")).await?;
        Ok(result.next().await?.is_some())
    }
}
