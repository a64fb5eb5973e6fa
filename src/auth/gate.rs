//! Access gate: may this user touch this team's mindmap?
//!
//! Both checks are side-effect-free reads. A store failure counts as a denial.

use crate::neo4j::traits::GraphStore;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AccessGate {
    store: Arc<dyn GraphStore>,
}

impl AccessGate {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// True only if the user belongs to the team and the team owns the mindmap.
    pub async fn authorize(&self, user_id: Uuid, team_id: Uuid, mindmap_id: Uuid) -> bool {
        if !self.authorize_team(user_id, team_id).await {
            return false;
        }

        match self.store.get_mindmap(mindmap_id).await {
            Ok(Some(mindmap)) if mindmap.team_id == team_id => true,
            Ok(Some(_)) => {
                debug!(
                    user_id = %user_id,
                    team_id = %team_id,
                    mindmap_id = %mindmap_id,
                    "Access denied: mindmap belongs to another team"
                );
                false
            }
            Ok(None) => {
                debug!(mindmap_id = %mindmap_id, "Access denied: mindmap not found");
                false
            }
            Err(e) => {
                warn!(mindmap_id = %mindmap_id, "Access gate mindmap lookup failed: {}", e);
                false
            }
        }
    }

    /// True only if the user belongs to the team.
    pub async fn authorize_team(&self, user_id: Uuid, team_id: Uuid) -> bool {
        match self.store.is_team_member(team_id, user_id).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(user_id = %user_id, team_id = %team_id, "Access denied: not a team member");
                false
            }
            Err(e) => {
                warn!(user_id = %user_id, team_id = %team_id, "Access gate membership lookup failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neo4j::mock::MockGraphStore;
    use crate::neo4j::models::Mindmap;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_member_of_owning_team_is_allowed() {
        let (team, user) = (Uuid::new_v4(), Uuid::new_v4());
        let mindmap = Mindmap::new(team, "Map");
        let store = MockGraphStore::new()
            .with_member(team, user)
            .await
            .with_mindmap(mindmap.clone())
            .await;
        let gate = AccessGate::new(Arc::new(store));

        assert!(gate.authorize(user, team, mindmap.id).await);
        assert!(gate.authorize_team(user, team).await);
    }

    #[tokio::test]
    async fn test_non_member_denied() {
        let team = Uuid::new_v4();
        let mindmap = Mindmap::new(team, "Map");
        let store = MockGraphStore::new().with_mindmap(mindmap.clone()).await;
        let gate = AccessGate::new(Arc::new(store));

        assert!(!gate.authorize(Uuid::new_v4(), team, mindmap.id).await);
    }

    #[tokio::test]
    async fn test_mindmap_of_other_team_denied() {
        let (team, other_team, user) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let foreign = Mindmap::new(other_team, "Theirs");
        let store = MockGraphStore::new()
            .with_member(team, user)
            .await
            .with_mindmap(foreign.clone())
            .await;
        let gate = AccessGate::new(Arc::new(store));

        assert!(!gate.authorize(user, team, foreign.id).await);
        assert!(!gate.authorize(user, team, Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let (team, user) = (Uuid::new_v4(), Uuid::new_v4());
        let mindmap = Mindmap::new(team, "Map");
        let store = MockGraphStore::new()
            .with_member(team, user)
            .await
            .with_mindmap(mindmap.clone())
            .await;
        store.fail_all.store(true, Ordering::SeqCst);
        let gate = AccessGate::new(Arc::new(store));

        assert!(!gate.authorize(user, team, mindmap.id).await);
        assert!(!gate.authorize_team(user, team).await);
    }
}
