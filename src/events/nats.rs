//! NATS relay for running several server instances behind one load balancer
//!
//! Room events are published locally first, then forwarded to
//! `{prefix}.mindmap.{mindmap_id}` so sessions connected to other instances
//! receive them too. A bridge task subscribes to `{prefix}.mindmap.*` and
//! re-injects remote events into the local registry.
//!
//! Fire-and-forget publishing: errors are logged but never block the caller.

use super::protocol::{MemberInfo, RoomEvent, ServerMessage, SessionId};
use super::registry::{RoomBroker, RoomMember, RoomRegistry};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Wire envelope for a room event crossing instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// Instance that published the event; used to skip our own echoes
    pub instance_id: Uuid,
    pub mindmap_id: Uuid,
    #[serde(default)]
    pub origin: Option<SessionId>,
    pub message: ServerMessage,
}

/// Build the subject for one mindmap room (e.g. "events.mindmap.{id}")
pub fn room_subject(prefix: &str, mindmap_id: Uuid) -> String {
    format!("{}.mindmap.{}", prefix, mindmap_id)
}

/// Wildcard subject covering every room
pub fn all_rooms_subject(prefix: &str) -> String {
    format!("{}.mindmap.*", prefix)
}

/// Decode a payload received from NATS, discarding events this instance sent.
pub fn decode_remote(payload: &[u8], own_instance: Uuid) -> Option<RelayEnvelope> {
    match serde_json::from_slice::<RelayEnvelope>(payload) {
        Ok(envelope) if envelope.instance_id == own_instance => None,
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!("NATS relay: failed to deserialize room event: {}", e);
            None
        }
    }
}

/// Deliver a remote event to the local room, keeping its originating session
/// so that only that session skips it. Returns the number of local recipients.
pub fn inject_remote(local: &RoomRegistry, envelope: RelayEnvelope) -> usize {
    debug!(
        mindmap_id = %envelope.mindmap_id,
        event_type = envelope.message.event_type(),
        "NATS room bridge: injecting remote event"
    );
    local.publish(
        envelope.mindmap_id,
        RoomEvent::from_session(envelope.origin, envelope.message),
    )
}

/// Room broker that fans out locally and mirrors every event through NATS.
///
/// Membership stays per instance: `members` only reports sessions connected
/// here.
#[derive(Clone)]
pub struct NatsRoomRelay {
    local: Arc<RoomRegistry>,
    client: async_nats::Client,
    subject_prefix: String,
    instance_id: Uuid,
}

impl NatsRoomRelay {
    pub fn new(
        local: Arc<RoomRegistry>,
        client: async_nats::Client,
        subject_prefix: impl Into<String>,
    ) -> Self {
        Self {
            local,
            client,
            subject_prefix: subject_prefix.into(),
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Start the NATS→local bridge.
    ///
    /// Remote events are injected with `RoomRegistry::publish` directly, never
    /// through `self.publish`, so they are not forwarded back to NATS.
    pub fn start_bridge(&self) {
        let client = self.client.clone();
        let local = self.local.clone();
        let subject = all_rooms_subject(&self.subject_prefix);
        let instance_id = self.instance_id;

        tokio::spawn(async move {
            let mut subscriber = match client.subscribe(subject.clone()).await {
                Ok(sub) => sub,
                Err(e) => {
                    warn!(subject = %subject, "Failed to start NATS room bridge: {}", e);
                    return;
                }
            };
            info!(subject = %subject, "NATS room bridge started");

            while let Some(msg) = subscriber.next().await {
                if let Some(envelope) = decode_remote(&msg.payload, instance_id) {
                    inject_remote(&local, envelope);
                }
            }

            warn!("NATS room bridge: subscriber closed");
        });
    }

    fn forward(&self, mindmap_id: Uuid, event: &RoomEvent) {
        let envelope = RelayEnvelope {
            instance_id: self.instance_id,
            mindmap_id,
            origin: event.origin,
            message: (*event.message).clone(),
        };
        let client = self.client.clone();
        let subject = room_subject(&self.subject_prefix, mindmap_id);

        tokio::spawn(async move {
            match serde_json::to_vec(&envelope) {
                Ok(payload) => {
                    if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                        warn!(
                            subject = %subject,
                            event_type = envelope.message.event_type(),
                            "Failed to publish room event to NATS: {}",
                            e
                        );
                    } else {
                        debug!(
                            subject = %subject,
                            event_type = envelope.message.event_type(),
                            "Room event published to NATS"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        event_type = envelope.message.event_type(),
                        "Failed to serialize room event for NATS: {}",
                        e
                    );
                }
            }
        });
    }
}

impl RoomBroker for NatsRoomRelay {
    fn join(&self, mindmap_id: Uuid, member: RoomMember) {
        self.local.join(mindmap_id, member);
    }

    fn leave(&self, mindmap_id: Uuid, session_id: SessionId) -> bool {
        self.local.leave(mindmap_id, session_id)
    }

    fn members(&self, mindmap_id: Uuid) -> Vec<MemberInfo> {
        self.local.members(mindmap_id)
    }

    fn publish(&self, mindmap_id: Uuid, event: RoomEvent) -> usize {
        self.forward(mindmap_id, &event);
        self.local.publish(mindmap_id, event)
    }

    fn room_count(&self) -> usize {
        self.local.room_count()
    }
}

/// Connect to a NATS server.
pub async fn connect_nats(url: &str) -> anyhow::Result<async_nats::Client> {
    let client = async_nats::connect(url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to NATS at {}: {}", url, e))?;
    info!("Connected to NATS at {}", url);
    Ok(client)
}
