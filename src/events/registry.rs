//! Room registry: which realtime sessions are connected to which mindmap
//!
//! A room is keyed by mindmap id and holds the members' bounded outbound
//! queues. Rooms are created on first join and removed when the last member
//! leaves. Fan-out never blocks: a full queue loses that one event, a closed
//! queue removes the member.

use super::protocol::{MemberInfo, RoomEvent, SessionId};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Pub/sub capability handed to sessions and to the mutation service.
///
/// The in-process [`RoomRegistry`] is the base implementation; the NATS relay
/// wraps it for multi-instance deployments.
pub trait RoomBroker: Send + Sync {
    /// Admit a session into a mindmap's room, creating the room if needed
    fn join(&self, mindmap_id: Uuid, member: RoomMember);

    /// Remove a session from a room. Idempotent; returns whether it was present.
    fn leave(&self, mindmap_id: Uuid, session_id: SessionId) -> bool;

    /// Current members of a room
    fn members(&self, mindmap_id: Uuid) -> Vec<MemberInfo>;

    /// Fan an event out to every member. Returns how many queues accepted it.
    fn publish(&self, mindmap_id: Uuid, event: RoomEvent) -> usize;

    /// Number of live rooms
    fn room_count(&self) -> usize;
}

/// A session's seat in a room
#[derive(Debug)]
pub struct RoomMember {
    pub info: MemberInfo,
    sender: mpsc::Sender<RoomEvent>,
    dropped: AtomicU64,
}

impl RoomMember {
    pub fn new(info: MemberInfo, sender: mpsc::Sender<RoomEvent>) -> Self {
        Self {
            info,
            sender,
            dropped: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Default)]
struct Room {
    members: HashMap<SessionId, RoomMember>,
}

/// In-process room registry backed by `DashMap`
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<Uuid, Room>,
    session_rooms: DashMap<SessionId, Uuid>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members in one room
    pub fn member_count(&self, mindmap_id: Uuid) -> usize {
        self.rooms
            .get(&mindmap_id)
            .map(|room| room.members.len())
            .unwrap_or(0)
    }

    /// Remove a member and drop the room if it became empty.
    fn remove_member(&self, mindmap_id: Uuid, session_id: SessionId) -> bool {
        let removed = match self.rooms.get_mut(&mindmap_id) {
            Some(mut room) => room.members.remove(&session_id).is_some(),
            None => false,
        };
        // The emptiness check runs under the shard lock, so a concurrent join
        // either lands before it (room kept) or recreates the room after it.
        if self
            .rooms
            .remove_if(&mindmap_id, |_, room| room.members.is_empty())
            .is_some()
        {
            debug!(mindmap_id = %mindmap_id, "Room closed");
        }
        removed
    }
}

impl RoomBroker for RoomRegistry {
    fn join(&self, mindmap_id: Uuid, member: RoomMember) {
        let session_id = member.info.session_id;

        if let Some(previous) = self.session_rooms.insert(session_id, mindmap_id) {
            if previous != mindmap_id {
                self.remove_member(previous, session_id);
            }
        }

        let mut room = self.rooms.entry(mindmap_id).or_default();
        room.members.insert(session_id, member);
        debug!(
            mindmap_id = %mindmap_id,
            session_id = %session_id,
            members = room.members.len(),
            "Session joined room"
        );
    }

    fn leave(&self, mindmap_id: Uuid, session_id: SessionId) -> bool {
        let removed = self.remove_member(mindmap_id, session_id);
        self.session_rooms
            .remove_if(&session_id, |_, room| *room == mindmap_id);
        if removed {
            debug!(mindmap_id = %mindmap_id, session_id = %session_id, "Session left room");
        }
        removed
    }

    fn members(&self, mindmap_id: Uuid) -> Vec<MemberInfo> {
        self.rooms
            .get(&mindmap_id)
            .map(|room| room.members.values().map(|m| m.info.clone()).collect())
            .unwrap_or_default()
    }

    fn publish(&self, mindmap_id: Uuid, event: RoomEvent) -> usize {
        let mut delivered = 0;
        let mut stale = Vec::new();

        if let Some(room) = self.rooms.get(&mindmap_id) {
            for (session_id, member) in room.members.iter() {
                match member.sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        let dropped = member.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if dropped == 1 || dropped % 100 == 0 {
                            warn!(
                                mindmap_id = %mindmap_id,
                                session_id = %session_id,
                                dropped,
                                event_type = event.message.event_type(),
                                "Slow room member, dropping event"
                            );
                        }
                    }
                    Err(TrySendError::Closed(_)) => stale.push(*session_id),
                }
            }
        }

        for session_id in stale {
            debug!(session_id = %session_id, "Pruning closed room member");
            self.leave(mindmap_id, session_id);
        }

        delivered
    }

    fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
