//! Realtime session for one mindmap connection
//!
//! A session moves through `Connecting → Authorized → Active → Closed`.
//! It is generic over the transport halves so the same code runs on an axum
//! `WebSocket` and on in-memory channels in tests.

use super::handlers::ServerState;
use crate::auth::extractor::AuthUser;
use crate::auth::AccessGate;
use crate::events::{
    ClientMessage, DecodeError, MemberInfo, RoomBroker, RoomEvent, RoomMember, ServerMessage,
    SessionId,
};
use crate::mindmap::{Actor, MindmapError, MindmapManager};
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the bounded outbound queue
    pub outbound_capacity: usize,
    /// Transport ping period; `None` disables pings
    pub ping_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Connecting,
    Authorized,
    Active,
    Closed,
}

/// What happened over a session's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Whether the access gate admitted the session
    pub authorized: bool,
    /// Inbound frames decoded and dispatched
    pub handled: u64,
    /// Inbound frames logged and dropped
    pub dropped: u64,
    /// Last state the session reached
    pub state: SessionState,
}

/// Removes the session from its room when dropped, including on unwind,
/// and announces the departure to whoever is left.
struct RoomGuard {
    broker: Arc<dyn RoomBroker>,
    mindmap_id: Uuid,
    member: MemberInfo,
    /// Set once `user_joined` went out; only then is `user_left` owed
    announced: bool,
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        if self.broker.leave(self.mindmap_id, self.member.session_id) && self.announced {
            self.broker.publish(
                self.mindmap_id,
                RoomEvent::to_all(ServerMessage::UserLeft {
                    user_id: self.member.user_id,
                    username: self.member.username.clone(),
                }),
            );
        }
    }
}

/// Map a client coordinate onto the integer grid. Negative and non-finite
/// values are rejected before rounding.
fn to_coordinate(value: f64) -> Option<i64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as i64)
}

pub struct MindmapSession {
    id: SessionId,
    team_id: Uuid,
    mindmap_id: Uuid,
    user: AuthUser,
    gate: AccessGate,
    manager: Arc<MindmapManager>,
    broker: Arc<dyn RoomBroker>,
    config: SessionConfig,
    report: SessionReport,
}

impl MindmapSession {
    pub fn new(state: &ServerState, team_id: Uuid, mindmap_id: Uuid, user: AuthUser) -> Self {
        Self {
            id: SessionId::new(),
            team_id,
            mindmap_id,
            user,
            gate: state.gate.clone(),
            manager: state.manager.clone(),
            broker: state.broker.clone(),
            config: state.session_config.clone(),
            report: SessionReport::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            session_id = %self.id,
            from = ?self.report.state,
            to = ?next,
            "Session state change"
        );
        self.report.state = next;
    }

    fn actor(&self) -> Actor {
        Actor::session(self.user.user_id, self.user.username.clone(), self.id)
    }

    /// Drive the session until the transport closes.
    pub async fn run<S, R, E>(mut self, mut sink: S, mut stream: R) -> SessionReport
    where
        S: Sink<Message> + Unpin,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        // Connecting → Authorized
        if !self
            .gate
            .authorize(self.user.user_id, self.team_id, self.mindmap_id)
            .await
        {
            info!(
                user_id = %self.user.user_id,
                team_id = %self.team_id,
                mindmap_id = %self.mindmap_id,
                "Realtime connection rejected"
            );
            self.transition(SessionState::Closed);
            return self.report;
        }
        self.report.authorized = true;
        self.transition(SessionState::Authorized);

        // Authorized → Active
        let (tx, mut rx) = mpsc::channel(self.config.outbound_capacity.max(1));
        let member = MemberInfo {
            session_id: self.id,
            user_id: self.user.user_id,
            username: self.user.username.clone(),
        };
        self.broker
            .join(self.mindmap_id, RoomMember::new(member.clone(), tx));
        let mut guard = RoomGuard {
            broker: self.broker.clone(),
            mindmap_id: self.mindmap_id,
            member,
            announced: false,
        };

        let graph = match self.manager.get_mindmap_with_graph(self.mindmap_id).await {
            Ok(graph) => graph,
            Err(e) => {
                warn!(mindmap_id = %self.mindmap_id, "Failed to load mindmap snapshot: {}", e);
                self.transition(SessionState::Closed);
                return self.report;
            }
        };
        let snapshot = ServerMessage::MindmapState {
            mindmap: graph.mindmap,
            nodes: graph.nodes,
            connections: graph.connections,
            members: self.broker.members(self.mindmap_id),
        };
        if !send_json(&mut sink, &snapshot).await {
            self.transition(SessionState::Closed);
            return self.report;
        }

        self.broker.publish(
            self.mindmap_id,
            RoomEvent::to_all(ServerMessage::UserJoined {
                user_id: self.user.user_id,
                username: self.user.username.clone(),
            }),
        );
        guard.announced = true;
        self.transition(SessionState::Active);
        info!(
            session_id = %self.id,
            user_id = %self.user.user_id,
            mindmap_id = %self.mindmap_id,
            "Realtime session active"
        );

        let mut ping: Option<Interval> = self.config.ping_interval.map(|period| {
            let mut ticker = interval(period);
            ticker.reset();
            ticker
        });

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        debug!(session_id = %self.id, "Outbound queue closed");
                        break;
                    };
                    if event.originated_by(self.id) {
                        continue;
                    }
                    if !send_json(&mut sink, event.message.as_ref()).await {
                        debug!(session_id = %self.id, "Send failed, client disconnected");
                        break;
                    }
                }

                _ = async {
                    match ping.as_mut() {
                        Some(ticker) => ticker.tick().await,
                        None => std::future::pending().await,
                    }
                } => {
                    if sink.send(Message::Ping(vec![].into())).await.is_err() {
                        debug!(session_id = %self.id, "Ping failed, client disconnected");
                        break;
                    }
                }

                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()).await,
                        Some(Ok(Message::Binary(_))) => {
                            self.report.dropped += 1;
                            debug!(session_id = %self.id, "Ignoring binary frame");
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(session_id = %self.id, "Client disconnected");
                            break;
                        }
                        Some(Err(e)) => {
                            debug!(session_id = %self.id, "WebSocket error: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        // Active → Closed; the guard leaves the room and announces it
        drop(guard);
        self.transition(SessionState::Closed);
        info!(
            session_id = %self.id,
            mindmap_id = %self.mindmap_id,
            handled = self.report.handled,
            dropped = self.report.dropped,
            "Realtime session closed"
        );
        self.report
    }

    /// Decode and act on one inbound text frame. Never ends the session.
    async fn dispatch(&mut self, text: &str) {
        let message = match ClientMessage::decode(text) {
            Ok(message) => message,
            Err(DecodeError::UnknownType(tag)) => {
                self.report.dropped += 1;
                warn!(session_id = %self.id, message_type = %tag, "Unrecognized message type, dropping");
                return;
            }
            Err(e) => {
                self.report.dropped += 1;
                warn!(session_id = %self.id, "Undecodable message, dropping: {}", e);
                return;
            }
        };
        self.report.handled += 1;

        match message {
            ClientMessage::NodeMove { node_id, x, y } => self.handle_node_move(node_id, x, y).await,
            ClientMessage::CursorMove { x, y } => {
                self.broker.publish(
                    self.mindmap_id,
                    RoomEvent::from_session(
                        Some(self.id),
                        ServerMessage::CursorMoved {
                            x,
                            y,
                            user_id: self.user.user_id,
                            username: self.user.username.clone(),
                        },
                    ),
                );
            }
            ClientMessage::NodeCreate {} | ClientMessage::NodeDelete {} => {
                debug!(session_id = %self.id, "Node create/delete is served by the HTTP API, ignoring");
            }
        }
    }

    async fn handle_node_move(&self, node_id: Uuid, x: f64, y: f64) {
        let (Some(x), Some(y)) = (to_coordinate(x), to_coordinate(y)) else {
            warn!(session_id = %self.id, node_id = %node_id, "Non-finite node position, dropping");
            return;
        };

        match self
            .manager
            .move_node(self.mindmap_id, node_id, x, y, &self.actor())
            .await
        {
            Ok(_) => {}
            Err(e @ (MindmapError::Validation(_) | MindmapError::NotFound { .. })) => {
                debug!(session_id = %self.id, node_id = %node_id, "node_move rejected: {}", e);
            }
            Err(e) => {
                warn!(session_id = %self.id, node_id = %node_id, "node_move failed: {}", e);
            }
        }
    }
}

/// Serialize and send one server message. Returns false if the transport is gone.
async fn send_json<S>(sink: &mut S, message: &ServerMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(message) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(event_type = message.event_type(), "Failed to serialize message: {}", e);
            true
        }
    }
}
