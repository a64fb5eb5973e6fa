//! Realtime room fan-out for mindmap collaboration
//!
//! This module provides:
//! - `protocol` — inbound/outbound message types and the `RoomEvent` envelope
//! - `RoomRegistry` — in-process rooms keyed by mindmap id
//! - `NatsRoomRelay` — mirrors room events across server instances

pub mod nats;
pub mod protocol;
pub mod registry;

pub use nats::{connect_nats, NatsRoomRelay};
pub use protocol::{ClientMessage, DecodeError, MemberInfo, RoomEvent, ServerMessage, SessionId};
pub use registry::{RoomBroker, RoomMember, RoomRegistry};
