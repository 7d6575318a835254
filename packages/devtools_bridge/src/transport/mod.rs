//! Message channel between the bridge and the remote devtools client.
//!
//! Outbound traffic is fire-and-forget: a session posts envelopes and never
//! waits for delivery. Inbound envelopes arrive on an mpsc receiver that the
//! host (or [`crate::actor::BridgeActor`]) drains.

pub mod channel;
pub mod framing;

pub use channel::{ChannelTransport, InboundReceiver, RemoteEnd, channel};
pub use framing::{FrameError, connect_io, read_frame, write_frame};

use crate::protocol::OutboundEnvelope;

pub trait Transport: Send {
    fn post(&self, envelope: OutboundEnvelope);
}
