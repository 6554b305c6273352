//! Signaling with the pixel streaming signaling server over WebSocket

pub mod client;
pub mod protocol;

pub use client::{connect, SignalSink, SignalingReceiver, SignalingSender, SignalingSource};
pub use protocol::{message_types, IceCandidateMessage, InboundMessage};
