//! WebRTC to plain RTP forwarder
//!
//! Attaches to a pixel streaming signaling server as a receive-only peer,
//! negotiates one WebRTC session with the publisher and relays the
//! incoming audio and video RTP streams to fixed UDP destinations, so
//! that tools such as ffplay or GStreamer can consume them with a static
//! SDP file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Publisher (pixel streaming)                             │
//! │  ↓ signaling (JSON over WebSocket)   ↓ SRTP/RTCP         │
//! │  SessionDriver                                           │
//! │  ├─ SignalingCoordinator (offer/answer, ICE candidates)  │
//! │  │   └─ CandidateBuffer (local candidates until ready)   │
//! │  ├─ RTCPeerConnection (recvonly audio + video)           │
//! │  └─ per track: RelayTarget loop + FeedbackEmitter        │
//! │     ↓ RTP with rewritten payload type                    │
//! │  UDP receivers (audio / video ports)                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use remotemedia_rtp_forwarder::ForwarderConfig;
//!
//! let mut config = ForwarderConfig::default();
//! config.video.payload_type = 96;
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.signaling_url(), "ws://localhost:80/");
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use remotemedia_rtp_forwarder::{ForwarderConfig, SessionDriver};
//!
//! # async fn example() -> remotemedia_rtp_forwarder::Result<()> {
//! let driver = SessionDriver::new(ForwarderConfig::default())?;
//! driver.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod signaling;
pub mod transport;

pub use config::{FeedbackConfig, ForwarderConfig, RelayTargetConfig};
pub use error::{Error, Result};
pub use media::{FeedbackEmitter, MediaKind, RelayTarget, RelayTargets};
pub use peer::{
    CandidateBuffer, CandidateRoute, ConnectionState, MessageOutcome, NegotiationPhase, Session,
    SignalingCoordinator,
};
pub use transport::SessionDriver;

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
