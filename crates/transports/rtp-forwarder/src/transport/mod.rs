//! Session driver
//!
//! Owns the signaling channel, the peer connection and every relay task
//! for the lifetime of the one forwarding session.

pub mod driver;

pub use driver::{run_signaling_loop, spawn_media_relay, SessionDriver};
