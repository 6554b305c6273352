//! Peer session: negotiation state, candidate buffering and the engine seam

pub mod candidates;
pub mod coordinator;
pub mod engine;
pub mod session;

pub use candidates::{Admission, CandidateBuffer};
pub use coordinator::{CandidateRoute, MessageOutcome, SignalingCoordinator};
pub use engine::{create_peer_connection, NegotiationEngine};
pub use session::{ConnectionState, NegotiationPhase, NegotiationRole, Session};
