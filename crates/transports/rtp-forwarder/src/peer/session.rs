//! The single peer session brokered by this process

use parking_lot::RwLock;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Negotiation role of this side. The publisher always drives the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    /// Accepts the remote description and answers it
    Answerer,
}

/// Negotiation progress as seen by the signaling coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    /// Nothing applied yet
    Idle,
    /// Remote offer received, local answer not yet applied
    RemoteDescriptionPending,
    /// Local and remote descriptions applied
    Negotiated,
}

/// Connection state reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, connection not yet started
    New,
    /// Connection negotiation in progress
    Connecting,
    /// Connection established successfully
    Connected,
    /// Lost connectivity; may recover on its own
    Disconnected,
    /// Connection failed
    Failed,
    /// Connection closed
    Closed,
}

impl ConnectionState {
    /// Map a peer connection state; `None` for unspecified
    pub fn from_peer_state(state: RTCPeerConnectionState) -> Option<Self> {
        match state {
            RTCPeerConnectionState::New => Some(ConnectionState::New),
            RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
            RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
            RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
            RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
            RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
            _ => None,
        }
    }

    /// Map an ICE connection state; `None` for states with no counterpart
    pub fn from_ice_state(state: RTCIceConnectionState) -> Option<Self> {
        match state {
            RTCIceConnectionState::New => Some(ConnectionState::New),
            RTCIceConnectionState::Checking => Some(ConnectionState::Connecting),
            RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
                Some(ConnectionState::Connected)
            }
            RTCIceConnectionState::Disconnected => Some(ConnectionState::Disconnected),
            RTCIceConnectionState::Failed => Some(ConnectionState::Failed),
            RTCIceConnectionState::Closed => Some(ConnectionState::Closed),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    phase: NegotiationPhase,
    local_description: Option<RTCSessionDescription>,
    remote_description: Option<RTCSessionDescription>,
    connection_state: ConnectionState,
}

/// Session state shared between the signaling loop and engine callbacks
///
/// Reads always see a whole description or its absence; no lock is held
/// across an `.await`.
#[derive(Debug)]
pub struct Session {
    id: String,
    inner: RwLock<SessionInner>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an idle session
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            inner: RwLock::new(SessionInner {
                phase: NegotiationPhase::Idle,
                local_description: None,
                remote_description: None,
                connection_state: ConnectionState::New,
            }),
        }
    }

    /// Session identifier used in logs
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Negotiation role
    pub fn role(&self) -> NegotiationRole {
        NegotiationRole::Answerer
    }

    /// Current negotiation phase
    pub fn phase(&self) -> NegotiationPhase {
        self.inner.read().phase
    }

    pub(crate) fn set_phase(&self, phase: NegotiationPhase) {
        self.inner.write().phase = phase;
    }

    /// Applied local description
    pub fn local_description(&self) -> Option<RTCSessionDescription> {
        self.inner.read().local_description.clone()
    }

    /// Applied remote description
    pub fn remote_description(&self) -> Option<RTCSessionDescription> {
        self.inner.read().remote_description.clone()
    }

    pub(crate) fn set_local_description(&self, description: RTCSessionDescription) {
        self.inner.write().local_description = Some(description);
    }

    /// A new remote description replaces the previous one
    pub(crate) fn set_remote_description(&self, description: RTCSessionDescription) {
        self.inner.write().remote_description = Some(description);
    }

    /// Last connection state reported by the engine
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.read().connection_state
    }

    /// Record a state change; returns the previous state
    pub fn set_connection_state(&self, state: ConnectionState) -> ConnectionState {
        std::mem::replace(&mut self.inner.write().connection_state, state)
    }
}
