//! Error types for the RTP forwarder

/// Result type alias using the forwarder Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while brokering the session or relaying media
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling channel error (read failure, closed channel)
    #[error("Signaling error: {0}")]
    SignalingError(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// SDP negotiation error
    #[error("SDP negotiation error: {0}")]
    SdpError(String),

    /// ICE candidate error
    #[error("ICE candidate error: {0}")]
    IceCandidateError(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnectionError(String),

    /// RTP header decode/encode error
    #[error("RTP error: {0}")]
    RtpError(String),

    /// RTCP feedback error
    #[error("RTCP error: {0}")]
    RtcpError(String),

    /// Media source read error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Check if this error means nobody is listening at the relay destination.
    ///
    /// Connected UDP sockets report `ECONNREFUSED` on the write after an
    /// ICMP port-unreachable comes back. The relay skips the frame and
    /// keeps going when this is true.
    pub fn is_destination_unreachable(&self) -> bool {
        matches!(
            self,
            Error::IoError(e) if e.kind() == std::io::ErrorKind::ConnectionRefused
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }

    /// Check if this error aborts startup of the whole session
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_) | Error::WebSocketError(_) | Error::PeerConnectionError(_)
        )
    }
}
