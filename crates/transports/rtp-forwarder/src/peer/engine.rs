//! Negotiation engine seam and the receive-only peer connection behind it

use crate::config::ForwarderConfig;
use crate::media::MediaKind;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// The negotiation operations the signaling coordinator drives
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    /// Apply a description as the local side
    async fn set_local_description(&self, description: RTCSessionDescription) -> Result<()>;

    /// Apply a description as the remote side
    async fn set_remote_description(&self, description: RTCSessionDescription) -> Result<()>;

    /// Produce an answer to the applied remote offer
    async fn create_answer(&self) -> Result<RTCSessionDescription>;

    /// Add a remote connectivity candidate
    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()>;
}

#[async_trait]
impl NegotiationEngine for RTCPeerConnection {
    async fn set_local_description(&self, description: RTCSessionDescription) -> Result<()> {
        RTCPeerConnection::set_local_description(self, description)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, description: RTCSessionDescription) -> Result<()> {
        RTCPeerConnection::set_remote_description(self, description)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription> {
        RTCPeerConnection::create_answer(self, None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        RTCPeerConnection::add_ice_candidate(self, candidate)
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add ICE candidate: {}", e)))
    }
}

/// Build the peer connection with one receive-only slot per media kind
///
/// Any failure here leaves no session to run and is session-fatal.
pub async fn create_peer_connection(config: &ForwarderConfig) -> Result<Arc<RTCPeerConnection>> {
    let mut media_engine = MediaEngine::default();

    // Opus for audio, VP8/VP9/H.264 for video
    media_engine
        .register_default_codecs()
        .map_err(|e| Error::PeerConnectionError(format!("Failed to register codecs: {}", e)))?;

    let interceptor_registry =
        register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
            Error::PeerConnectionError(format!("Failed to register interceptors: {}", e))
        })?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(interceptor_registry)
        .build();

    let ice_servers: Vec<RTCIceServer> = config
        .stun_servers
        .iter()
        .map(|url| RTCIceServer {
            urls: vec![url.clone()],
            ..Default::default()
        })
        .collect();

    let rtc_config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
        Error::PeerConnectionError(format!("Failed to create peer connection: {}", e))
    })?);

    for kind in MediaKind::ALL {
        peer_connection
            .add_transceiver_from_kind(
                kind.codec_type(),
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| {
                Error::PeerConnectionError(format!(
                    "Failed to add {} transceiver: {}",
                    kind, e
                ))
            })?;
        debug!(kind = %kind, "Added recvonly transceiver");
    }

    info!(
        stun_servers = config.stun_servers.len(),
        "Peer connection created"
    );

    Ok(peer_connection)
}
