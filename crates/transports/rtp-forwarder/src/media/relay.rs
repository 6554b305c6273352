//! RTP relay from a remote track to a fixed UDP destination
//!
//! Frames are forwarded byte-for-byte except for the payload type, which
//! is rewritten to what the receiving application expects (the publisher's
//! browser-negotiated value usually differs from the receiver's SDP file).

use crate::config::{ForwarderConfig, RelayTargetConfig};
use crate::media::MediaKind;
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};
use webrtc::rtp::header::Header;
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::{Marshal, Unmarshal};

/// Size of the reusable frame buffer (one Ethernet MTU)
pub const MAX_FRAME_SIZE: usize = 1500;

/// A negotiated media source that yields encoded RTP frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Read the next frame into `buf` and return its length
    async fn read_frame(&self, buf: &mut [u8]) -> Result<usize>;
}

#[async_trait]
impl FrameSource for TrackRemote {
    async fn read_frame(&self, buf: &mut [u8]) -> Result<usize> {
        let (packet, _attributes) = self
            .read(buf)
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to read RTP packet: {}", e)))?;

        packet
            .marshal_to(buf)
            .map_err(|e| Error::RtpError(format!("Failed to encode RTP packet: {}", e)))
    }
}

/// Connectionless destination for forwarded frames
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// Write one datagram to the destination
    async fn send_datagram(&self, datagram: &[u8]) -> std::io::Result<usize>;
}

#[async_trait]
impl DatagramSink for UdpSocket {
    async fn send_datagram(&self, datagram: &[u8]) -> std::io::Result<usize> {
        self.send(datagram).await
    }
}

/// Rewrite the payload type of an RTP frame in place
///
/// The header is decoded to make sure the frame is RTP and the fixed
/// header is complete; only the 7-bit payload type changes, the marker
/// bit and every other byte are preserved.
pub fn rewrite_payload_type(frame: &mut [u8], payload_type: u8) -> Result<()> {
    if payload_type > 0x7f {
        return Err(Error::InvalidData(format!(
            "Payload type {} does not fit in 7 bits",
            payload_type
        )));
    }

    let mut reader = &frame[..];
    let header = Header::unmarshal(&mut reader)
        .map_err(|e| Error::RtpError(format!("Failed to decode RTP header: {}", e)))?;

    if header.version != 2 {
        return Err(Error::RtpError(format!(
            "Unsupported RTP version {}",
            header.version
        )));
    }

    // Fixed header layout: V(2) P(1) X(1) CC(4) | M(1) PT(7)
    frame[1] = (frame[1] & 0x80) | payload_type;

    Ok(())
}

/// Snapshot of a relay target's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Frames written to the destination
    pub forwarded: u64,
    /// Frames dropped because nothing was listening at the destination
    pub unreachable: u64,
}

/// Result of forwarding a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Frame written to the destination
    Forwarded,
    /// Destination refused the datagram; the next frame is tried as usual
    DestinationUnreachable,
}

/// Relay destination for one media kind
pub struct RelayTarget {
    kind: MediaKind,
    destination: SocketAddr,
    payload_type: u8,
    sink: Arc<dyn DatagramSink>,
    forwarded: AtomicU64,
    unreachable: AtomicU64,
}

impl RelayTarget {
    /// Create a target around an existing datagram sink
    pub fn new(
        kind: MediaKind,
        destination: SocketAddr,
        payload_type: u8,
        sink: Arc<dyn DatagramSink>,
    ) -> Self {
        Self {
            kind,
            destination,
            payload_type,
            sink,
            forwarded: AtomicU64::new(0),
            unreachable: AtomicU64::new(0),
        }
    }

    /// Resolve `address` and open a connected UDP socket to it
    pub async fn connect(
        kind: MediaKind,
        address: &str,
        config: RelayTargetConfig,
    ) -> Result<Self> {
        let destination = tokio::net::lookup_host((address, config.port))
            .await?
            .next()
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "Forwarding address {}:{} did not resolve",
                    address, config.port
                ))
            })?;

        let bind_addr: SocketAddr = if destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(destination).await?;

        info!(
            kind = %kind,
            destination = %destination,
            payload_type = config.payload_type,
            "Relay target ready"
        );

        Ok(Self::new(
            kind,
            destination,
            config.payload_type,
            Arc::new(socket),
        ))
    }

    /// Media kind served by this target
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Destination address
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Payload type written into forwarded frames
    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// Current counters
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            unreachable: self.unreachable.load(Ordering::Relaxed),
        }
    }

    /// Rewrite one frame and write it to the destination
    ///
    /// A refused write is reported as `DestinationUnreachable` rather than
    /// an error: receivers such as ffplay are usually started after the
    /// session is already up.
    pub async fn forward(&self, frame: &mut [u8]) -> Result<ForwardOutcome> {
        rewrite_payload_type(frame, self.payload_type)?;

        match self.sink.send_datagram(frame).await {
            Ok(_) => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                Ok(ForwardOutcome::Forwarded)
            }
            Err(e) => {
                let err = Error::from(e);
                if err.is_destination_unreachable() {
                    self.unreachable.fetch_add(1, Ordering::Relaxed);
                    trace!(kind = %self.kind, "Relay destination unreachable, dropping frame");
                    Ok(ForwardOutcome::DestinationUnreachable)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Pump frames from `source` to the destination
    ///
    /// Runs for the lifetime of the source and only returns on failure:
    /// a read error, a malformed frame or a write error other than an
    /// unreachable destination.
    pub async fn relay_frames(&self, source: &dyn FrameSource) -> Result<()> {
        let mut buf = vec![0u8; MAX_FRAME_SIZE];

        debug!(kind = %self.kind, destination = %self.destination, "Relay loop started");

        loop {
            let n = source.read_frame(&mut buf).await?;
            self.forward(&mut buf[..n]).await?;
        }
    }
}

/// The audio and video relay targets of a session
#[derive(Clone)]
pub struct RelayTargets {
    audio: Arc<RelayTarget>,
    video: Arc<RelayTarget>,
}

impl RelayTargets {
    /// Group two existing targets
    pub fn new(audio: Arc<RelayTarget>, video: Arc<RelayTarget>) -> Self {
        Self { audio, video }
    }

    /// Open one socket per media kind as configured
    pub async fn connect(config: &ForwarderConfig) -> Result<Self> {
        let audio =
            RelayTarget::connect(MediaKind::Audio, &config.forwarding_address, config.audio)
                .await?;
        let video =
            RelayTarget::connect(MediaKind::Video, &config.forwarding_address, config.video)
                .await?;

        Ok(Self::new(Arc::new(audio), Arc::new(video)))
    }

    /// Target for a media kind
    pub fn get(&self, kind: MediaKind) -> Arc<RelayTarget> {
        match kind {
            MediaKind::Audio => Arc::clone(&self.audio),
            MediaKind::Video => Arc::clone(&self.video),
        }
    }
}
