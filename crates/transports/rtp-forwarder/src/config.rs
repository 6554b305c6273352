//! Configuration types for the RTP forwarder

use crate::media::MediaKind;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use std::time::Duration;

/// Main configuration for the forwarder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Host of the signaling server the publisher is attached to
    pub signaling_address: String,

    /// Port of the signaling server (default: 80)
    pub signaling_port: u16,

    /// Host that receives the forwarded RTP streams
    pub forwarding_address: String,

    /// Audio relay destination
    pub audio: RelayTargetConfig,

    /// Video relay destination
    pub video: RelayTargetConfig,

    /// Periodic RTCP feedback towards the publisher
    pub feedback: FeedbackConfig,

    /// STUN server URLs (empty: host candidates only)
    pub stun_servers: Vec<String>,
}

/// Destination of one media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTargetConfig {
    /// UDP port on `forwarding_address`
    pub port: u16,

    /// Payload type written into every forwarded RTP header
    pub payload_type: u8,
}

/// RTCP feedback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Default emission interval in milliseconds (default: 2000)
    pub interval_ms: u64,

    /// PLI interval override in milliseconds
    pub pli_interval_ms: Option<u64>,

    /// REMB interval override in milliseconds
    pub remb_interval_ms: Option<u64>,

    /// Send picture loss indications (keyframe requests)
    pub send_pli: bool,

    /// Send receiver estimated maximum bitrate messages
    pub send_remb: bool,

    /// Bitrate advertised in REMB messages, bits per second
    pub remb_bitrate: u64,
}

impl FeedbackConfig {
    /// Interval between keyframe requests
    pub fn pli_interval(&self) -> Duration {
        Duration::from_millis(self.pli_interval_ms.unwrap_or(self.interval_ms))
    }

    /// Interval between bandwidth estimates
    pub fn remb_interval(&self) -> Duration {
        Duration::from_millis(self.remb_interval_ms.unwrap_or(self.interval_ms))
    }
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            signaling_address: "localhost".to_string(),
            signaling_port: 80,
            forwarding_address: "127.0.0.1".to_string(),
            // 111 is Opus
            audio: RelayTargetConfig {
                port: 4000,
                payload_type: 111,
            },
            // 125 is H.264 constrained baseline, packetization mode 1, in Chrome
            video: RelayTargetConfig {
                port: 4002,
                payload_type: 125,
            },
            feedback: FeedbackConfig::default(),
            stun_servers: Vec::new(),
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            pli_interval_ms: None,
            remb_interval_ms: None,
            send_pli: true,
            send_remb: true,
            remb_bitrate: 400_000_000,
        }
    }
}

impl ForwarderConfig {
    /// WebSocket URL of the signaling server
    ///
    /// IPv6 literals are bracketed so the port stays unambiguous.
    pub fn signaling_url(&self) -> String {
        let host = self.signaling_address.trim();
        if host.parse::<Ipv6Addr>().is_ok() {
            format!("ws://[{}]:{}/", host, self.signaling_port)
        } else {
            format!("ws://{}:{}/", host, self.signaling_port)
        }
    }

    /// Relay destination for a media kind
    pub fn target(&self, kind: MediaKind) -> RelayTargetConfig {
        match kind {
            MediaKind::Audio => self.audio,
            MediaKind::Video => self.video,
        }
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - an address is empty
    /// - a port is zero, or audio and video share a port
    /// - a payload type does not fit the 7-bit RTP field
    /// - a feedback interval is zero
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.signaling_address.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "signaling_address must not be empty".to_string(),
            ));
        }

        if self.signaling_port == 0 {
            return Err(Error::InvalidConfig(
                "signaling_port must be non-zero".to_string(),
            ));
        }

        if self.forwarding_address.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "forwarding_address must not be empty".to_string(),
            ));
        }

        for kind in MediaKind::ALL {
            let target = self.target(kind);
            if target.port == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{} forwarding port must be non-zero",
                    kind
                )));
            }
            if target.payload_type > 127 {
                return Err(Error::InvalidConfig(format!(
                    "{} payload type must be in range 0-127, got {}",
                    kind, target.payload_type
                )));
            }
        }

        if self.audio.port == self.video.port {
            return Err(Error::InvalidConfig(format!(
                "audio and video cannot share forwarding port {}",
                self.audio.port
            )));
        }

        let feedback = &self.feedback;
        if feedback.interval_ms == 0
            || feedback.pli_interval_ms == Some(0)
            || feedback.remb_interval_ms == Some(0)
        {
            return Err(Error::InvalidConfig(
                "RTCP feedback intervals must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
