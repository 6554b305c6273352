//! Media relay: RTP forwarding and RTCP feedback per media kind
//!
//! Each remote track gets its own relay loop and feedback ticker. The two
//! media kinds never share state, so a failure in one leaves the other
//! running.

pub mod feedback;
pub mod relay;

pub use feedback::{FeedbackEmitter, FeedbackWriter};
pub use relay::{
    rewrite_payload_type, DatagramSink, ForwardOutcome, FrameSource, RelayStats, RelayTarget,
    RelayTargets, MAX_FRAME_SIZE,
};

use std::fmt;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

/// Media kind of a track and of its relay destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio track (Opus from the publisher)
    Audio,
    /// Video track (H.264 from the publisher)
    Video,
}

impl MediaKind {
    /// Both kinds, in receive-slot order
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

    /// Lowercase name used in logs and configuration errors
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Map the engine's codec type; `None` for unspecified kinds
    pub fn from_codec_type(codec_type: RTPCodecType) -> Option<Self> {
        match codec_type {
            RTPCodecType::Audio => Some(MediaKind::Audio),
            RTPCodecType::Video => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Engine codec type for transceiver setup
    pub fn codec_type(&self) -> RTPCodecType {
        match self {
            MediaKind::Audio => RTPCodecType::Audio,
            MediaKind::Video => RTPCodecType::Video,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_type_mapping() {
        for kind in MediaKind::ALL {
            assert_eq!(MediaKind::from_codec_type(kind.codec_type()), Some(kind));
        }
        assert_eq!(MediaKind::from_codec_type(RTPCodecType::Unspecified), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(MediaKind::Audio.to_string(), "audio");
        assert_eq!(MediaKind::Video.to_string(), "video");
    }
}
