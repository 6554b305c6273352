//! Signaling message types exchanged with the pixel streaming signaling server
//!
//! Every message is one JSON object per text frame with a `type`
//! discriminant. Decoding happens in two steps so a message with a known
//! type but a broken payload can be reported with its type.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Discriminant values understood on the signaling channel
pub mod message_types {
    pub const PLAYER_COUNT: &str = "playerCount";
    pub const CONFIG: &str = "config";
    pub const ANSWER: &str = "answer";
    pub const OFFER: &str = "offer";
    pub const ICE_CANDIDATE: &str = "iceCandidate";
}

/// A decoded inbound signaling message
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Number of players attached to the streamer
    PlayerCount(i64),

    /// Streamer configuration (contents are not used)
    Config(Value),

    /// Session description of type "answer"
    Answer(RTCSessionDescription),

    /// Session description of type "offer"
    Offer(RTCSessionDescription),

    /// Remote connectivity candidate
    IceCandidate(RTCIceCandidateInit),

    /// Any other discriminant
    Unknown(String),
}

impl InboundMessage {
    /// Read only the `type` discriminant of a raw message
    pub fn message_type(text: &str) -> Result<String> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            Error::SerializationError(format!("Invalid signaling message JSON: {}", e))
        })?;
        Self::type_of(&value).map(str::to_string)
    }

    fn type_of(value: &Value) -> Result<&str> {
        value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidData("Signaling message has no string \"type\"".to_string()))
    }

    /// Decode a raw text message
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            Error::SerializationError(format!("Invalid signaling message JSON: {}", e))
        })?;

        let message_type = Self::type_of(&value)?;

        match message_type {
            message_types::PLAYER_COUNT => {
                let count = value.get("count").and_then(Value::as_i64).ok_or_else(|| {
                    Error::InvalidData("playerCount message without integer \"count\"".to_string())
                })?;
                Ok(InboundMessage::PlayerCount(count))
            }
            message_types::CONFIG => Ok(InboundMessage::Config(value)),
            message_types::ANSWER => Ok(InboundMessage::Answer(Self::description(&value)?)),
            message_types::OFFER => Ok(InboundMessage::Offer(Self::description(&value)?)),
            message_types::ICE_CANDIDATE => {
                let candidate = value.get("candidate").cloned().ok_or_else(|| {
                    Error::IceCandidateError("iceCandidate message without \"candidate\"".to_string())
                })?;
                let candidate: RTCIceCandidateInit = serde_json::from_value(candidate)
                    .map_err(|e| {
                        Error::IceCandidateError(format!("Failed to parse ICE candidate: {}", e))
                    })?;
                Ok(InboundMessage::IceCandidate(candidate))
            }
            other => Ok(InboundMessage::Unknown(other.to_string())),
        }
    }

    /// The whole message is the session description (`type` + `sdp`)
    fn description(value: &Value) -> Result<RTCSessionDescription> {
        RTCSessionDescription::deserialize(value)
            .map_err(|e| Error::SdpError(format!("Failed to parse session description: {}", e)))
    }

    /// Discriminant of this message
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::PlayerCount(_) => message_types::PLAYER_COUNT,
            InboundMessage::Config(_) => message_types::CONFIG,
            InboundMessage::Answer(_) => message_types::ANSWER,
            InboundMessage::Offer(_) => message_types::OFFER,
            InboundMessage::IceCandidate(_) => message_types::ICE_CANDIDATE,
            InboundMessage::Unknown(other) => other,
        }
    }
}

/// Outbound local candidate message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceCandidateMessage {
    /// Always "iceCandidate"
    #[serde(rename = "type")]
    pub message_type: String,

    /// Candidate in its JSON init form
    pub candidate: RTCIceCandidateInit,
}

impl IceCandidateMessage {
    /// Wrap a local candidate
    pub fn new(candidate: RTCIceCandidateInit) -> Self {
        Self {
            message_type: message_types::ICE_CANDIDATE.to_string(),
            candidate,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            Error::SerializationError(format!("Failed to serialize ICE candidate: {}", e))
        })
    }
}

/// Serialize a local answer as `{"type":"answer","sdp":...}`
pub fn answer_to_json(answer: &RTCSessionDescription) -> Result<String> {
    serde_json::to_string(answer)
        .map_err(|e| Error::SerializationError(format!("Failed to serialize answer: {}", e)))
}
