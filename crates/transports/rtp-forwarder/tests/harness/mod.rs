//! In-memory collaborators for forwarder integration tests
//!
//! Each fake records what the forwarder did with it so tests can assert on
//! the observable traffic without a signaling server or a publisher.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use remotemedia_rtp_forwarder::media::{DatagramSink, FrameSource};
use remotemedia_rtp_forwarder::peer::NegotiationEngine;
use remotemedia_rtp_forwarder::signaling::{SignalSink, SignalingSource};
use remotemedia_rtp_forwarder::{Error, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;
use webrtc::util::Marshal;

/// Signal sink that keeps every outbound message
#[derive(Default)]
pub struct RecordingSignalSink {
    sent: Mutex<Vec<String>>,
}

impl RecordingSignalSink {
    pub fn messages(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).expect("outbound message is JSON"))
            .collect()
    }

    pub fn types(&self) -> Vec<String> {
        self.messages()
            .iter()
            .map(|m| m["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl SignalSink for RecordingSignalSink {
    fn send_text(&self, text: String) -> Result<()> {
        self.sent.lock().push(text);
        Ok(())
    }
}

/// Negotiation engine that succeeds unless told otherwise
#[derive(Default)]
pub struct ScriptedEngine {
    pub calls: Mutex<Vec<String>>,
    pub fail_remote_description: AtomicBool,
    pub fail_create_answer: AtomicBool,
}

#[async_trait]
impl NegotiationEngine for ScriptedEngine {
    async fn set_local_description(&self, description: RTCSessionDescription) -> Result<()> {
        self.calls
            .lock()
            .push(format!("set_local:{}", description.sdp_type));
        Ok(())
    }

    async fn set_remote_description(&self, description: RTCSessionDescription) -> Result<()> {
        if self.fail_remote_description.load(Ordering::SeqCst) {
            return Err(Error::SdpError("unsupported m-line".to_string()));
        }
        self.calls
            .lock()
            .push(format!("set_remote:{}", description.sdp_type));
        Ok(())
    }

    async fn create_answer(&self) -> Result<RTCSessionDescription> {
        if self.fail_create_answer.load(Ordering::SeqCst) {
            return Err(Error::SdpError("no common codec".to_string()));
        }
        self.calls.lock().push("create_answer".to_string());
        Ok(serde_json::from_str(r#"{"type":"answer","sdp":"v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n"}"#)
            .expect("valid answer"))
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.calls
            .lock()
            .push(format!("add_candidate:{}", candidate.candidate));
        Ok(())
    }
}

/// Signaling source that replays a fixed list, then fails like a dropped socket
pub struct ScriptedSignaling {
    messages: VecDeque<String>,
    pub closed: bool,
}

impl ScriptedSignaling {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            closed: false,
        }
    }
}

#[async_trait]
impl SignalingSource for ScriptedSignaling {
    async fn recv_text(&mut self) -> Result<String> {
        self.messages
            .pop_front()
            .ok_or_else(|| Error::SignalingError("connection reset by peer".to_string()))
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Datagram sink whose destination can be switched off and on
#[derive(Default)]
pub struct ToggleSink {
    unavailable: AtomicBool,
    pub delivered: Mutex<Vec<Vec<u8>>>,
}

impl ToggleSink {
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatagramSink for ToggleSink {
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<usize> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "nothing listening",
            ));
        }
        self.delivered.lock().push(datagram.to_vec());
        Ok(datagram.len())
    }
}

/// Frame source that yields queued frames, then reports the track as ended
#[derive(Default)]
pub struct QueuedFrames {
    frames: Mutex<VecDeque<Vec<u8>>>,
}

impl QueuedFrames {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
        }
    }
}

#[async_trait]
impl FrameSource for QueuedFrames {
    async fn read_frame(&self, buf: &mut [u8]) -> Result<usize> {
        let frame = self
            .frames
            .lock()
            .pop_front()
            .ok_or_else(|| Error::MediaTrackError("track ended".to_string()))?;
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }
}

/// Build an RTP frame as a publisher would send it
pub fn rtp_frame(payload_type: u8, sequence_number: u16, payload: &'static [u8]) -> Vec<u8> {
    Packet {
        header: Header {
            version: 2,
            payload_type,
            sequence_number,
            timestamp: u32::from(sequence_number) * 3000,
            ssrc: 0x1234_5678,
            ..Default::default()
        },
        payload: bytes::Bytes::from_static(payload),
    }
    .marshal()
    .expect("marshal test frame")
    .to_vec()
}

/// A host candidate as the engine reports it
pub fn host_candidate(n: u8) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: format!(
            "candidate:{} 1 udp 2130706431 192.168.0.{} {} typ host",
            n,
            n,
            50000 + u16::from(n)
        ),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}
