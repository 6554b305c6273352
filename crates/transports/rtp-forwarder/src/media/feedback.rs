//! Periodic RTCP feedback towards the publisher
//!
//! The publisher only sends a keyframe on request, and without a receiver
//! estimate its congestion controller settles on a low bitrate. One emitter
//! runs per remote track and sends PLI and REMB on their own intervals.

use crate::config::FeedbackConfig;
use crate::media::MediaKind;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::packet::Packet as RtcpPacket;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtcp::payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate;

/// Writes RTCP packets back towards the media sender
#[async_trait]
pub trait FeedbackWriter: Send + Sync {
    /// Send a compound of RTCP packets
    async fn write_feedback(&self, packets: &[Box<dyn RtcpPacket + Send + Sync>]) -> Result<()>;
}

#[async_trait]
impl FeedbackWriter for RTCPeerConnection {
    async fn write_feedback(&self, packets: &[Box<dyn RtcpPacket + Send + Sync>]) -> Result<()> {
        self.write_rtcp(packets)
            .await
            .map(|_| ())
            .map_err(|e| Error::RtcpError(format!("Failed to write RTCP: {}", e)))
    }
}

/// Keyframe-request and bandwidth-estimate ticker for one media source
pub struct FeedbackEmitter {
    kind: MediaKind,
    media_ssrc: u32,
    writer: Arc<dyn FeedbackWriter>,
    config: FeedbackConfig,
}

impl FeedbackEmitter {
    /// Create an emitter addressed to `media_ssrc`
    pub fn new(
        kind: MediaKind,
        media_ssrc: u32,
        writer: Arc<dyn FeedbackWriter>,
        config: FeedbackConfig,
    ) -> Self {
        Self {
            kind,
            media_ssrc,
            writer,
            config,
        }
    }

    /// Whether any feedback type is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.send_pli || self.config.send_remb
    }

    /// Send a picture loss indication
    pub async fn request_keyframe(&self) -> Result<()> {
        let pli = PictureLossIndication {
            sender_ssrc: 0,
            media_ssrc: self.media_ssrc,
        };
        self.writer.write_feedback(&[Box::new(pli)]).await
    }

    /// Send a receiver estimated maximum bitrate message
    pub async fn send_bandwidth_estimate(&self) -> Result<()> {
        let remb = ReceiverEstimatedMaximumBitrate {
            sender_ssrc: 0,
            bitrate: self.config.remb_bitrate as f32,
            ssrcs: vec![self.media_ssrc],
        };
        self.writer.write_feedback(&[Box::new(remb)]).await
    }

    /// Emit feedback forever; write failures are logged and skipped
    pub async fn run(self) {
        if !self.is_enabled() {
            return;
        }

        let pli_period = self.config.pli_interval();
        let remb_period = self.config.remb_interval();

        let mut pli_ticker = interval_at(Instant::now() + pli_period, pli_period);
        let mut remb_ticker = interval_at(Instant::now() + remb_period, remb_period);
        pli_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        remb_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            kind = %self.kind,
            ssrc = self.media_ssrc,
            pli_ms = pli_period.as_millis() as u64,
            remb_ms = remb_period.as_millis() as u64,
            "RTCP feedback started"
        );

        loop {
            tokio::select! {
                _ = pli_ticker.tick(), if self.config.send_pli => {
                    if let Err(e) = self.request_keyframe().await {
                        warn!(kind = %self.kind, ssrc = self.media_ssrc, "Failed to send PLI: {}", e);
                    }
                }
                _ = remb_ticker.tick(), if self.config.send_remb => {
                    if let Err(e) = self.send_bandwidth_estimate().await {
                        warn!(kind = %self.kind, ssrc = self.media_ssrc, "Failed to send REMB: {}", e);
                    }
                }
            }
        }
    }

    /// Run the emitter on its own task; `None` when all feedback is disabled
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            debug!(kind = %self.kind, "RTCP feedback disabled");
            return None;
        }
        Some(tokio::spawn(self.run()))
    }
}
