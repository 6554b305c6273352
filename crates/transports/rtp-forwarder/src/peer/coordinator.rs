//! Signaling state coordinator
//!
//! Applies inbound signaling messages to the negotiation engine one at a
//! time, in arrival order, and routes locally gathered candidates either
//! into the candidate buffer or straight onto the signaling channel.

use super::candidates::{Admission, CandidateBuffer};
use super::engine::NegotiationEngine;
use super::session::{NegotiationPhase, Session};
use crate::signaling::client::SignalSink;
use crate::signaling::protocol::{answer_to_json, IceCandidateMessage, InboundMessage};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// What the coordinator did with one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Player count observed
    PlayerCount(i64),
    /// Streamer config observed and ignored
    ConfigIgnored,
    /// Remote answer applied; `flushed` buffered candidates were sent
    AnswerApplied { flushed: usize },
    /// Remote offer answered; `flushed` buffered candidates were sent once
    /// the offer was applied
    OfferAnswered { flushed: usize },
    /// Remote candidate handed to the engine
    RemoteCandidateAdded,
    /// Unrecognized message type
    Ignored(String),
}

/// Where a local candidate went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateRoute {
    /// Held until the remote description is applied
    Buffered,
    /// Sent on the signaling channel
    Sent,
}

/// Drives negotiation for the single session
pub struct SignalingCoordinator {
    engine: Arc<dyn NegotiationEngine>,
    sink: Arc<dyn SignalSink>,
    session: Arc<Session>,
    candidates: CandidateBuffer<RTCIceCandidateInit>,
}

impl SignalingCoordinator {
    /// Create a coordinator for `session`
    pub fn new(
        engine: Arc<dyn NegotiationEngine>,
        sink: Arc<dyn SignalSink>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            engine,
            sink,
            session,
            candidates: CandidateBuffer::new(),
        }
    }

    /// Session this coordinator negotiates
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Current negotiation phase
    pub fn phase(&self) -> NegotiationPhase {
        self.session.phase()
    }

    /// Number of local candidates waiting for negotiation
    pub fn pending_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Handle one raw inbound message
    ///
    /// An error means this message was dropped; the session carries on.
    pub async fn handle_message(&self, text: &str) -> Result<MessageOutcome> {
        debug!(raw = %text, "Received signaling message");

        let message = InboundMessage::parse(text)?;
        debug!(message_type = message.kind(), "Handling signaling message");

        match message {
            InboundMessage::PlayerCount(count) => {
                info!(count, "Player count: {}", count);
                Ok(MessageOutcome::PlayerCount(count))
            }
            InboundMessage::Config(_) => {
                info!("Received streamer config");
                Ok(MessageOutcome::ConfigIgnored)
            }
            InboundMessage::Answer(description) => self.apply_answer(description).await,
            InboundMessage::Offer(description) => self.answer_offer(description).await,
            InboundMessage::IceCandidate(candidate) => {
                self.engine.add_ice_candidate(candidate).await?;
                debug!("Added remote ICE candidate");
                Ok(MessageOutcome::RemoteCandidateAdded)
            }
            InboundMessage::Unknown(message_type) => {
                info!(message_type = %message_type, "Ignoring unhandled signaling message");
                Ok(MessageOutcome::Ignored(message_type))
            }
        }
    }

    /// The remote side produced both halves of the exchange, so its answer
    /// is applied as the local description first and then as the remote one.
    async fn apply_answer(&self, description: RTCSessionDescription) -> Result<MessageOutcome> {
        self.engine
            .set_local_description(description.clone())
            .await?;
        self.session.set_local_description(description.clone());
        debug!("Applied answer as local description");

        self.engine
            .set_remote_description(description.clone())
            .await?;
        self.session.set_remote_description(description);
        self.session.set_phase(NegotiationPhase::Negotiated);
        info!("Applied answer from publisher");

        let flushed = self.flush_candidates();
        Ok(MessageOutcome::AnswerApplied { flushed })
    }

    /// Candidates gathered from here on go out directly, so the buffer is
    /// drained as soon as the offer is applied and before the answer is
    /// built. A failure later in the exchange leaves the buffer closed.
    async fn answer_offer(&self, offer: RTCSessionDescription) -> Result<MessageOutcome> {
        self.engine.set_remote_description(offer.clone()).await?;
        self.session.set_remote_description(offer);
        self.session.set_phase(NegotiationPhase::RemoteDescriptionPending);
        debug!("Applied offer as remote description");

        let flushed = self.flush_candidates();

        let answer = self.engine.create_answer().await?;
        self.engine.set_local_description(answer.clone()).await?;
        let json = answer_to_json(&answer)?;
        self.session.set_local_description(answer);

        self.sink.send_text(json)?;
        self.session.set_phase(NegotiationPhase::Negotiated);
        info!("Sent answer to publisher");

        Ok(MessageOutcome::OfferAnswered { flushed })
    }

    /// Route one locally gathered candidate
    pub fn on_local_candidate(&self, candidate: RTCIceCandidateInit) -> CandidateRoute {
        match self.candidates.append(candidate) {
            Admission::Buffered => {
                debug!(pending = self.candidates.len(), "Buffered local ICE candidate");
                CandidateRoute::Buffered
            }
            Admission::Closed(candidate) => {
                self.send_candidate(candidate);
                CandidateRoute::Sent
            }
        }
    }

    fn flush_candidates(&self) -> usize {
        let flushed = self
            .candidates
            .drain_and_transmit(|candidate| self.send_candidate(candidate));
        if flushed > 0 {
            info!(count = flushed, "Flushed buffered local ICE candidates");
        }
        flushed
    }

    fn send_candidate(&self, candidate: RTCIceCandidateInit) {
        let sent = IceCandidateMessage::new(candidate)
            .to_json()
            .and_then(|json| self.sink.send_text(json));
        match sent {
            Ok(()) => debug!("Sent local ICE candidate"),
            Err(e) => warn!("Failed to send local ICE candidate: {}", e),
        }
    }
}
