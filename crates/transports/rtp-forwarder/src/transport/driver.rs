//! Session driver: wires signaling, the peer connection and the relays

use crate::config::{FeedbackConfig, ForwarderConfig};
use crate::media::{
    FeedbackEmitter, FeedbackWriter, FrameSource, MediaKind, RelayTarget, RelayTargets,
};
use crate::peer::{
    create_peer_connection, ConnectionState, NegotiationEngine, Session, SignalingCoordinator,
};
use crate::signaling::{self, SignalingSource};
use crate::Result;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Handles of relay and feedback tasks owned by the driver
type TaskList = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Read signaling messages and hand them to the coordinator until the
/// channel fails
///
/// A message that cannot be handled is logged and skipped. On a read
/// error the channel is closed and the number of messages read is
/// returned.
pub async fn run_signaling_loop(
    source: &mut dyn SignalingSource,
    coordinator: &SignalingCoordinator,
) -> usize {
    let mut received = 0usize;

    loop {
        let text = match source.recv_text().await {
            Ok(text) => text,
            Err(e) => {
                info!("Signaling channel ended: {}", e);
                source.close().await;
                return received;
            }
        };
        received += 1;

        if let Err(e) = coordinator.handle_message(&text).await {
            let message_type = signaling::InboundMessage::message_type(&text)
                .unwrap_or_else(|_| "<unparsed>".to_string());
            warn!(message_type = %message_type, "Failed to handle signaling message: {}", e);
        }
    }
}

/// Start relaying one media source, with its feedback ticker alongside
///
/// Returns the relay task handle followed by the feedback task handle, if
/// any. The feedback ticker is stopped when the relay loop ends.
pub fn spawn_media_relay(
    source: Arc<dyn FrameSource>,
    target: Arc<RelayTarget>,
    feedback: Option<FeedbackEmitter>,
) -> Vec<JoinHandle<()>> {
    let feedback = feedback.and_then(FeedbackEmitter::spawn);
    let feedback_abort = feedback.as_ref().map(JoinHandle::abort_handle);

    let relay = tokio::spawn(async move {
        let kind = target.kind();
        info!(kind = %kind, destination = %target.destination(), "Relaying media");

        let result = target.relay_frames(source.as_ref()).await;

        if let Some(abort) = feedback_abort {
            abort.abort();
        }

        let stats = target.stats();
        match result {
            Ok(()) => info!(
                kind = %kind,
                forwarded = stats.forwarded,
                unreachable = stats.unreachable,
                "Relay loop ended"
            ),
            Err(e) => error!(
                kind = %kind,
                forwarded = stats.forwarded,
                unreachable = stats.unreachable,
                "Relay loop failed: {}",
                e
            ),
        }
    });

    std::iter::once(relay).chain(feedback).collect()
}

/// Runs the single forwarding session of the process
pub struct SessionDriver {
    config: ForwarderConfig,
    session: Arc<Session>,
    tasks: TaskList,
}

impl SessionDriver {
    /// Create a driver for a validated configuration
    pub fn new(config: ForwarderConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            session: Arc::new(Session::new()),
            tasks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Session driven by this driver
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run until the signaling channel ends or `shutdown` resolves
    ///
    /// Returns an error only for session-fatal failures during setup.
    /// Relay tasks, the signaling channel and the peer connection are
    /// released on every exit path.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(session_id = %self.session.id(), "Starting forwarding session");

        let (sender, mut receiver) = signaling::connect(&self.config.signaling_url()).await?;

        let peer_connection = match create_peer_connection(&self.config).await {
            Ok(pc) => pc,
            Err(e) => {
                receiver.close().await;
                return Err(e);
            }
        };

        let result = self
            .drive(sender, &mut receiver, &peer_connection, shutdown)
            .await;

        self.teardown(&mut receiver, &peer_connection).await;
        result
    }

    async fn drive<F>(
        &self,
        sender: signaling::SignalingSender,
        receiver: &mut signaling::SignalingReceiver,
        peer_connection: &Arc<RTCPeerConnection>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let engine: Arc<dyn NegotiationEngine> = Arc::clone(peer_connection) as _;
        let coordinator = Arc::new(SignalingCoordinator::new(
            engine,
            Arc::new(sender),
            Arc::clone(&self.session),
        ));

        self.register_candidate_handler(peer_connection, &coordinator);
        self.register_state_handlers(peer_connection);

        let targets = RelayTargets::connect(&self.config).await?;
        self.register_track_handler(peer_connection, targets);

        tokio::select! {
            received = run_signaling_loop(receiver, &coordinator) => {
                info!(messages = received, "Signaling loop finished");
            }
            _ = shutdown => {
                info!("Shutdown requested");
            }
        }

        Ok(())
    }

    fn register_candidate_handler(
        &self,
        peer_connection: &RTCPeerConnection,
        coordinator: &Arc<SignalingCoordinator>,
    ) {
        let coordinator = Arc::downgrade(coordinator);

        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let coordinator = coordinator.clone();

            Box::pin(async move {
                let candidate = match candidate {
                    Some(candidate) => candidate,
                    None => {
                        debug!("ICE gathering complete");
                        return;
                    }
                };

                let init = match candidate.to_json() {
                    Ok(init) => init,
                    Err(e) => {
                        warn!("Failed to serialize local ICE candidate: {}", e);
                        return;
                    }
                };

                if let Some(coordinator) = coordinator.upgrade() {
                    let route = coordinator.on_local_candidate(init);
                    debug!(route = ?route, "Local ICE candidate gathered");
                }
            })
        }));
    }

    fn register_state_handlers(&self, peer_connection: &RTCPeerConnection) {
        let session = Arc::clone(&self.session);
        peer_connection.on_ice_connection_state_change(Box::new(
            move |state: RTCIceConnectionState| {
                let session = Arc::clone(&session);

                Box::pin(async move {
                    info!(state = %state, "ICE connection state changed");
                    match state {
                        RTCIceConnectionState::Connected => info!("Connected to publisher"),
                        RTCIceConnectionState::Disconnected | RTCIceConnectionState::Failed => {
                            warn!(state = %state, "Disconnected from publisher")
                        }
                        _ => {}
                    }
                    if let Some(mapped) = ConnectionState::from_ice_state(state) {
                        session.set_connection_state(mapped);
                    }
                })
            },
        ));

        let session = Arc::clone(&self.session);
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let session = Arc::clone(&session);

                Box::pin(async move {
                    if let Some(mapped) = ConnectionState::from_peer_state(state) {
                        let previous = session.set_connection_state(mapped);
                        if previous != mapped {
                            debug!("Peer state transition: {:?} -> {:?}", previous, mapped);
                        }
                    }
                    info!(state = %state, "Peer connection state changed");
                })
            },
        ));
    }

    fn register_track_handler(
        &self,
        peer_connection: &Arc<RTCPeerConnection>,
        targets: RelayTargets,
    ) {
        let writer = Arc::downgrade(peer_connection);
        let feedback_config = self.config.feedback.clone();
        let tasks = Arc::clone(&self.tasks);

        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let targets = targets.clone();
                let writer = writer.clone();
                let feedback_config = feedback_config.clone();
                let tasks = Arc::clone(&tasks);

                Box::pin(async move {
                    on_remote_track(track, &targets, &writer, feedback_config, &tasks);
                })
            },
        ));
    }

    async fn teardown(
        &self,
        receiver: &mut signaling::SignalingReceiver,
        peer_connection: &RTCPeerConnection,
    ) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        debug!(count = tasks.len(), "Stopping media tasks");
        for task in tasks {
            task.abort();
        }

        receiver.close().await;

        if let Err(e) = peer_connection.close().await {
            warn!("Failed to close peer connection: {}", e);
        }

        info!(session_id = %self.session.id(), "Forwarding session closed");
    }
}

fn on_remote_track(
    track: Arc<TrackRemote>,
    targets: &RelayTargets,
    writer: &Weak<RTCPeerConnection>,
    feedback_config: FeedbackConfig,
    tasks: &TaskList,
) {
    let codec_type = track.kind();
    let kind = match MediaKind::from_codec_type(codec_type) {
        Some(kind) => kind,
        None => {
            warn!(kind = %codec_type, "Ignoring track of unsupported kind");
            return;
        }
    };

    let ssrc = track.ssrc();
    info!(
        kind = %kind,
        ssrc,
        codec = %track.codec().capability.mime_type,
        payload_type = track.payload_type(),
        "Remote track started"
    );

    let feedback = writer.upgrade().map(|pc| {
        let writer: Arc<dyn FeedbackWriter> = pc;
        FeedbackEmitter::new(kind, ssrc, writer, feedback_config)
    });

    let source: Arc<dyn FrameSource> = track;
    let handles = spawn_media_relay(source, targets.get(kind), feedback);
    tasks.lock().extend(handles);
}

impl std::fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDriver")
            .field("session_id", &self.session.id())
            .field("tasks", &self.tasks.lock().len())
            .finish()
    }
}
