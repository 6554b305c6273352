//! Signaling flow integration tests
//!
//! Drives the coordinator through the signaling loop the way a pixel
//! streaming signaling server would, using in-memory collaborators.
//!
//! ## Test Scenarios
//!
//! 1. Publisher offers; exactly one answer goes back
//! 2. Candidates gathered before the answer are flushed in order, once
//! 3. Candidates gathered after negotiation bypass the buffer
//! 4. Broken messages never stop the loop
//! 5. Concurrent candidate gathering while the answer lands

mod harness;

use harness::{host_candidate, RecordingSignalSink, ScriptedEngine, ScriptedSignaling};
use remotemedia_rtp_forwarder::peer::{
    CandidateRoute, MessageOutcome, NegotiationPhase, Session, SignalingCoordinator,
};
use remotemedia_rtp_forwarder::transport::run_signaling_loop;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_test::assert_ok;

fn setup() -> (
    Arc<SignalingCoordinator>,
    Arc<ScriptedEngine>,
    Arc<RecordingSignalSink>,
) {
    let engine = Arc::new(ScriptedEngine::default());
    let sink = Arc::new(RecordingSignalSink::default());
    let coordinator = Arc::new(SignalingCoordinator::new(
        engine.clone(),
        sink.clone(),
        Arc::new(Session::new()),
    ));
    (coordinator, engine, sink)
}

const OFFER: &str = r#"{"type":"offer","sdp":"v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n"}"#;
const ANSWER: &str = r#"{"type":"answer","sdp":"v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n"}"#;

#[tokio::test]
async fn test_offer_flow_sends_single_answer() {
    let (coordinator, engine, sink) = setup();
    let mut signaling = ScriptedSignaling::new([
        r#"{"type":"config","peerConnectionOptions":{}}"#,
        r#"{"type":"playerCount","count":1}"#,
        OFFER,
        r#"{"type":"iceCandidate","candidate":{"candidate":"candidate:1 1 udp 2130706431 10.0.0.2 61000 typ host","sdpMid":"0","sdpMLineIndex":0}}"#,
    ]);

    let received = run_signaling_loop(&mut signaling, &coordinator).await;

    assert_eq!(received, 4);
    assert!(signaling.closed);
    assert_eq!(sink.types(), vec!["answer"]);
    assert_eq!(coordinator.phase(), NegotiationPhase::Negotiated);

    let calls = engine.calls.lock().clone();
    assert_eq!(calls[0], "set_remote:offer");
    assert_eq!(calls[1], "create_answer");
    assert_eq!(calls[2], "set_local:answer");
    assert!(calls[3].starts_with("add_candidate:candidate:1 "));
}

#[tokio::test]
async fn test_offer_rejected_by_engine_sends_nothing() {
    let (coordinator, engine, sink) = setup();
    engine.fail_remote_description.store(true, Ordering::SeqCst);

    let result = coordinator.handle_message(OFFER).await;

    assert!(result.is_err());
    assert!(sink.messages().is_empty());
    assert_eq!(coordinator.phase(), NegotiationPhase::Idle);
    assert!(coordinator.session().remote_description().is_none());
}

#[tokio::test]
async fn test_answer_flow_flushes_early_candidates_once() {
    let (coordinator, engine, sink) = setup();

    assert_eq!(coordinator.on_local_candidate(host_candidate(1)), CandidateRoute::Buffered);
    assert_eq!(coordinator.on_local_candidate(host_candidate(2)), CandidateRoute::Buffered);
    assert!(sink.messages().is_empty());

    let mut signaling = ScriptedSignaling::new([ANSWER, r#"{"type":"playerCount","count":2}"#]);
    run_signaling_loop(&mut signaling, &coordinator).await;

    let messages = sink.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], "iceCandidate");
    assert_eq!(messages[0]["candidate"]["candidate"], host_candidate(1).candidate);
    assert_eq!(messages[1]["candidate"]["candidate"], host_candidate(2).candidate);

    assert_eq!(
        *engine.calls.lock(),
        vec!["set_local:answer", "set_remote:answer"]
    );
    assert_eq!(coordinator.phase(), NegotiationPhase::Negotiated);
    assert!(coordinator.session().local_description().is_some());
    assert!(coordinator.session().remote_description().is_some());
}

#[tokio::test]
async fn test_late_candidates_bypass_buffer() {
    let (coordinator, _engine, sink) = setup();

    let outcome = assert_ok!(coordinator.handle_message(ANSWER).await);
    assert_eq!(outcome, MessageOutcome::AnswerApplied { flushed: 0 });

    assert_eq!(coordinator.on_local_candidate(host_candidate(7)), CandidateRoute::Sent);
    assert_eq!(coordinator.pending_candidates(), 0);
    assert_eq!(sink.types(), vec!["iceCandidate"]);
}

#[tokio::test]
async fn test_loop_continues_past_malformed_messages() {
    let (coordinator, _engine, sink) = setup();
    let mut signaling = ScriptedSignaling::new([
        "not json at all",
        r#"{"no_type":true}"#,
        r#"{"type":"offer"}"#,
        r#"{"type":"iceCandidate","candidate":42}"#,
        r#"{"type":"streamerDataChannels"}"#,
        OFFER,
    ]);

    let received = run_signaling_loop(&mut signaling, &coordinator).await;

    assert_eq!(received, 6);
    assert_eq!(sink.types(), vec!["answer"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_candidates_racing_the_answer_are_sent_exactly_once() {
    const PER_TASK: u8 = 40;
    let (coordinator, _engine, sink) = setup();

    let gatherers: Vec<_> = (0..3u8)
        .map(|t| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                for i in 0..PER_TASK {
                    coordinator.on_local_candidate(host_candidate(t * PER_TASK + i));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    tokio::task::yield_now().await;
    assert_ok!(coordinator.handle_message(ANSWER).await);

    for gatherer in gatherers {
        gatherer.await.unwrap();
    }

    let sent: Vec<String> = sink
        .messages()
        .iter()
        .map(|m| m["candidate"]["candidate"].as_str().unwrap().to_string())
        .collect();
    let unique: HashSet<_> = sent.iter().collect();

    assert_eq!(sent.len(), 3 * PER_TASK as usize);
    assert_eq!(unique.len(), sent.len());
    assert_eq!(coordinator.pending_candidates(), 0);
}
