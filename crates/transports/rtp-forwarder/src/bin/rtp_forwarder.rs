//! RTP forwarder binary entry point
//!
//! Joins a pixel streaming signaling server as a receive-only peer and
//! forwards the publisher's audio and video as plain RTP over UDP.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: signaling on ws://localhost:80/, audio to 127.0.0.1:4000,
//! # video to 127.0.0.1:4002
//! cargo run --bin rtp_forwarder
//!
//! # Custom signaling server and destinations
//! cargo run --bin rtp_forwarder -- \
//!   --cirrus-address 10.0.0.5 --cirrus-port 8080 \
//!   --forwarding-address 10.0.0.9 \
//!   --rtp-video-payload-type 96
//!
//! # Keyframe requests every 500 ms, no bandwidth estimates
//! cargo run --bin rtp_forwarder -- \
//!   --rtcp-pli-interval-ms 500 --rtcp-send-remb false
//! ```

use anyhow::Context;
use clap::{ArgAction, Parser};
use remotemedia_rtp_forwarder::{
    FeedbackConfig, ForwarderConfig, RelayTargetConfig, SessionDriver,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// WebRTC to RTP forwarder
///
/// Receives one pixel streaming session and relays its RTP streams to
/// fixed UDP ports.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Signaling server host
    #[arg(long, default_value = "localhost", env = "CIRRUS_ADDRESS")]
    cirrus_address: String,

    /// Signaling server port
    #[arg(long, default_value_t = 80, env = "CIRRUS_PORT")]
    cirrus_port: u16,

    /// Host receiving the forwarded RTP streams
    #[arg(long, default_value = "127.0.0.1", env = "FORWARDING_ADDRESS")]
    forwarding_address: String,

    /// UDP port for forwarded audio
    #[arg(long, default_value_t = 4000, env = "RTP_AUDIO_FORWARDING_PORT")]
    rtp_audio_forwarding_port: u16,

    /// UDP port for forwarded video
    #[arg(long, default_value_t = 4002, env = "RTP_VIDEO_FORWARDING_PORT")]
    rtp_video_forwarding_port: u16,

    /// Payload type written into forwarded audio packets (111 is Opus)
    #[arg(long, default_value_t = 111, env = "RTP_AUDIO_PAYLOAD_TYPE")]
    rtp_audio_payload_type: u8,

    /// Payload type written into forwarded video packets (125 is H.264 in Chrome)
    #[arg(long, default_value_t = 125, env = "RTP_VIDEO_PAYLOAD_TYPE")]
    rtp_video_payload_type: u8,

    /// RTCP feedback interval in milliseconds
    #[arg(long, default_value_t = 2000, env = "RTCP_INTERVAL_MS")]
    rtcp_interval_ms: u64,

    /// Keyframe request interval in milliseconds (defaults to --rtcp-interval-ms)
    #[arg(long, env = "RTCP_PLI_INTERVAL_MS")]
    rtcp_pli_interval_ms: Option<u64>,

    /// Bandwidth estimate interval in milliseconds (defaults to --rtcp-interval-ms)
    #[arg(long, env = "RTCP_REMB_INTERVAL_MS")]
    rtcp_remb_interval_ms: Option<u64>,

    /// Send periodic keyframe requests (PLI)
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "RTCP_SEND_PLI")]
    rtcp_send_pli: bool,

    /// Send periodic bandwidth estimates (REMB)
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "RTCP_SEND_REMB")]
    rtcp_send_remb: bool,

    /// Bitrate advertised in bandwidth estimates, bits per second
    #[arg(long, default_value_t = 400_000_000, env = "REMB")]
    remb: u64,

    /// STUN servers (comma-separated)
    #[arg(long, value_delimiter = ',', env = "STUN_SERVERS")]
    stun_servers: Vec<String>,
}

impl Args {
    fn into_config(self) -> ForwarderConfig {
        ForwarderConfig {
            signaling_address: self.cirrus_address,
            signaling_port: self.cirrus_port,
            forwarding_address: self.forwarding_address,
            audio: RelayTargetConfig {
                port: self.rtp_audio_forwarding_port,
                payload_type: self.rtp_audio_payload_type,
            },
            video: RelayTargetConfig {
                port: self.rtp_video_forwarding_port,
                payload_type: self.rtp_video_payload_type,
            },
            feedback: FeedbackConfig {
                interval_ms: self.rtcp_interval_ms,
                pli_interval_ms: self.rtcp_pli_interval_ms,
                remb_interval_ms: self.rtcp_remb_interval_ms,
                send_pli: self.rtcp_send_pli,
                send_remb: self.rtcp_send_remb,
                remb_bitrate: self.remb,
            },
            stun_servers: self
                .stun_servers
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Ctrl+C ends the session; a second one exits immediately
    let shutdown = Arc::new(Notify::new());
    let shutdown_requested = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        let shutdown_requested = Arc::clone(&shutdown_requested);
        ctrlc::set_handler(move || {
            if shutdown_requested.swap(true, Ordering::SeqCst) {
                eprintln!("Shutdown already in progress, exiting");
                std::process::exit(130);
            }
            eprintln!("\nCtrl+C received, shutting down...");
            shutdown.notify_one();
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("rtp-forwarder-worker")
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(async_main(args, shutdown))
}

async fn async_main(args: Args, shutdown: Arc<Notify>) -> anyhow::Result<()> {
    init_tracing();

    let config = args.into_config();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        signaling_url = %config.signaling_url(),
        forwarding_address = %config.forwarding_address,
        audio_port = config.audio.port,
        audio_payload_type = config.audio.payload_type,
        video_port = config.video.port,
        video_payload_type = config.video.payload_type,
        "RTP forwarder starting"
    );
    info!(
        interval_ms = config.feedback.interval_ms,
        send_pli = config.feedback.send_pli,
        send_remb = config.feedback.send_remb,
        remb_bitrate = config.feedback.remb_bitrate,
        "RTCP feedback settings"
    );

    let driver = SessionDriver::new(config).context("Invalid forwarder configuration")?;

    if let Err(e) = driver.run(async move { shutdown.notified().await }).await {
        error!("Forwarding session failed: {}", e);
        return Err(anyhow::Error::new(e).context("Forwarding session failed"));
    }

    info!("RTP forwarder stopped");
    Ok(())
}

fn init_tracing() {
    // RUST_LOG overrides the default level
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
