//! WebSocket signaling client
//!
//! The connection is split: outbound messages go through an unbounded
//! queue drained by a sender task, so they can be sent from engine
//! callbacks without awaiting; inbound messages are read by the session
//! driver one at a time.

use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of the signaling channel
pub trait SignalSink: Send + Sync {
    /// Queue one text message for the remote side
    fn send_text(&self, text: String) -> Result<()>;
}

/// Inbound half of the signaling channel
#[async_trait]
pub trait SignalingSource: Send {
    /// Block until the next text message; an error ends the session loop
    async fn recv_text(&mut self) -> Result<String>;

    /// Close the channel
    async fn close(&mut self);
}

/// Cloneable handle that queues text frames for the sender task
#[derive(Clone)]
pub struct SignalingSender {
    tx: mpsc::UnboundedSender<Message>,
}

impl SignalSink for SignalingSender {
    fn send_text(&self, text: String) -> Result<()> {
        self.tx
            .send(Message::Text(text))
            .map_err(|_| Error::SignalingError("Signaling sender task has stopped".to_string()))
    }
}

/// Reading half of the WebSocket plus the sender task it owns
pub struct SignalingReceiver {
    read: SplitStream<WsStream>,
    tx: mpsc::UnboundedSender<Message>,
    sender_task: Option<JoinHandle<()>>,
}

/// Connect to the signaling server
///
/// Failure here is fatal to the whole session.
pub async fn connect(url: &str) -> Result<(SignalingSender, SignalingReceiver)> {
    info!("Connecting to signaling server: {}", url);

    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| Error::WebSocketError(format!("Failed to connect to {}: {}", url, e)))?;

    info!("Connected to signaling server");

    let (write, read) = ws_stream.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let sender_task = tokio::spawn(sender_task(write, rx));

    Ok((
        SignalingSender { tx: tx.clone() },
        SignalingReceiver {
            read,
            tx,
            sender_task: Some(sender_task),
        },
    ))
}

/// Sender task: sends messages from the queue to the WebSocket
async fn sender_task(
    mut write: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = msg.is_close();
        if let Err(e) = write.send(msg).await {
            error!("Failed to send WebSocket message: {}", e);
            break;
        }
        if closing {
            break;
        }
    }

    debug!("Sender task terminated");
}

#[async_trait]
impl SignalingSource for SignalingReceiver {
    async fn recv_text(&mut self) -> Result<String> {
        while let Some(msg_result) = self.read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Ok(text),
                Ok(Message::Binary(bytes)) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Ok(Message::Close(frame)) => {
                    return Err(Error::SignalingError(format!(
                        "Signaling server closed the connection: {:?}",
                        frame
                    )));
                }
                Ok(_) => continue,
                Err(e) => {
                    return Err(Error::SignalingError(format!(
                        "WebSocket read failed: {}",
                        e
                    )));
                }
            }
        }

        Err(Error::SignalingError(
            "Signaling stream ended".to_string(),
        ))
    }

    async fn close(&mut self) {
        // The sender task stops after writing the close frame
        let _ = self.tx.send(Message::Close(None));

        if let Some(task) = self.sender_task.take() {
            if let Err(e) = task.await {
                debug!("Sender task ended abnormally: {}", e);
            }
        }

        info!("Signaling channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn test_round_trip_with_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"type":"playerCount","count":1}"#.to_string()))
                .await
                .unwrap();
            let reply = ws.next().await.unwrap().unwrap();
            ws.close(None).await.unwrap();
            reply
        });

        let (sender, mut receiver) = connect(&format!("ws://{}/", addr)).await.unwrap();

        let text = receiver.recv_text().await.unwrap();
        assert_eq!(text, r#"{"type":"playerCount","count":1}"#);

        sender.send_text("hello".to_string()).unwrap();
        assert_eq!(server.await.unwrap(), Message::Text("hello".to_string()));

        let err = receiver.recv_text().await.unwrap_err();
        assert!(matches!(err, Error::SignalingError(_)));

        receiver.close().await;
        assert!(sender.send_text("late".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_connect_failure_is_session_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(&format!("ws://{}/", addr)).await.err().unwrap();
        assert!(err.is_session_fatal());
    }
}
