//! Streaming chat connection over WebSocket

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message as WsMessage,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    error::{Error, Result},
    stream::{ClientFrame, ServerEvent, SocketEvent, SocketEventStream},
};

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// A chat WebSocket driven by a background task.
///
/// [`ChatSocket::connect`] returns immediately in the `Connecting` state; the
/// handshake runs on the spawned task. Inbound frames are parsed and queued
/// until the reader takes the event stream.
pub struct ChatSocket {
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    events: Option<mpsc::UnboundedReceiver<SocketEvent>>,
    cancel: CancellationToken,
}

impl ChatSocket {
    /// Start connecting to `url`. Must be called inside a tokio runtime.
    pub fn connect(url: Url) -> Self {
        let state = Arc::new(AtomicU8::new(ConnectionState::Connecting as u8));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_connection(
            url,
            Arc::clone(&state),
            outbound_rx,
            events_tx,
            cancel.clone(),
        ));

        Self {
            state,
            outbound,
            events: Some(events),
            cancel,
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Queue a frame; fails unless the connection is open
    pub fn send(&self, frame: ClientFrame) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        self.outbound.send(frame).map_err(|_| Error::NotConnected)
    }

    /// Take the inbound event stream. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<SocketEventStream> {
        self.events
            .take()
            .map(|rx| Box::pin(UnboundedReceiverStream::new(rx)) as SocketEventStream)
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}

impl Drop for ChatSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_connection(
    url: Url,
    state: Arc<AtomicU8>,
    mut outbound: mpsc::UnboundedReceiver<ClientFrame>,
    events: mpsc::UnboundedSender<SocketEvent>,
    cancel: CancellationToken,
) {
    let set_closed = || state.store(ConnectionState::Closed as u8, Ordering::Release);

    tracing::debug!("Connecting to {}{}", url.host_str().unwrap_or(""), url.path());
    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            set_closed();
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::warn!("WebSocket connect failed: {}", e);
            set_closed();
            let _ = events.send(SocketEvent::Error(e.to_string()));
            let _ = events.send(SocketEvent::Closed);
            return;
        }
    };

    // A close() racing the handshake wins.
    if cancel.is_cancelled() {
        set_closed();
        return;
    }
    state.store(ConnectionState::Open as u8, Ordering::Release);
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
            Some(frame) = outbound.recv() => {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    tracing::warn!("WebSocket send failed: {}", e);
                    let _ = events.send(SocketEvent::Error(e.to_string()));
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => {
                        let _ = events.send(SocketEvent::Frame(event));
                    }
                    Err(e) => tracing::warn!("Ignoring malformed frame: {}", e),
                },
                Some(Ok(WsMessage::Ping(data))) => {
                    let _ = sink.send(WsMessage::Pong(data)).await;
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    if let Some(reason) = frame.as_ref().and_then(close_reason) {
                        tracing::warn!("WebSocket closed by server: {}", reason);
                        let _ = events.send(SocketEvent::Error(reason));
                    }
                    break;
                }
                None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("WebSocket read failed: {}", e);
                    let _ = events.send(SocketEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }

    set_closed();
    let _ = events.send(SocketEvent::Closed);
    tracing::debug!("WebSocket closed");
}

/// Describe a close frame the user should hear about; normal closes are silent
fn close_reason(frame: &CloseFrame<'_>) -> Option<String> {
    if frame.code == CloseCode::Normal && frame.reason.is_empty() {
        return None;
    }
    let code = u16::from(frame.code);
    if frame.reason.is_empty() {
        Some(format!("closed by server ({code})"))
    } else {
        Some(format!("closed by server ({code}): {}", frame.reason))
    }
}
