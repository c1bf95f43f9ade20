//! Choosing between the live connection and a one-shot request

use std::{sync::Arc, time::Duration};

use mist_api::{ChatReply, ConnectionState, ConversationTarget};

use crate::{
    backend::{ChatBackend, LiveConnection},
    error::Result,
};

/// How long to wait for a fresh connection before falling back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Number of readiness polls
    pub attempts: u32,
    /// Delay between polls
    pub interval: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(300),
        }
    }
}

impl ReadinessConfig {
    /// Upper bound on the time spent waiting
    pub fn max_wait(&self) -> Duration {
        self.interval * self.attempts
    }
}

/// How a message was delivered
pub enum Delivery {
    /// Sent on a connection opened for this message; the reply streams on it
    Opened(Box<dyn LiveConnection>),
    /// Answered by the request/response endpoint
    Rest(ChatReply),
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Opened(conn) => write!(f, "Opened({:?})", conn.state()),
            Delivery::Rest(reply) => f.debug_tuple("Rest").field(reply).finish(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportChooser {
    readiness: ReadinessConfig,
}

impl TransportChooser {
    pub fn new(readiness: ReadinessConfig) -> Self {
        Self { readiness }
    }

    /// Send on `live` if it is open. `Ok(false)` means a new connection is needed.
    pub fn try_live(live: Option<&mut Box<dyn LiveConnection>>, message: &str) -> Result<bool> {
        match live {
            Some(conn) if conn.state() == ConnectionState::Open => {
                conn.send(message)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Open a connection and send on it once ready, or fall back to a one-shot request.
    ///
    /// An unready connection is closed before falling back so the server
    /// never sees the message twice.
    pub async fn connect_and_send(
        &self,
        backend: Arc<dyn ChatBackend>,
        message: String,
        target: ConversationTarget,
    ) -> Result<Delivery> {
        match backend.open(target) {
            Ok(mut conn) => {
                if wait_until_open(conn.as_mut(), self.readiness).await {
                    match conn.send(&message) {
                        Ok(()) => return Ok(Delivery::Opened(conn)),
                        Err(e) => tracing::warn!("Send on fresh connection failed: {}", e),
                    }
                } else {
                    tracing::debug!(
                        "Connection not ready after {:?}, falling back to request",
                        self.readiness.max_wait()
                    );
                }
                conn.close();
            }
            Err(e) => tracing::warn!("Could not open connection: {}", e),
        }

        let reply = backend.send_once(&message, target.id()).await?;
        Ok(Delivery::Rest(reply))
    }
}

/// Poll until open, giving up early if the connection closes
async fn wait_until_open(conn: &mut dyn LiveConnection, readiness: ReadinessConfig) -> bool {
    for _ in 0..readiness.attempts {
        match conn.state() {
            ConnectionState::Open => return true,
            ConnectionState::Closed => return false,
            ConnectionState::Connecting => tokio::time::sleep(readiness.interval).await,
        }
    }
    conn.state() == ConnectionState::Open
}
