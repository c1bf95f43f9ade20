//! In-memory backend and connection doubles for tests

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_stream::stream;
use async_trait::async_trait;
use mist_api::{
    ChatReply, ConnectionState, ConversationSummary, ConversationTarget, ServerEvent,
    SocketEvent, SocketEventStream, StoredMessage,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    backend::{ChatBackend, LiveConnection},
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy)]
pub enum OpenBehavior {
    Immediately,
    After(Duration),
    Never,
    /// Handshake rejected right away
    Refused,
    /// `open` itself errors
    Fails,
}

/// Test-side view of a connection the backend opened
#[derive(Clone)]
pub struct MockHandle {
    pub target: ConversationTarget,
    state: Arc<Mutex<ConnectionState>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl MockHandle {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn push(&self, event: ServerEvent) {
        let _ = self.events.send(SocketEvent::Frame(event));
    }

    pub fn push_raw(&self, event: SocketEvent) {
        let _ = self.events.send(event);
    }

}

struct MockConnection {
    state: Arc<Mutex<ConnectionState>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    events: Option<mpsc::UnboundedReceiver<SocketEvent>>,
}

impl LiveConnection for MockConnection {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn send(&mut self, message: &str) -> Result<()> {
        if self.state() != ConnectionState::Open {
            return Err(Error::Api(mist_api::Error::NotConnected));
        }
        self.sent.lock().push(message.to_string());
        Ok(())
    }

    fn take_events(&mut self) -> Option<SocketEventStream> {
        let mut rx = self.events.take()?;
        Some(Box::pin(stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Closed;
    }
}

pub struct MockBackend {
    behavior: OpenBehavior,
    connections: Mutex<Vec<MockHandle>>,
    rest_conversation_id: Uuid,
    rest_reply: Mutex<String>,
    rest_calls: Mutex<Vec<(String, Option<Uuid>)>>,
    conversations: Mutex<Vec<ConversationSummary>>,
    histories: Mutex<HashMap<Uuid, Vec<StoredMessage>>>,
    list_calls: AtomicUsize,
    deleted: Mutex<Vec<Uuid>>,
    rest_fails: AtomicBool,
    delete_fails: AtomicBool,
}

impl MockBackend {
    pub fn new(behavior: OpenBehavior) -> Self {
        Self {
            behavior,
            connections: Mutex::new(Vec::new()),
            rest_conversation_id: Uuid::new_v4(),
            rest_reply: Mutex::new("<emotion>happy</emotion>Hi there!".to_string()),
            rest_calls: Mutex::new(Vec::new()),
            conversations: Mutex::new(Vec::new()),
            histories: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
            rest_fails: AtomicBool::new(false),
            delete_fails: AtomicBool::new(false),
        }
    }

    pub fn with_conversations(self, conversations: Vec<ConversationSummary>) -> Self {
        *self.conversations.lock() = conversations;
        self
    }

    pub fn with_history(self, id: Uuid, messages: Vec<StoredMessage>) -> Self {
        self.histories.lock().insert(id, messages);
        self
    }

    /// `send_once` answers with a server error
    pub fn with_rest_failure(self) -> Self {
        self.rest_fails.store(true, Ordering::SeqCst);
        self
    }

    /// `delete_conversation` answers with a server error
    pub fn with_delete_failure(self) -> Self {
        self.delete_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn last_connection(&self) -> Option<MockHandle> {
        self.connections.lock().last().cloned()
    }

    pub fn open_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn rest_calls(&self) -> Vec<(String, Option<Uuid>)> {
        self.rest_calls.lock().clone()
    }

    pub fn rest_conversation_id(&self) -> Uuid {
        self.rest_conversation_id
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<Uuid> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn open(&self, target: ConversationTarget) -> Result<Box<dyn LiveConnection>> {
        let initial = match self.behavior {
            OpenBehavior::Fails => return Err(Error::NotAuthenticated),
            OpenBehavior::Immediately => ConnectionState::Open,
            OpenBehavior::Refused => ConnectionState::Closed,
            OpenBehavior::After(_) | OpenBehavior::Never => ConnectionState::Connecting,
        };
        let state = Arc::new(Mutex::new(initial));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        if let OpenBehavior::After(delay) = self.behavior {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let mut state = state.lock();
                if *state == ConnectionState::Connecting {
                    *state = ConnectionState::Open;
                }
            });
        }

        self.connections.lock().push(MockHandle {
            target,
            state: Arc::clone(&state),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
            events: events_tx,
        });

        Ok(Box::new(MockConnection {
            state,
            sent,
            closed,
            events: Some(events_rx),
        }))
    }

    async fn send_once(&self, message: &str, conversation_id: Option<Uuid>) -> Result<ChatReply> {
        self.rest_calls
            .lock()
            .push((message.to_string(), conversation_id));
        if self.rest_fails.load(Ordering::SeqCst) {
            return Err(Error::Api(mist_api::Error::api(502, Some("agent unavailable".into()))));
        }
        Ok(ChatReply {
            conversation_id: conversation_id.unwrap_or(self.rest_conversation_id),
            message: self.rest_reply.lock().clone(),
        })
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.conversations.lock().clone())
    }

    async fn history(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>> {
        Ok(self
            .histories
            .lock()
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()> {
        if self.delete_fails.load(Ordering::SeqCst) {
            return Err(Error::Api(mist_api::Error::api(500, None)));
        }
        self.deleted.lock().push(conversation_id);
        self.conversations
            .lock()
            .retain(|c| c.id != conversation_id);
        Ok(())
    }
}
