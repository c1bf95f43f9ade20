//! Chat controller: conversation selection, sending and stream handling

use std::{future::Future, pin::Pin, sync::Arc};

use futures::StreamExt;
use mist_api::{ConnectionState, ConversationTarget, SocketEvent};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    backend::{ChatBackend, LiveConnection},
    conversations::{ConversationList, Selection, after_delete},
    error::{Error, Result},
    message::{ChatMessage, Role},
    reducer::{ChatState, Effect, ToolStatus, reduce},
    transport::{Delivery, ReadinessConfig, TransportChooser},
};

/// Events emitted for front-ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The user's message was accepted and a turn started
    TurnStarted { message: String },
    /// Assistant text arrived
    ContentDelta { content: String },
    /// Tool activity changed
    ToolActivity {
        name: String,
        content: Option<String>,
        communicating: bool,
    },
    /// The turn finished; carries the final assistant message if any
    TurnCompleted { message: Option<ChatMessage> },
    /// The turn failed
    TurnFailed { message: String },
    /// The active conversation changed (`None` is the empty new-chat view)
    ConversationSelected { conversation_id: Option<Uuid> },
    /// History for the active conversation was loaded
    HistoryLoaded { conversation_id: Uuid, count: usize },
    ConversationsRefreshed { count: usize },
    /// Something outside a turn went wrong
    Notice { message: String },
}

impl From<&ToolStatus> for ChatEvent {
    fn from(status: &ToolStatus) -> Self {
        ChatEvent::ToolActivity {
            name: status.name.clone(),
            content: status.content.clone(),
            communicating: status.communicating,
        }
    }
}

/// An inbound connection event tagged with the connection it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub generation: u64,
    pub event: SocketEvent,
}

/// Result of a send that had to open a connection
pub struct SendOutcome {
    epoch: u64,
    result: Result<Delivery>,
}

/// A send still waiting on the connection or the fallback request.
///
/// Owns its inputs so the caller can keep handling input while it runs.
pub type PendingSend = Pin<Box<dyn Future<Output = SendOutcome> + Send>>;

/// What `begin_send` did with the message
pub enum SendStart {
    /// Empty input, or a turn is already in flight
    Ignored,
    /// Sent on the open connection
    Sent,
    /// Waiting for a connection; pass the result to `finish_send`
    Pending(PendingSend),
}

/// Drives one chat view.
///
/// Owns the view state, the cached conversation list and at most one live
/// connection. Inbound connection events arrive on the receiver returned by
/// [`ChatController::new`] and must be fed back through
/// [`ChatController::handle_connection_event`].
pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    chooser: TransportChooser,
    state: ChatState,
    conversations: ConversationList,
    active: Option<Uuid>,
    connection: Option<Box<dyn LiveConnection>>,
    forwarder: Option<JoinHandle<()>>,
    generation: u64,
    /// Bumped whenever the chat context changes; sends from an older epoch are dropped
    epoch: u64,
    connection_tx: mpsc::UnboundedSender<ConnectionEvent>,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl ChatController {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        readiness: ReadinessConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(256);
        let controller = Self {
            backend,
            chooser: TransportChooser::new(readiness),
            state: ChatState::default(),
            conversations: ConversationList::default(),
            active: None,
            connection: None,
            forwarder: None,
            generation: 0,
            epoch: 0,
            connection_tx,
            event_tx,
        };
        (controller, connection_rx)
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn conversations(&self) -> &ConversationList {
        &self.conversations
    }

    pub fn active(&self) -> Option<Uuid> {
        self.active
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.connection.as_ref().map(|c| c.state())
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Fetch the list; on first load, open the most recent conversation
    pub async fn load_conversations(&mut self) -> Result<()> {
        self.refresh_conversations().await?;
        if self.active.is_none() {
            if let Some(first) = self.conversations.first().map(|c| c.id) {
                self.select_conversation(first).await?;
            }
        }
        Ok(())
    }

    pub async fn refresh_conversations(&mut self) -> Result<()> {
        let items = self.backend.list_conversations().await?;
        self.conversations.replace(items);
        self.emit(ChatEvent::ConversationsRefreshed {
            count: self.conversations.len(),
        });
        Ok(())
    }

    /// Switch to a conversation and load its history
    pub async fn select_conversation(&mut self, id: Uuid) -> Result<()> {
        self.switch_context(Some(id));
        let history = self.backend.history(id).await?;
        // The user may have switched again while history was loading.
        if self.active != Some(id) {
            return Ok(());
        }
        let messages: Vec<ChatMessage> = history.into_iter().map(ChatMessage::from).collect();
        let count = messages.len();
        self.state.load_history(messages);
        self.emit(ChatEvent::HistoryLoaded {
            conversation_id: id,
            count,
        });
        Ok(())
    }

    /// Go to the empty view; the next send creates a conversation
    pub fn new_chat(&mut self) {
        self.switch_context(None);
    }

    /// Forget everything, e.g. after logout
    pub fn reset(&mut self) {
        self.switch_context(None);
        self.conversations = ConversationList::default();
        self.emit(ChatEvent::ConversationsRefreshed { count: 0 });
    }

    fn switch_context(&mut self, active: Option<Uuid>) {
        self.close_connection();
        self.epoch += 1;
        self.active = active;
        self.state.clear();
        self.emit(ChatEvent::ConversationSelected {
            conversation_id: active,
        });
    }

    pub async fn delete_conversation(&mut self, id: Uuid) -> Result<()> {
        self.backend.delete_conversation(id).await?;
        tracing::info!("Deleted conversation {}", id);
        self.conversations.remove(id);
        self.emit(ChatEvent::ConversationsRefreshed {
            count: self.conversations.len(),
        });
        match after_delete(self.active, id, self.conversations.items()) {
            Selection::Keep => {}
            Selection::Select(next) => self.select_conversation(next).await?,
            Selection::NewChat => self.new_chat(),
        }
        Ok(())
    }

    /// Start a send. Only the connection wait is deferred to the returned future.
    pub fn begin_send(&mut self, text: &str) -> SendStart {
        let text = text.trim();
        if text.is_empty() || self.state.loading {
            return SendStart::Ignored;
        }

        self.state.begin_turn(text);
        self.emit(ChatEvent::TurnStarted {
            message: text.to_string(),
        });

        match TransportChooser::try_live(self.connection.as_mut(), text) {
            Ok(true) => return SendStart::Sent,
            Ok(false) => {}
            Err(e) => tracing::warn!("Send on open connection failed: {}", e),
        }
        // Whatever is left is not usable; a new one gets opened.
        self.close_connection();

        let backend = Arc::clone(&self.backend);
        let chooser = self.chooser.clone();
        let target = ConversationTarget::from_active(self.active);
        let message = text.to_string();
        let epoch = self.epoch;
        SendStart::Pending(Box::pin(async move {
            let result = chooser.connect_and_send(backend, message, target).await;
            SendOutcome { epoch, result }
        }))
    }

    /// Apply the result of a pending send
    pub async fn finish_send(&mut self, outcome: SendOutcome) {
        if outcome.epoch != self.epoch {
            tracing::debug!("Discarding send from a previous conversation");
            if let Ok(Delivery::Opened(mut conn)) = outcome.result {
                conn.close();
            }
            return;
        }

        match outcome.result {
            Ok(Delivery::Opened(conn)) => self.attach(conn),
            Ok(Delivery::Rest(reply)) => {
                self.assign_conversation(reply.conversation_id);
                self.state.complete_with(reply.message);
                self.emit(ChatEvent::TurnCompleted {
                    message: self.last_reply(),
                });
                self.refresh_quietly().await;
            }
            Err(e) => {
                tracing::warn!("Send failed: {}", e);
                self.state.fail_turn();
                self.emit(ChatEvent::TurnFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Send and wait for delivery. Streamed replies still arrive as connection events.
    pub async fn send(&mut self, text: &str) {
        if let SendStart::Pending(pending) = self.begin_send(text) {
            let outcome = pending.await;
            self.finish_send(outcome).await;
        }
    }

    /// Feed connection events until the current turn ends
    pub async fn run_until_idle(&mut self, events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) {
        while self.state.loading {
            match events.recv().await {
                Some(event) => self.handle_connection_event(event).await,
                None => break,
            }
        }
    }

    pub async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        if event.generation != self.generation || self.connection.is_none() {
            tracing::trace!("Dropping event from stale connection {}", event.generation);
            return;
        }

        match event.event {
            SocketEvent::Frame(frame) => {
                let effects = reduce(&mut self.state, &frame);
                self.emit_for_frame(&frame);
                for effect in effects {
                    self.apply(effect).await;
                }
            }
            SocketEvent::Error(message) => {
                tracing::warn!("Connection error: {}", message);
                self.drop_connection();
                self.abandon_turn(Error::Connection(message));
            }
            SocketEvent::Closed => {
                tracing::debug!("Connection closed by server");
                self.drop_connection();
                self.abandon_turn(Error::Connection("closed by server".to_string()));
            }
        }
    }

    fn emit_for_frame(&self, frame: &mist_api::ServerEvent) {
        use mist_api::ServerEvent;
        match frame {
            ServerEvent::Content { content } => self.emit(ChatEvent::ContentDelta {
                content: content.clone(),
            }),
            ServerEvent::ToolCall { .. } | ServerEvent::Tool { .. } => {
                if let Some(status) = &self.state.tool_status {
                    self.emit(status.into());
                }
            }
            ServerEvent::Done => self.emit(ChatEvent::TurnCompleted {
                message: self.last_reply(),
            }),
            _ => {}
        }
    }

    /// The trailing assistant message; `None` when the turn produced no reply
    fn last_reply(&self) -> Option<ChatMessage> {
        self.state
            .messages
            .last()
            .filter(|m| m.role == Role::Assistant)
            .cloned()
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::ConversationAssigned(id) => self.assign_conversation(id),
            Effect::RefreshConversations => self.refresh_quietly().await,
            Effect::Notify(message) => self.emit(ChatEvent::TurnFailed { message }),
        }
    }

    fn assign_conversation(&mut self, id: Uuid) {
        if self.active != Some(id) {
            tracing::debug!("Conversation assigned: {}", id);
            self.active = Some(id);
            self.emit(ChatEvent::ConversationSelected {
                conversation_id: Some(id),
            });
        }
    }

    async fn refresh_quietly(&mut self) {
        if let Err(e) = self.refresh_conversations().await {
            tracing::warn!("Failed to refresh conversations: {}", e);
            self.emit(ChatEvent::Notice {
                message: format!("Could not refresh conversations: {e}"),
            });
        }
    }

    fn abandon_turn(&mut self, error: Error) {
        if self.state.loading {
            self.state.fail_turn();
            self.emit(ChatEvent::TurnFailed {
                message: error.to_string(),
            });
        }
    }

    fn attach(&mut self, mut conn: Box<dyn LiveConnection>) {
        self.close_connection();
        self.generation += 1;
        let generation = self.generation;

        if let Some(mut events) = conn.take_events() {
            let tx = self.connection_tx.clone();
            self.forwarder = Some(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    if tx.send(ConnectionEvent { generation, event }).is_err() {
                        break;
                    }
                }
            }));
        }
        self.connection = Some(conn);
    }

    /// Forget the connection without closing it (it already closed)
    fn drop_connection(&mut self) {
        self.connection = None;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.generation += 1;
    }

    fn close_connection(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.close();
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.generation += 1;
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.close_connection();
    }
}
