//! The seam between the chat runtime and the remote service

use std::sync::Arc;

use async_trait::async_trait;
use mist_api::{
    ApiClient, ChatReply, ChatSocket, ClientFrame, ConnectionState, ConversationSummary,
    ConversationTarget, SocketEventStream, StoredMessage,
};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    session::SessionStore,
};

/// A bidirectional streaming connection bound to one conversation
pub trait LiveConnection: Send {
    fn state(&self) -> ConnectionState;

    /// Send a user message; fails unless open
    fn send(&mut self, message: &str) -> Result<()>;

    /// Take the inbound events. Returns `None` after the first call.
    fn take_events(&mut self) -> Option<SocketEventStream>;

    fn close(&mut self);
}

impl LiveConnection for ChatSocket {
    fn state(&self) -> ConnectionState {
        ChatSocket::state(self)
    }

    fn send(&mut self, message: &str) -> Result<()> {
        ChatSocket::send(self, ClientFrame::message(message)).map_err(Error::from)
    }

    fn take_events(&mut self) -> Option<SocketEventStream> {
        ChatSocket::take_events(self)
    }

    fn close(&mut self) {
        ChatSocket::close(self)
    }
}

/// Everything the chat runtime needs from the service
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start opening a streaming connection. Returns before it is open.
    fn open(&self, target: ConversationTarget) -> Result<Box<dyn LiveConnection>>;

    /// One-shot request/response turn
    async fn send_once(&self, message: &str, conversation_id: Option<Uuid>) -> Result<ChatReply>;

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    async fn history(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>>;

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()>;
}

/// [`ChatBackend`] over the real HTTP and WebSocket endpoints
pub struct RemoteBackend {
    api: ApiClient,
    session: Arc<SessionStore>,
}

impl RemoteBackend {
    pub fn new(api: ApiClient, session: Arc<SessionStore>) -> Self {
        Self { api, session }
    }
}

#[async_trait]
impl ChatBackend for RemoteBackend {
    fn open(&self, target: ConversationTarget) -> Result<Box<dyn LiveConnection>> {
        let token = self.session.token().ok_or(Error::NotAuthenticated)?;
        let url = self.api.socket_url(&target, &token)?;
        tracing::debug!("Opening chat socket for conversation {}", target);
        Ok(Box::new(ChatSocket::connect(url)))
    }

    async fn send_once(&self, message: &str, conversation_id: Option<Uuid>) -> Result<ChatReply> {
        Ok(self.api.send_message(message, conversation_id).await?)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        Ok(self.api.list_conversations().await?)
    }

    async fn history(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>> {
        Ok(self.api.conversation_messages(conversation_id).await?)
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()> {
        let response = self.api.delete_conversation(conversation_id).await?;
        if !response.success {
            return Err(Error::Api(mist_api::Error::api(
                200,
                Some(response.message),
            )));
        }
        Ok(())
    }
}
