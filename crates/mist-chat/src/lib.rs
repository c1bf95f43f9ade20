//! mist-chat: chat session runtime
//!
//! This crate turns the raw API into a chat view: the session and language
//! stores, the conversation list cache, the reducer that assembles streamed
//! replies, and the controller that picks a transport for each message.

pub mod backend;
pub mod controller;
pub mod conversations;
pub mod emotion;
pub mod error;
pub mod locale;
pub mod message;
pub mod reducer;
pub mod session;
pub mod storage;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ChatBackend, LiveConnection, RemoteBackend};
pub use controller::{ChatController, ChatEvent, ConnectionEvent, PendingSend, SendOutcome, SendStart};
pub use conversations::{ConversationList, RecencyLabel, Selection};
pub use emotion::{Emotion, extract_emotion};
pub use error::{Error, Result};
pub use locale::{Language, LocaleStore};
pub use message::{ChatMessage, Role};
pub use reducer::{ChatState, Effect, ToolStatus, reduce};
pub use session::{Session, SessionStore, validate_registration};
pub use storage::{ClientStorage, MemoryStorage};
pub use transport::{Delivery, ReadinessConfig, TransportChooser};
