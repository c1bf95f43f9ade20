//! mist-api: client for the misteriosAI chat service
//!
//! This crate provides the wire types, an HTTP client for the auth and chat
//! endpoints, and the streaming WebSocket connection used during a turn.

pub mod client;
pub mod error;
pub mod socket;
pub mod stream;
pub mod types;

pub use client::{ApiClient, AuthHandler, NoAuth};
pub use error::{Error, Result};
pub use socket::{ChatSocket, ConnectionState};
pub use stream::{ClientFrame, ServerEvent, SocketEvent, SocketEventStream};
pub use types::*;
