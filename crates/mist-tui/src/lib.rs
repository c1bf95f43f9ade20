//! mist-tui: terminal widgets for the mist chat client
//!
//! Rendering only. State lives in `mist-chat`; the event loop lives in the
//! binary.

pub mod input;
pub mod theme;
pub mod widgets;

pub use input::{Action, event_to_action, key_to_action};
pub use theme::Theme;
