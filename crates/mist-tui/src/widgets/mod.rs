//! Widgets for the chat screen

pub mod input_box;
pub mod markdown;
pub mod message_list;
pub mod sidebar;
pub mod spinner;

pub use input_box::InputBox;
pub use markdown::render_markdown;
pub use message_list::MessageList;
pub use sidebar::{ConfirmDialog, Sidebar, SidebarState};
pub use spinner::{Spinner, ToolStatusLine};
