//! Key bindings

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press means to the chat screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Char(char),
    Submit,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    /// Move focus between the sidebar and the input
    Tab,
    Escape,
    /// Ctrl+C
    Interrupt,
    /// Ctrl+Q
    Quit,
    /// Ctrl+U
    ClearLine,
    /// Ctrl+W
    DeleteWord,
    Paste(String),
    /// Ctrl+N
    NewChat,
    /// Ctrl+X: delete the highlighted conversation
    DeleteConversation,
    /// Ctrl+T: switch between pt and en
    ToggleLanguage,
    /// Ctrl+B
    ToggleSidebar,
    /// Ctrl+R: reload the conversation list
    Refresh,
    Unknown,
}

/// Convert a crossterm key event to an action
pub fn key_to_action(event: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Action::Interrupt,
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('u') => Action::ClearLine,
            KeyCode::Char('w') => Action::DeleteWord,
            KeyCode::Char('n') => Action::NewChat,
            KeyCode::Char('x') => Action::DeleteConversation,
            KeyCode::Char('t') => Action::ToggleLanguage,
            KeyCode::Char('b') => Action::ToggleSidebar,
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('a') => Action::Home,
            KeyCode::Char('e') => Action::End,
            _ => Action::Unknown,
        };
    }

    if modifiers.contains(KeyModifiers::ALT) {
        return Action::Unknown;
    }

    match code {
        KeyCode::Char(c) => Action::Char(c),
        KeyCode::Enter => Action::Submit,
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Up => Action::Up,
        KeyCode::Down => Action::Down,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Tab | KeyCode::BackTab => Action::Tab,
        KeyCode::Esc => Action::Escape,
        _ => Action::Unknown,
    }
}

/// Convert a crossterm event to an action. Key releases are ignored.
pub fn event_to_action(event: Event) -> Option<Action> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => Some(key_to_action(key)),
        Event::Paste(text) => Some(Action::Paste(text)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_chat_shortcuts() {
        assert_eq!(key_to_action(ctrl('n')), Action::NewChat);
        assert_eq!(key_to_action(ctrl('x')), Action::DeleteConversation);
        assert_eq!(key_to_action(ctrl('t')), Action::ToggleLanguage);
        assert_eq!(key_to_action(ctrl('c')), Action::Interrupt);
    }

    #[test]
    fn test_plain_keys() {
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(key_to_action(enter), Action::Submit);
        let upper = KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(key_to_action(upper), Action::Char('A'));
        let backtab = KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT);
        assert_eq!(key_to_action(backtab), Action::Tab);
    }

    #[test]
    fn test_paste_event() {
        assert_eq!(
            event_to_action(Event::Paste("hi".into())),
            Some(Action::Paste("hi".into()))
        );
        assert_eq!(event_to_action(Event::FocusGained), None);
    }
}
