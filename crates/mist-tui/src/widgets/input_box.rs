//! Message composer

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Single-line composer with horizontal scrolling
#[derive(Debug, Default)]
pub struct InputBox {
    content: String,
    /// Cursor position in chars
    cursor: usize,
    /// First visible column
    scroll: usize,
    placeholder: String,
    focused: bool,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn set_placeholder(&mut self, placeholder: impl Into<String>) {
        self.placeholder = placeholder.into();
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Take the text out, leaving the box empty
    pub fn take(&mut self) -> String {
        let text = std::mem::take(&mut self.content);
        self.cursor = 0;
        self.scroll = 0;
        text
    }

    pub fn clear(&mut self) {
        self.take();
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Byte offset of a char index
    fn byte_at(&self, index: usize) -> usize {
        self.content
            .char_indices()
            .nth(index)
            .map_or(self.content.len(), |(i, _)| i)
    }

    fn column_of(&self, index: usize) -> usize {
        self.content
            .chars()
            .take(index)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    fn insert(&mut self, c: char) {
        let at = self.byte_at(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    fn remove_range(&mut self, from: usize, to: usize) {
        let (start, end) = (self.byte_at(from), self.byte_at(to));
        self.content.replace_range(start..end, "");
    }

    /// Apply an editing action. Returns whether anything changed.
    pub fn handle_action(&mut self, action: &Action, width: u16) -> bool {
        let len = self.char_count();
        let changed = match action {
            Action::Char(c) => {
                self.insert(*c);
                true
            }
            Action::Paste(text) => {
                // Single line: newlines collapse into one space.
                for c in text.chars() {
                    if c == '\n' || c == '\r' {
                        if self.cursor > 0 && !self.content.ends_with(' ') {
                            self.insert(' ');
                        }
                    } else {
                        self.insert(c);
                    }
                }
                !text.is_empty()
            }
            Action::Backspace if self.cursor > 0 => {
                self.remove_range(self.cursor - 1, self.cursor);
                self.cursor -= 1;
                true
            }
            Action::Delete if self.cursor < len => {
                self.remove_range(self.cursor, self.cursor + 1);
                true
            }
            Action::Left if self.cursor > 0 => {
                self.cursor -= 1;
                true
            }
            Action::Right if self.cursor < len => {
                self.cursor += 1;
                true
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = len;
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord if self.cursor > 0 => {
                let chars: Vec<char> = self.content.chars().collect();
                let mut start = self.cursor;
                while start > 0 && chars[start - 1].is_whitespace() {
                    start -= 1;
                }
                while start > 0 && !chars[start - 1].is_whitespace() {
                    start -= 1;
                }
                self.remove_range(start, self.cursor);
                self.cursor = start;
                true
            }
            _ => false,
        };
        if changed {
            self.follow_cursor(width as usize);
        }
        changed
    }

    fn follow_cursor(&mut self, width: usize) {
        let visible = width.saturating_sub(2).max(1);
        let column = self.column_of(self.cursor);
        if column < self.scroll {
            self.scroll = column;
        } else if column >= self.scroll + visible {
            self.scroll = column + 1 - visible;
        }
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme, title: &str) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .border_style(theme.pane_border(self.focused));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        if self.content.is_empty() {
            Paragraph::new(self.placeholder.as_str())
                .style(theme.dim_style())
                .render(inner, buf);
        } else {
            let mut column = 0;
            let mut visible = String::new();
            for c in self.content.chars() {
                let w = c.width().unwrap_or(0);
                if column >= self.scroll {
                    if column + w > self.scroll + inner.width as usize {
                        break;
                    }
                    visible.push(c);
                }
                column += w;
            }
            Paragraph::new(visible)
                .style(theme.base_style())
                .render(inner, buf);
        }

        if self.focused {
            let x = self.column_of(self.cursor).saturating_sub(self.scroll);
            if x < inner.width as usize {
                if let Some(cell) = buf.cell_mut((inner.x + x as u16, inner.y)) {
                    cell.set_style(Style::default().bg(theme.accent));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> InputBox {
        let mut input = InputBox::new();
        for c in text.chars() {
            input.handle_action(&Action::Char(c), 40);
        }
        input
    }

    #[test]
    fn test_typing_and_take() {
        let mut input = typed("olá mundo");
        assert_eq!(input.content(), "olá mundo");
        assert_eq!(input.take(), "olá mundo");
        assert!(input.is_blank());
    }

    #[test]
    fn test_edit_in_middle_of_multibyte_text() {
        let mut input = typed("ação");
        input.handle_action(&Action::Left, 40);
        input.handle_action(&Action::Backspace, 40);
        assert_eq!(input.content(), "aço");
        input.handle_action(&Action::Home, 40);
        input.handle_action(&Action::Delete, 40);
        assert_eq!(input.content(), "ço");
    }

    #[test]
    fn test_delete_word() {
        let mut input = typed("hello brave  ");
        input.handle_action(&Action::DeleteWord, 40);
        assert_eq!(input.content(), "hello ");
        input.handle_action(&Action::DeleteWord, 40);
        assert_eq!(input.content(), "");
        assert!(!input.handle_action(&Action::DeleteWord, 40));
    }

    #[test]
    fn test_paste_collapses_newlines() {
        let mut input = InputBox::new();
        input.handle_action(&Action::Paste("line one\r\nline two".into()), 40);
        assert_eq!(input.content(), "line one line two");
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let mut input = InputBox::new();
        for c in "abcdefghijklmnop".chars() {
            input.handle_action(&Action::Char(c), 10);
        }
        assert!(input.scroll > 0);
        input.handle_action(&Action::Home, 10);
        assert_eq!(input.scroll, 0);
    }
}
