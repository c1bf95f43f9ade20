//! Chat transcript

use crate::theme::{Theme, emotion_badge};
use crate::widgets::markdown::render_markdown;
use crate::widgets::spinner::spinner_frame;
use mist_chat::{ChatMessage, ChatState, Role};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use std::time::Instant;

pub const ASSISTANT_NAME: &str = "misteriosAI";

fn indent(line: Line<'static>) -> Line<'static> {
    let mut spans = vec![Span::raw("  ")];
    spans.extend(line.spans);
    Line::from(spans)
}

fn message_header(msg: &ChatMessage, theme: &Theme) -> Line<'static> {
    match (msg.role, msg.tool_name.as_deref()) {
        (Role::User, _) => Line::from(Span::styled("▶ You", theme.accent_bold())),
        (Role::Assistant, Some(tool)) => Line::from(Span::styled(
            format!("⚙ {tool}"),
            theme.dim_style().add_modifier(Modifier::BOLD),
        )),
        (Role::Assistant, None) => {
            let (emotion, _) = msg.display();
            let mut spans = vec![
                Span::styled(format!("◀ {ASSISTANT_NAME} "), theme.assistant_bold()),
                Span::styled(emotion_badge(emotion), theme.emotion_style(emotion)),
            ];
            if !msg.complete {
                spans.push(Span::styled(" ▌", theme.assistant_bold()));
            }
            Line::from(spans)
        }
    }
}

/// Lines for one message, including the trailing separator
pub fn message_lines(
    msg: &ChatMessage,
    theme: &Theme,
    width: usize,
    spinner_start: Instant,
) -> Vec<Line<'static>> {
    let mut lines = vec![message_header(msg, theme)];
    let content_width = width.saturating_sub(2).max(1);

    match msg.role {
        Role::User => {
            for row in textwrap::wrap(&msg.content, content_width) {
                lines.push(Line::from(Span::styled(
                    format!("  {row}"),
                    theme.base_style(),
                )));
            }
        }
        Role::Assistant => {
            let (_, text) = msg.display();
            if text.trim().is_empty() && !msg.complete {
                lines.push(Line::from(Span::styled(
                    format!("  {} thinking...", spinner_frame(spinner_start)),
                    theme.warning_style(),
                )));
            } else if msg.tool_name.is_some() {
                for row in textwrap::wrap(&text, content_width) {
                    lines.push(Line::from(Span::styled(
                        format!("  {row}"),
                        theme.dim_style(),
                    )));
                }
            } else {
                lines.extend(
                    render_markdown(&text, theme, content_width)
                        .into_iter()
                        .map(indent),
                );
            }
        }
    }

    lines.push(Line::default());
    lines
}

/// Every line of the transcript at the given width
pub fn transcript_lines(
    state: &ChatState,
    theme: &Theme,
    width: usize,
    spinner_start: Instant,
) -> Vec<Line<'static>> {
    state
        .messages
        .iter()
        .flat_map(|msg| message_lines(msg, theme, width, spinner_start))
        .collect()
}

pub fn total_height(state: &ChatState, theme: &Theme, width: usize) -> usize {
    transcript_lines(state, theme, width, Instant::now()).len()
}

/// Transcript pinned to the bottom, scrolled back by `scroll_back` lines
pub struct MessageList<'a> {
    state: &'a ChatState,
    theme: &'a Theme,
    scroll_back: usize,
    spinner_start: Instant,
    empty_hint: &'a str,
}

impl<'a> MessageList<'a> {
    pub fn new(state: &'a ChatState, theme: &'a Theme) -> Self {
        Self {
            state,
            theme,
            scroll_back: 0,
            spinner_start: Instant::now(),
            empty_hint: "",
        }
    }

    pub fn scroll_back(mut self, lines: usize) -> Self {
        self.scroll_back = lines;
        self
    }

    pub fn spinner_start(mut self, start: Instant) -> Self {
        self.spinner_start = start;
        self
    }

    /// Shown when there are no messages yet
    pub fn empty_hint(mut self, hint: &'a str) -> Self {
        self.empty_hint = hint;
        self
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        if self.state.messages.is_empty() {
            Paragraph::new(self.empty_hint)
                .style(self.theme.dim_style())
                .centered()
                .render(area, buf);
            return;
        }

        let lines = transcript_lines(self.state, self.theme, area.width as usize, self.spinner_start);
        let height = area.height as usize;
        let max_back = lines.len().saturating_sub(height);
        let end = lines.len() - self.scroll_back.min(max_back);
        let start = end.saturating_sub(height);

        let visible: Vec<Line<'static>> = lines.into_iter().skip(start).take(end - start).collect();
        Paragraph::new(visible).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_assistant_header_shows_emotion_and_strips_tag() {
        let theme = Theme::default();
        let msg = ChatMessage::assistant("<emotion>happy</emotion>Hello!");
        let lines = text(&message_lines(&msg, &theme, 40, Instant::now()));
        assert_eq!(lines[0], format!("◀ {ASSISTANT_NAME} (^‿^)"));
        assert_eq!(lines[1], "  Hello!");
        assert_eq!(lines.last().map(String::as_str), Some(""));
    }

    #[test]
    fn test_streaming_placeholder() {
        let theme = Theme::default();
        let msg = ChatMessage::streaming("");
        let lines = text(&message_lines(&msg, &theme, 40, Instant::now()));
        assert!(lines[0].ends_with('▌'));
        assert!(lines[1].ends_with("thinking..."));
    }

    #[test]
    fn test_user_message_wraps() {
        let theme = Theme::default();
        let msg = ChatMessage::user("one two three four five six seven");
        let lines = text(&message_lines(&msg, &theme, 12, Instant::now()));
        assert_eq!(lines[0], "▶ You");
        assert!(lines.len() > 3);
        assert!(lines.iter().skip(1).all(|l| l.chars().count() <= 12));
    }

    #[test]
    fn test_tool_row_header() {
        let theme = Theme::default();
        let mut msg = ChatMessage::assistant("Sunny");
        msg.tool_name = Some("weather".into());
        let lines = text(&message_lines(&msg, &theme, 40, Instant::now()));
        assert_eq!(lines[0], "⚙ weather");
        assert_eq!(lines[1], "  Sunny");
    }

    #[test]
    fn test_render_pins_to_bottom() {
        let theme = Theme::default();
        let mut state = ChatState::default();
        for i in 0..10 {
            state.messages.push(ChatMessage::user(format!("message {i}")));
        }
        let area = Rect::new(0, 0, 30, 3);
        let mut buf = Buffer::empty(area);
        MessageList::new(&state, &theme).render(area, &mut buf);
        let row: String = (0..area.width)
            .map(|x| buf[(x, 1)].symbol().to_string())
            .collect();
        assert_eq!(row.trim_end(), "  message 9");
        assert_eq!(total_height(&state, &theme, 30), 30);
    }
}
