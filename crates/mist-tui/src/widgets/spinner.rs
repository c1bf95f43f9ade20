//! Activity indicators

use crate::theme::Theme;
use mist_chat::ToolStatus;
use ratatui::{buffer::Buffer, layout::Rect, text::Span, widgets::Widget};
use std::time::{Duration, Instant};

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_DURATION: Duration = Duration::from_millis(80);

/// Frame to show at this instant for an animation started at `start`
pub fn spinner_frame(start: Instant) -> &'static str {
    frame_at(start.elapsed())
}

fn frame_at(elapsed: Duration) -> &'static str {
    let index = (elapsed.as_millis() / FRAME_DURATION.as_millis()) as usize;
    SPINNER_FRAMES[index % SPINNER_FRAMES.len()]
}

/// Animated spinner with a label
pub struct Spinner<'a> {
    label: &'a str,
    theme: &'a Theme,
    start_time: Instant,
}

impl<'a> Spinner<'a> {
    pub fn new(label: &'a str, theme: &'a Theme) -> Self {
        Self {
            label,
            theme,
            start_time: Instant::now(),
        }
    }

    /// Share one start time across redraws so the animation advances
    pub fn with_start_time(mut self, start: Instant) -> Self {
        self.start_time = start;
        self
    }
}

impl Widget for Spinner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 3 {
            return;
        }
        let text = format!("{} {}", spinner_frame(self.start_time), self.label);
        let span = Span::styled(text, self.theme.warning_style());
        buf.set_span(area.x, area.y, &span, area.width);
    }
}

/// Text for the line above the composer, if anything is happening
pub fn tool_status_text(status: Option<&ToolStatus>, loading: bool) -> Option<String> {
    match status {
        Some(tool) if tool.communicating => Some(format!("Calling {}…", tool.name)),
        Some(tool) => match tool.content.as_deref().filter(|c| !c.is_empty()) {
            Some(content) => Some(format!("{}: {}", tool.name, first_line(content))),
            None if loading => Some(format!("{} finished", tool.name)),
            None => None,
        },
        None if loading => Some("thinking".to_string()),
        None => None,
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

/// Single-line tool activity indicator
pub struct ToolStatusLine<'a> {
    status: Option<&'a ToolStatus>,
    loading: bool,
    theme: &'a Theme,
    start_time: Instant,
}

impl<'a> ToolStatusLine<'a> {
    pub fn new(status: Option<&'a ToolStatus>, loading: bool, theme: &'a Theme) -> Self {
        Self {
            status,
            loading,
            theme,
            start_time: Instant::now(),
        }
    }

    pub fn with_start_time(mut self, start: Instant) -> Self {
        self.start_time = start;
        self
    }
}

impl Widget for ToolStatusLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(text) = tool_status_text(self.status, self.loading) else {
            return;
        };
        if self.loading {
            Spinner::new(&text, self.theme)
                .with_start_time(self.start_time)
                .render(area, buf);
        } else {
            let span = Span::styled(format!("⚙ {text}"), self.theme.dim_style());
            buf.set_span(area.x, area.y, &span, area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, content: Option<&str>, communicating: bool) -> ToolStatus {
        ToolStatus {
            name: name.into(),
            content: content.map(String::from),
            calling: true,
            communicating,
        }
    }

    #[test]
    fn test_frames_cycle() {
        assert_eq!(frame_at(Duration::ZERO), "⠋");
        assert_eq!(frame_at(Duration::from_millis(85)), "⠙");
        assert_eq!(frame_at(FRAME_DURATION * SPINNER_FRAMES.len() as u32), "⠋");
    }

    #[test]
    fn test_status_text() {
        let calling = tool("weather", None, true);
        assert_eq!(
            tool_status_text(Some(&calling), true).as_deref(),
            Some("Calling weather…")
        );

        let done = tool("weather", Some("Sunny, 25C\nmore"), false);
        assert_eq!(
            tool_status_text(Some(&done), true).as_deref(),
            Some("weather: Sunny, 25C")
        );

        assert_eq!(tool_status_text(None, true).as_deref(), Some("thinking"));
        assert_eq!(tool_status_text(None, false), None);
    }

    #[test]
    fn test_renders_spinner_while_loading() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 30, 1);
        let mut buf = Buffer::empty(area);
        ToolStatusLine::new(None, true, &theme).render(area, &mut buf);
        let row: String = (0..area.width)
            .map(|x| buf[(x, 0)].symbol().to_string())
            .collect();
        assert!(row.contains("thinking"), "{row:?}");
    }
}
