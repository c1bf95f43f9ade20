//! Conversation sidebar and the delete confirmation popup

use crate::theme::Theme;
use chrono::{DateTime, Utc};
use mist_chat::conversations::display_title;
use mist_chat::{ConversationList, RecencyLabel};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, HighlightSpacing, List, ListItem, ListState, Paragraph,
        StatefulWidget, Widget, Wrap,
    },
};
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

/// Cursor and visibility of the sidebar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarState {
    pub cursor: usize,
    pub visible: bool,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self {
            cursor: 0,
            visible: true,
        }
    }
}

impl SidebarState {
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn up(&mut self, item_count: usize) {
        if item_count == 0 {
            return;
        }
        self.cursor = if self.cursor > 0 {
            self.cursor - 1
        } else {
            item_count - 1
        };
    }

    pub fn down(&mut self, item_count: usize) {
        if item_count == 0 {
            return;
        }
        self.cursor = if self.cursor + 1 < item_count {
            self.cursor + 1
        } else {
            0
        };
    }

    /// Keep the cursor inside the list after it shrinks
    pub fn clamp(&mut self, item_count: usize) {
        self.cursor = self.cursor.min(item_count.saturating_sub(1));
    }

    /// Put the cursor on the active conversation
    pub fn follow(&mut self, list: &ConversationList, active: Option<Uuid>) {
        if let Some(index) = active.and_then(|id| list.position(id)) {
            self.cursor = index;
        } else {
            self.clamp(list.len());
        }
    }
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if out.width() + c.to_string().width() + 1 > width {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

/// List of conversations, most recent first
pub struct Sidebar<'a> {
    list: &'a ConversationList,
    active: Option<Uuid>,
    state: SidebarState,
    focused: bool,
    now: DateTime<Utc>,
    theme: &'a Theme,
}

impl<'a> Sidebar<'a> {
    pub fn new(list: &'a ConversationList, state: SidebarState, theme: &'a Theme) -> Self {
        Self {
            list,
            active: None,
            state,
            focused: false,
            now: Utc::now(),
            theme,
        }
    }

    pub fn active(mut self, active: Option<Uuid>) -> Self {
        self.active = active;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Reference time for the recency labels
    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

impl Widget for Sidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Conversations ")
            .title_style(self.theme.accent_bold())
            .borders(Borders::ALL)
            .border_style(self.theme.pane_border(self.focused));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width < 4 || inner.height == 0 {
            return;
        }

        if self.list.is_empty() {
            Paragraph::new("No conversations yet")
                .style(self.theme.dim_style())
                .wrap(Wrap { trim: true })
                .render(inner, buf);
            return;
        }

        let title_width = inner.width.saturating_sub(2) as usize;
        let items: Vec<ListItem> = self
            .list
            .items()
            .iter()
            .map(|summary| {
                let is_active = self.active == Some(summary.id);
                let marker = if is_active { "● " } else { "  " };
                let title_style = if is_active {
                    self.theme.accent_bold()
                } else {
                    self.theme.base_style()
                };
                let label = RecencyLabel::for_summary(summary, self.now);
                ListItem::new(vec![
                    Line::from(vec![
                        Span::styled(marker, self.theme.accent_style()),
                        Span::styled(
                            truncate_to_width(display_title(summary), title_width),
                            title_style,
                        ),
                    ]),
                    Line::from(Span::styled(format!("  {label}"), self.theme.dim_style())),
                ])
            })
            .collect();

        let mut list = List::new(items).highlight_spacing(HighlightSpacing::Never);
        if self.focused {
            list = list.highlight_style(self.theme.selected_style());
        }

        let mut state = ListState::default();
        state.select(Some(self.state.cursor.min(self.list.len() - 1)));
        StatefulWidget::render(list, inner, buf, &mut state);
    }
}

/// Centered yes/no popup
pub struct ConfirmDialog<'a> {
    title: &'a str,
    message: &'a str,
    theme: &'a Theme,
}

impl<'a> ConfirmDialog<'a> {
    pub fn new(title: &'a str, message: &'a str, theme: &'a Theme) -> Self {
        Self {
            title,
            message,
            theme,
        }
    }
}

impl Widget for ConfirmDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = (self.message.width() as u16 + 4).clamp(24, 60).min(area.width);
        let height = 5.min(area.height);
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        let popup = Rect::new(x, y, width, height);

        Clear.render(popup, buf);
        let block = Block::default()
            .title(format!(" {} ", self.title))
            .title_style(self.theme.warning_style())
            .borders(Borders::ALL)
            .border_style(self.theme.warning_style());
        Paragraph::new(vec![
            Line::from(Span::styled(self.message, self.theme.base_style())),
            Line::default(),
            Line::from(Span::styled("[y] yes   [n] no", self.theme.dim_style())),
        ])
        .block(block)
        .wrap(Wrap { trim: true })
        .render(popup, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mist_api::ConversationSummary;

    fn summary(title: Option<&str>, at: DateTime<Utc>) -> ConversationSummary {
        ConversationSummary {
            id: Uuid::new_v4(),
            title: title.map(String::from),
            created_at: at,
            updated_at: None,
        }
    }

    fn rows(buf: &Buffer, area: Rect) -> Vec<String> {
        (area.y..area.bottom())
            .map(|y| {
                (area.x..area.right())
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn test_cursor_wraps() {
        let mut state = SidebarState::default();
        state.up(3);
        assert_eq!(state.cursor, 2);
        state.down(3);
        assert_eq!(state.cursor, 0);
        state.down(0);
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut state = SidebarState {
            cursor: 4,
            visible: true,
        };
        state.clamp(2);
        assert_eq!(state.cursor, 1);
        state.clamp(0);
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn test_follow_active() {
        let now = Utc::now();
        let mut list = ConversationList::default();
        let older = summary(Some("older"), now - Duration::days(2));
        let newer = summary(Some("newer"), now);
        let older_id = older.id;
        list.replace(vec![older, newer]);

        let mut state = SidebarState::default();
        state.follow(&list, Some(older_id));
        assert_eq!(state.cursor, 1);
    }

    #[test]
    fn test_renders_titles_and_labels() {
        let now = Utc::now();
        let mut list = ConversationList::default();
        let today = summary(Some("Weather chat"), now);
        let active = today.id;
        list.replace(vec![today, summary(None, now - Duration::days(1))]);

        let theme = Theme::default();
        let area = Rect::new(0, 0, 28, 8);
        let mut buf = Buffer::empty(area);
        Sidebar::new(&list, SidebarState::default(), &theme)
            .active(Some(active))
            .now(now)
            .render(area, &mut buf);

        let text = rows(&buf, area);
        assert!(text[1].contains("● Weather chat"), "{text:?}");
        assert!(text[2].contains("Today"), "{text:?}");
        assert!(text[3].contains("New conversation"), "{text:?}");
        assert!(text[4].contains("Yesterday"), "{text:?}");
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("a long title", 6), "a lon…");
    }
}
