//! Markdown rendering for assistant replies

use crate::theme::Theme;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Convert markdown to styled lines wrapped to `width` columns
pub fn render_markdown(text: &str, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut renderer = Renderer::new(theme, width.max(8));
    for event in Parser::new_ext(text, options) {
        renderer.event(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Table {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
    has_header: bool,
}

struct Renderer<'t> {
    theme: &'t Theme,
    width: usize,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// Next ordinal per open list; `None` for bullets
    lists: Vec<Option<u64>>,
    /// Marker for the first line of the current list item
    marker: Option<String>,
    quote_depth: usize,
    code: Option<String>,
    table: Option<Table>,
    link: Option<String>,
}

impl<'t> Renderer<'t> {
    fn new(theme: &'t Theme, width: usize) -> Self {
        Self {
            theme,
            width,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            marker: None,
            quote_depth: 0,
            code: None,
            table: None,
            link: None,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| self.theme.base_style())
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let next = f(self.style());
        self.styles.push(next);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
        } else if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
        } else {
            self.spans.push(Span::styled(text.to_string(), self.style()));
        }
    }

    /// Quote bars and list indentation for continuation lines
    fn indent(&self) -> String {
        let mut indent = "│ ".repeat(self.quote_depth);
        indent.push_str(&"   ".repeat(self.lists.len().saturating_sub(1)));
        indent
    }

    fn flush(&mut self) {
        if self.spans.is_empty() && self.marker.is_none() {
            return;
        }
        let indent = self.indent();
        let marker = self.marker.take();
        let lead_width = indent.width() + marker.as_ref().map_or(0, |m| m.width());
        let spans = std::mem::take(&mut self.spans);

        for (i, row) in wrap_spans(spans, self.width.saturating_sub(lead_width)).into_iter().enumerate() {
            let mut line = vec![Span::styled(indent.clone(), self.theme.dim_style())];
            match (&marker, i) {
                (Some(m), 0) => line.push(Span::styled(m.clone(), self.theme.accent_style())),
                (Some(m), _) => line.push(Span::raw(" ".repeat(m.width()))),
                (None, _) => {}
            }
            line.extend(row);
            self.lines.push(Line::from(line));
        }
    }

    fn blank(&mut self) {
        let last_blank = self.lines.last().is_none_or(|l| l.width() == 0);
        if !last_blank {
            self.lines.push(Line::default());
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.push_str(&code);
                } else {
                    let style = self.theme.code_style().add_modifier(Modifier::BOLD);
                    self.spans.push(Span::styled(code.to_string(), style));
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                self.text(html.trim_end_matches('\n'));
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                let rule = "─".repeat(self.width.saturating_sub(self.indent().width()));
                self.spans.push(Span::styled(rule, self.theme.dim_style()));
                self.flush();
                self.blank();
            }
            Event::TaskListMarker(done) => {
                self.text(if done { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                let theme = self.theme;
                self.push_style(|_| match level {
                    HeadingLevel::H1 => theme
                        .accent_bold()
                        .add_modifier(Modifier::UNDERLINED),
                    HeadingLevel::H2 => theme.accent_bold(),
                    _ => theme.accent_style().add_modifier(Modifier::ITALIC),
                });
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
                let quote = self.theme.quote;
                self.push_style(|s| s.fg(quote).add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.code = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.marker = Some(marker);
            }
            Tag::Emphasis => self.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                let link = self.theme.link;
                self.push_style(|s| s.fg(link).add_modifier(Modifier::UNDERLINED));
                self.link = Some(dest_url.to_string());
            }
            Tag::Table(_) => {
                self.flush();
                self.table = Some(Table::default());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Heading(_) => {
                self.flush();
                self.pop_style();
                self.blank();
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.pop_style();
                if self.quote_depth == 0 {
                    self.blank();
                }
            }
            TagEnd::CodeBlock => {
                let code = self.code.take().unwrap_or_default();
                self.code_block(&code);
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link.take() {
                    let shown = self.spans.last().is_some_and(|s| s.content == url);
                    if !shown && !url.is_empty() && !url.starts_with('#') {
                        self.spans
                            .push(Span::styled(format!(" ({url})"), self.theme.dim_style()));
                    }
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                    if matches!(tag, TagEnd::TableHead) {
                        table.has_header = true;
                    }
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.render_table(table);
                    self.blank();
                }
            }
            _ => {}
        }
    }

    fn code_block(&mut self, code: &str) {
        let style = self.theme.code_style();
        let indent = self.indent();
        let room = self.width.saturating_sub(indent.width() + 2);
        for line in code.lines() {
            let shown = if line.width() > room {
                let (head, _) = split_at_width(line, room.saturating_sub(1));
                format!("{head}…")
            } else {
                line.to_string()
            };
            self.lines.push(Line::from(vec![
                Span::styled(indent.clone(), self.theme.dim_style()),
                Span::styled(format!("  {shown}"), style),
            ]));
        }
    }

    fn render_table(&mut self, table: Table) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let mut widths = vec![0usize; columns];
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.width());
            }
        }
        // Shrink the widest column until the table fits.
        let budget = self.width.saturating_sub(self.indent().width() + 3 * (columns - 1));
        while widths.iter().sum::<usize>() > budget {
            let Some((widest, w)) = widths.iter().copied().enumerate().max_by_key(|(_, w)| *w) else {
                break;
            };
            if w <= 3 {
                break;
            }
            widths[widest] = w - 1;
        }

        let indent = self.indent();
        for (r, row) in table.rows.iter().enumerate() {
            let header = table.has_header && r == 0;
            let style = if header {
                self.theme.base_style().add_modifier(Modifier::BOLD)
            } else {
                self.theme.base_style()
            };
            let mut spans = vec![Span::styled(indent.clone(), self.theme.dim_style())];
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::styled(" │ ", self.theme.dim_style()));
                }
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                spans.push(Span::styled(fit(cell, *width), style));
            }
            self.lines.push(Line::from(spans));
            if header {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                self.lines.push(Line::from(vec![
                    Span::styled(indent.clone(), self.theme.dim_style()),
                    Span::styled(rule.join("─┼─"), self.theme.dim_style()),
                ]));
            }
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Pad or truncate to exactly `width` columns
fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return format!("{text}{}", " ".repeat(width - text.width()));
    }
    let (head, _) = split_at_width(text, width.saturating_sub(1));
    let mut out = format!("{head}…");
    let w = out.width();
    out.push_str(&" ".repeat(width.saturating_sub(w)));
    out
}

/// Split after at most `width` columns, always taking at least one char
fn split_at_width(text: &str, width: usize) -> (String, String) {
    let mut used = 0;
    let mut split = 0;
    for (i, c) in text.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > width && i > 0 {
            break;
        }
        used += w;
        split = i + c.len_utf8();
    }
    (text[..split].to_string(), text[split..].to_string())
}

/// Word-wrap styled spans into rows of at most `width` columns
fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Vec<Span<'static>>> {
    let width = width.max(1);
    let mut rows: Vec<Vec<Span<'static>>> = vec![Vec::new()];
    let mut column = 0;

    for span in spans {
        let style = span.style;
        for word in span.content.split_inclusive(' ') {
            let visible = word.trim_end_matches(' ').width();
            if column > 0 && column + visible > width {
                rows.push(Vec::new());
                column = 0;
            }
            let mut piece = if column == 0 {
                word.trim_start().to_string()
            } else {
                word.to_string()
            };
            if piece.is_empty() {
                continue;
            }
            while column == 0 && piece.trim_end().width() > width {
                let (head, tail) = split_at_width(&piece, width);
                if let Some(row) = rows.last_mut() {
                    row.push(Span::styled(head, style));
                }
                rows.push(Vec::new());
                piece = tail;
            }
            column += piece.width();
            if let Some(row) = rows.last_mut() {
                row.push(Span::styled(piece, style));
            }
        }
    }

    if rows.len() > 1 && rows.last().is_some_and(Vec::is_empty) {
        rows.pop();
    }
    rows
}
