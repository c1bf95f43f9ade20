//! TUI implementation for mist

use crossterm::event::EventStream;
use futures::StreamExt;
use mist_chat::{ChatController, ChatEvent, PendingSend, SendOutcome, SendStart};
use mist_tui::{
    Action, Theme,
    widgets::{
        ConfirmDialog, InputBox, MessageList, Sidebar, SidebarState, ToolStatusLine,
        message_list,
    },
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use std::time::Instant;
use uuid::Uuid;

use crate::Services;
use crate::commands::{CommandResult, execute_command};

const SIDEBAR_WIDTH: u16 = 32;
/// Below this width the sidebar is hidden regardless of the toggle
const MIN_WIDTH_FOR_SIDEBAR: u16 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Input,
    Sidebar,
}

enum Flow {
    Continue,
    Quit,
}

/// TUI application state
struct TuiState<'a> {
    services: &'a Services,
    controller: ChatController,
    /// Send waiting on a connection or the fallback request
    pending: Option<PendingSend>,
    input: InputBox,
    sidebar: SidebarState,
    focus: Focus,
    /// Lines scrolled up from the bottom of the transcript
    scroll_back: usize,
    /// Size of the transcript area at the last draw
    transcript_area: Rect,
    /// Last error or notice, shown in the status bar
    notice: Option<String>,
    /// Conversation waiting for a yes/no before deletion
    confirm_delete: Option<(Uuid, String)>,
    /// Text shown in a popup until a key is pressed
    popup: Option<String>,
    theme: Theme,
    spinner_start: Instant,
}

impl<'a> TuiState<'a> {
    fn new(services: &'a Services, controller: ChatController) -> Self {
        let mut input = InputBox::new().with_placeholder("Type a message... (/help for commands)");
        input.set_focused(true);
        Self {
            services,
            controller,
            pending: None,
            input,
            sidebar: SidebarState::default(),
            focus: Focus::Input,
            scroll_back: 0,
            transcript_area: Rect::default(),
            notice: None,
            confirm_delete: None,
            popup: None,
            theme: Theme::default(),
            spinner_start: Instant::now(),
        }
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.input.set_focused(focus == Focus::Input);
        if focus == Focus::Sidebar {
            self.sidebar
                .follow(self.controller.conversations(), self.controller.active());
        }
    }

    fn report<E: std::fmt::Display>(&mut self, context: &str, error: E) {
        tracing::warn!("{}: {}", context, error);
        self.notice = Some(format!("{context}: {error}"));
    }

    fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::TurnStarted { .. } => {
                self.notice = None;
                self.scroll_back = 0;
                self.spinner_start = Instant::now();
            }
            ChatEvent::TurnFailed { message } | ChatEvent::Notice { message } => {
                self.notice = Some(message);
            }
            ChatEvent::ConversationSelected { .. } | ChatEvent::HistoryLoaded { .. } => {
                self.scroll_back = 0;
                self.sidebar
                    .follow(self.controller.conversations(), self.controller.active());
            }
            ChatEvent::ConversationsRefreshed { count } => self.sidebar.clamp(count),
            ChatEvent::ContentDelta { .. }
            | ChatEvent::ToolActivity { .. }
            | ChatEvent::TurnCompleted { .. } => {}
        }
    }

    async fn open_conversation(&mut self, id: Uuid) {
        if let Err(e) = self.controller.select_conversation(id).await {
            self.report("Could not load conversation", e);
        }
    }

    async fn refresh(&mut self) {
        match self.controller.refresh_conversations().await {
            Ok(()) => self.notice = None,
            Err(e) => self.report("Could not load conversations", e),
        }
    }

    fn ask_delete(&mut self, index: Option<usize>) {
        let summary = match index {
            Some(i) => self.controller.conversations().get(i),
            None => self
                .controller
                .active()
                .and_then(|id| self.controller.conversations().position(id))
                .and_then(|i| self.controller.conversations().get(i)),
        };
        match summary {
            Some(summary) => {
                let title = mist_chat::conversations::display_title(summary).to_string();
                self.confirm_delete = Some((summary.id, title));
            }
            None => self.notice = Some("No conversation to delete".to_string()),
        }
    }

    async fn confirm(&mut self, action: &Action) {
        let Some((id, title)) = self.confirm_delete.take() else {
            return;
        };
        let yes = matches!(action, Action::Char('y' | 'Y') | Action::Submit);
        if !yes {
            return;
        }
        match self.controller.delete_conversation(id).await {
            Ok(()) => self.notice = Some(format!("Deleted \"{title}\"")),
            Err(e) => self.report("Could not delete conversation", e),
        }
    }

    fn toggle_language(&mut self, choice: Option<mist_chat::Language>) {
        let locale = &self.services.locale;
        let result = match choice {
            Some(language) => locale.set_language(language).map(|_| language),
            None => locale.toggle(),
        };
        match result {
            Ok(language) => self.notice = Some(format!("Language: {language}")),
            Err(e) => self.report("Could not save language", e),
        }
    }

    fn submit(&mut self) {
        if self.input.is_blank() {
            return;
        }
        if self.controller.is_loading() || self.pending.is_some() {
            self.notice = Some("Wait for the current reply to finish".to_string());
            return;
        }
        let text = self.input.take();
        match self.controller.begin_send(&text) {
            SendStart::Pending(pending) => self.pending = Some(pending),
            SendStart::Sent | SendStart::Ignored => {}
        }
    }

    async fn run_slash_command(&mut self, result: CommandResult) -> Flow {
        match result {
            CommandResult::Message(msg) => self.popup = Some(msg),
            CommandResult::NewChat => self.controller.new_chat(),
            CommandResult::List => {
                self.sidebar.visible = true;
                self.refresh().await;
                self.set_focus(Focus::Sidebar);
            }
            CommandResult::Open(index) => {
                match self.controller.conversations().get(index).map(|c| c.id) {
                    Some(id) => self.open_conversation(id).await,
                    None => self.notice = Some(format!("No conversation {}", index + 1)),
                }
            }
            CommandResult::Delete(index) => self.ask_delete(Some(index)),
            CommandResult::Language(choice) => self.toggle_language(choice),
            CommandResult::WhoAmI => {
                match self.services.session.refresh_user(&self.services.api).await {
                    Ok(user) => {
                        self.popup = Some(format!(
                            "{}\n{}\nServer: {}",
                            user.email,
                            user.id,
                            self.services.api.base_url()
                        ))
                    }
                    Err(e) => self.report("Could not load account", e),
                }
            }
            CommandResult::Logout => {
                self.services.session.logout();
                return Flow::Quit;
            }
            CommandResult::Exit => return Flow::Quit,
            CommandResult::Unknown(cmd) => {
                self.notice = Some(format!("Unknown command: /{cmd} (type /help)"));
            }
        }
        Flow::Continue
    }

    fn max_scroll(&self) -> usize {
        let width = self.transcript_area.width as usize;
        let height = self.transcript_area.height as usize;
        message_list::total_height(self.controller.state(), &self.theme, width)
            .saturating_sub(height)
    }

    fn scroll_by(&mut self, delta: isize) {
        let next = self.scroll_back.saturating_add_signed(delta);
        self.scroll_back = next.min(self.max_scroll());
    }

    async fn handle_action(&mut self, action: Action, width: u16) -> Flow {
        if matches!(action, Action::Interrupt | Action::Quit) {
            return Flow::Quit;
        }
        if self.popup.is_some() {
            self.popup = None;
            return Flow::Continue;
        }
        if self.confirm_delete.is_some() {
            self.confirm(&action).await;
            return Flow::Continue;
        }

        let page = (self.transcript_area.height / 2).max(1) as isize;
        match action {
            Action::Tab => {
                let next = match self.focus {
                    Focus::Input if self.sidebar.visible => Focus::Sidebar,
                    _ => Focus::Input,
                };
                self.set_focus(next);
            }
            Action::ToggleSidebar => {
                self.sidebar.toggle();
                if !self.sidebar.visible {
                    self.set_focus(Focus::Input);
                }
            }
            Action::NewChat => {
                self.controller.new_chat();
                self.set_focus(Focus::Input);
            }
            Action::Refresh => self.refresh().await,
            Action::ToggleLanguage => self.toggle_language(None),
            Action::DeleteConversation => {
                let index = (self.focus == Focus::Sidebar).then_some(self.sidebar.cursor);
                self.ask_delete(index);
            }
            Action::PageUp => self.scroll_by(page),
            Action::PageDown => self.scroll_by(-page),
            action if self.focus == Focus::Sidebar => {
                let count = self.controller.conversations().len();
                match action {
                    Action::Up | Action::Char('k') => self.sidebar.up(count),
                    Action::Down | Action::Char('j') => self.sidebar.down(count),
                    Action::Submit => {
                        let id = self
                            .controller
                            .conversations()
                            .get(self.sidebar.cursor)
                            .map(|c| c.id);
                        if let Some(id) = id {
                            if self.controller.active() != Some(id) {
                                self.open_conversation(id).await;
                            }
                            self.set_focus(Focus::Input);
                        }
                    }
                    Action::Escape => self.set_focus(Focus::Input),
                    _ => {}
                }
            }
            Action::Submit => {
                if let Some(result) = execute_command(self.input.content()) {
                    self.input.clear();
                    return self.run_slash_command(result).await;
                }
                self.submit();
            }
            Action::Up => self.scroll_by(1),
            Action::Down => self.scroll_by(-1),
            Action::Escape => self.notice = None,
            other => {
                self.input.handle_action(&other, width);
            }
        }
        Flow::Continue
    }

    fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();
        let show_sidebar = self.sidebar.visible && size.width >= MIN_WIDTH_FOR_SIDEBAR;

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(if show_sidebar {
                vec![Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)]
            } else {
                vec![Constraint::Min(20)]
            })
            .split(size);
        let main = columns[columns.len() - 1];

        if show_sidebar {
            let sidebar = Sidebar::new(self.controller.conversations(), self.sidebar, &self.theme)
                .active(self.controller.active())
                .focused(self.focus == Focus::Sidebar);
            frame.render_widget(sidebar, columns[0]);
        }

        // Layout: messages (flex), tool status (1), status (1), input (3)
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(main);

        let transcript = Rect {
            x: rows[0].x + 1,
            width: rows[0].width.saturating_sub(2),
            ..rows[0]
        };
        self.transcript_area = transcript;
        self.scroll_back = self.scroll_back.min(self.max_scroll());

        let state = self.controller.state();
        frame.render_widget(
            MessageList::new(state, &self.theme)
                .scroll_back(self.scroll_back)
                .spinner_start(self.spinner_start)
                .empty_hint("Start a new conversation by typing below."),
            transcript,
        );
        frame.render_widget(
            ToolStatusLine::new(state.tool_status.as_ref(), state.loading, &self.theme)
                .with_start_time(self.spinner_start),
            Rect {
                x: rows[1].x + 1,
                width: rows[1].width.saturating_sub(2),
                ..rows[1]
            },
        );
        self.render_status(frame, rows[2]);

        let title = match self.controller.active() {
            Some(_) => " Message ",
            None => " New conversation ",
        };
        self.input.render(rows[3], frame.buffer_mut(), &self.theme, title);

        if let Some((_, title)) = &self.confirm_delete {
            let message = format!("Delete \"{}\"?", crate::utils::truncate_chars(title, 40));
            frame.render_widget(ConfirmDialog::new("Delete conversation", &message, &self.theme), size);
        }

        if let Some(text) = &self.popup {
            self.render_popup(frame, size, text);
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let session = self.services.session.snapshot();
        let who = session
            .user
            .as_ref()
            .map(|u| u.email.clone())
            .unwrap_or_else(|| self.services.api.base_url().to_string());
        let link = match self.controller.connection_state() {
            Some(mist_api::ConnectionState::Open) => "live",
            Some(mist_api::ConnectionState::Connecting) => "connecting",
            Some(mist_api::ConnectionState::Closed) | None => "idle",
        };
        let left = format!(
            " {} │ {} │ {}",
            who,
            self.services.locale.language(),
            link
        );
        let right = "Tab: focus │ ^N: new │ ^X: delete │ ^T: lang │ ^C: quit ";

        let mut spans = vec![Span::styled(left.clone(), self.theme.dim_style())];
        let mut used = left.chars().count();
        if let Some(notice) = &self.notice {
            let text = format!(" │ {}", crate::utils::truncate_chars(notice, 60));
            used += text.chars().count();
            spans.push(Span::styled(text, self.theme.error_style()));
        }
        let available = area.width as usize;
        let right_width = right.chars().count();
        if used + right_width + 2 <= available {
            spans.push(Span::raw(" ".repeat(available - used - right_width)));
            spans.push(Span::styled(right, self.theme.dim_style()));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_popup(&self, frame: &mut Frame, area: Rect, text: &str) {
        let lines: Vec<&str> = text.lines().collect();
        let width = lines
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0) as u16
            + 4;
        let height = lines.len() as u16 + 2;
        let width = width.clamp(20, area.width);
        let height = height.min(area.height);
        let popup = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
            width,
            height,
        );
        frame.render_widget(Clear, popup);
        let block = Block::default()
            .title(" mist ")
            .title_style(self.theme.accent_bold())
            .borders(Borders::ALL)
            .border_style(self.theme.accent_style());
        frame.render_widget(
            Paragraph::new(text.to_string())
                .style(self.theme.base_style())
                .block(block)
                .wrap(Wrap { trim: false }),
            popup,
        );
    }
}

async fn wait_pending(pending: &mut Option<PendingSend>) -> SendOutcome {
    match pending.as_mut() {
        Some(send) => send.await,
        None => std::future::pending().await,
    }
}

/// Run the TUI application
pub async fn run_tui(services: &Services, conversation: Option<Uuid>) -> anyhow::Result<()> {
    use crossterm::{
        event::{DisableBracketedPaste, EnableBracketedPaste},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    };
    use ratatui::{Terminal, backend::CrosstermBackend};
    use std::io;

    if let Err(e) = services.session.refresh_user(&services.api).await {
        if e.is_unauthorized() {
            eprintln!("Session expired. Log in again with: mist --login EMAIL");
            return Ok(());
        }
        tracing::warn!("Could not load profile: {}", e);
    }

    let (controller, mut connection_rx) = services.controller();
    let mut chat_events = controller.subscribe();
    let mut session_rx = services.session.subscribe();
    let mut state = TuiState::new(services, controller);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.draw(|frame| state.render(frame))?;
    let loaded = match conversation {
        Some(id) => match state.controller.refresh_conversations().await {
            Ok(()) => state.controller.select_conversation(id).await,
            Err(e) => Err(e),
        },
        None => state.controller.load_conversations().await,
    };
    if let Err(e) = loaded {
        state.report("Could not load conversations", e);
    }

    let mut event_stream = EventStream::new();
    // Tick interval for animations (80ms for smooth spinner)
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(80));
    let mut expired = false;

    let result: anyhow::Result<()> = loop {
        while let Ok(event) = chat_events.try_recv() {
            state.handle_chat_event(event);
        }
        terminal.draw(|frame| state.render(frame))?;
        let area_width = terminal.size()?.width;

        tokio::select! {
            outcome = wait_pending(&mut state.pending), if state.pending.is_some() => {
                state.pending = None;
                state.controller.finish_send(outcome).await;
            }

            event = connection_rx.recv() => {
                if let Some(event) = event {
                    state.controller.handle_connection_event(event).await;
                }
            }

            event = event_stream.next() => {
                match event {
                    Some(Ok(event)) => {
                        if let Some(action) = mist_tui::event_to_action(event) {
                            let width = state.input_width(area_width);
                            if let Flow::Quit = state.handle_action(action, width).await {
                                break Ok(());
                            }
                        }
                    }
                    Some(Err(e)) => {
                        break Err(anyhow::anyhow!("Event error: {}", e));
                    }
                    None => {
                        break Ok(());
                    }
                }
            }

            // A rejected token logs the session out from under us.
            changed = session_rx.changed() => {
                if changed.is_err() || !session_rx.borrow_and_update().authenticated {
                    expired = true;
                    break Ok(());
                }
            }

            // Tick for animations (spinner updates)
            _ = tick_interval.tick() => {}
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if expired {
        eprintln!("Session expired. Log in again with: mist --login EMAIL");
    } else if !services.session.is_authenticated() {
        println!("Logged out.");
    }

    result
}

impl TuiState<'_> {
    /// Width of the composer for the current terminal width
    fn input_width(&self, terminal_width: u16) -> u16 {
        let show_sidebar = self.sidebar.visible && terminal_width >= MIN_WIDTH_FOR_SIDEBAR;
        if show_sidebar {
            terminal_width.saturating_sub(SIDEBAR_WIDTH)
        } else {
            terminal_width
        }
    }
}
