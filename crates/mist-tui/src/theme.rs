//! Color palette

use mist_chat::Emotion;
use ratatui::style::{Color, Modifier, Style};

/// Color palette for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    /// Secondary text (timestamps, hints)
    pub dim: Color,
    /// Prompts, focus and the user's messages
    pub accent: Color,
    /// The assistant's name and badges
    pub assistant: Color,
    pub error: Color,
    pub warning: Color,
    pub border: Color,
    pub selection_bg: Color,
    pub code: Color,
    pub link: Color,
    pub quote: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            bg: Color::Reset,
            fg: Color::White,
            dim: Color::DarkGray,
            accent: Color::Cyan,
            assistant: Color::LightMagenta,
            error: Color::Red,
            warning: Color::Yellow,
            border: Color::DarkGray,
            selection_bg: Color::Rgb(60, 40, 80),
            code: Color::Magenta,
            link: Color::Blue,
            quote: Color::Gray,
        }
    }
}

impl Theme {
    pub fn base_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn dim_style(&self) -> Style {
        Style::default().fg(self.dim)
    }

    pub fn accent_style(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn accent_bold(&self) -> Style {
        self.accent_style().add_modifier(Modifier::BOLD)
    }

    pub fn assistant_bold(&self) -> Style {
        Style::default()
            .fg(self.assistant)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn warning_style(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn code_style(&self) -> Style {
        Style::default().fg(self.code)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    /// Border for a pane, brighter when it has focus
    pub fn pane_border(&self, focused: bool) -> Style {
        if focused {
            self.accent_style()
        } else {
            self.border_style()
        }
    }

    pub fn selected_style(&self) -> Style {
        Style::default()
            .bg(self.selection_bg)
            .fg(self.fg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn emotion_style(&self, emotion: Emotion) -> Style {
        let color = match emotion {
            Emotion::Happy => Color::Green,
            Emotion::Confused => Color::Yellow,
            Emotion::Sad => Color::LightBlue,
            Emotion::Angry => Color::LightRed,
            Emotion::Neutral => self.dim,
        };
        Style::default().fg(color)
    }
}

/// Badge shown next to the assistant's name
pub fn emotion_badge(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Happy => "(^‿^)",
        Emotion::Confused => "(・_・?)",
        Emotion::Sad => "(╥_╥)",
        Emotion::Angry => "(╬ಠ益ಠ)",
        Emotion::Neutral => "(・_・)",
    }
}
