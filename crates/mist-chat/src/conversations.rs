//! Cached conversation list for the sidebar

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use mist_api::ConversationSummary;
use uuid::Uuid;

pub const UNTITLED: &str = "New conversation";

/// Conversation summaries, most recently active first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationList {
    items: Vec<ConversationSummary>,
}

impl ConversationList {
    /// Replace the cache with a fresh listing
    pub fn replace(&mut self, mut items: Vec<ConversationSummary>) {
        items.sort_by_key(|c| std::cmp::Reverse(c.last_activity()));
        self.items = items;
    }

    pub fn items(&self) -> &[ConversationSummary] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&ConversationSummary> {
        self.items.first()
    }

    pub fn get(&self, index: usize) -> Option<&ConversationSummary> {
        self.items.get(index)
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|c| c.id == id)
    }

    /// Drop an entry; returns whether it was present
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|c| c.id != id);
        self.items.len() != before
    }
}

/// Title shown for a conversation
pub fn display_title(summary: &ConversationSummary) -> &str {
    summary
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
}

/// What to show after a conversation is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The deleted conversation was not the active one
    Keep,
    Select(Uuid),
    /// Nothing left; back to the empty view
    NewChat,
}

pub fn after_delete(
    active: Option<Uuid>,
    deleted: Uuid,
    remaining: &[ConversationSummary],
) -> Selection {
    if active != Some(deleted) {
        return Selection::Keep;
    }
    remaining
        .iter()
        .find(|c| c.id != deleted)
        .map_or(Selection::NewChat, |c| Selection::Select(c.id))
}

/// Sidebar date label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyLabel {
    Today,
    Yesterday,
    DaysAgo(i64),
    Date(NaiveDate),
}

impl RecencyLabel {
    /// Label by whole 24-hour periods elapsed since `at`
    pub fn compute(at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let days = (now - at).num_days();
        match days {
            d if d <= 0 => RecencyLabel::Today,
            1 => RecencyLabel::Yesterday,
            d if d < 7 => RecencyLabel::DaysAgo(d),
            _ => RecencyLabel::Date(at.date_naive()),
        }
    }

    pub fn for_summary(summary: &ConversationSummary, now: DateTime<Utc>) -> Self {
        Self::compute(summary.last_activity(), now)
    }
}

impl fmt::Display for RecencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecencyLabel::Today => f.write_str("Today"),
            RecencyLabel::Yesterday => f.write_str("Yesterday"),
            RecencyLabel::DaysAgo(n) => write!(f, "{n} days ago"),
            RecencyLabel::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}
