//! Shared utilities

use chrono::Utc;
use mist_chat::RecencyLabel;
use mist_chat::conversations::{ConversationList, display_title};

/// Truncate a string to `max` characters, appending "..." if truncated.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Numbered listing as printed by `--conversations` and `/list`
pub fn format_conversation_list(list: &ConversationList, active: Option<uuid::Uuid>) -> String {
    if list.is_empty() {
        return "No conversations yet.".to_string();
    }
    let now = Utc::now();
    list.items()
        .iter()
        .enumerate()
        .map(|(i, summary)| {
            let marker = if active == Some(summary.id) { '*' } else { ' ' };
            format!(
                "{marker}{:>3}. {}  ({}, {})",
                i + 1,
                truncate_chars(display_title(summary), 60),
                RecencyLabel::for_summary(summary, now),
                summary.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mist_api::ConversationSummary;
    use uuid::Uuid;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("olá mundo", 3), "olá...");
    }

    #[test]
    fn test_listing_marks_active() {
        let id = Uuid::new_v4();
        let mut list = ConversationList::default();
        list.replace(vec![ConversationSummary {
            id,
            title: Some("Weather".into()),
            created_at: Utc::now(),
            updated_at: None,
        }]);

        let text = format_conversation_list(&list, Some(id));
        assert!(text.starts_with("*  1. Weather  (Today, "), "{text}");
        assert_eq!(
            format_conversation_list(&ConversationList::default(), None),
            "No conversations yet."
        );
    }
}
