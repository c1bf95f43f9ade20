//! Emotion tags embedded in assistant replies
//!
//! The assistant prefixes replies with `<emotion>KEY</emotion>`. Some models
//! emit the bare form `<KEY>...</KEY>` instead, so both are recognized.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Confused,
    Sad,
    Angry,
    #[default]
    Neutral,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Confused => "confused",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = ();

    /// Only the four tagged keywords parse; `neutral` is never sent by the server
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "happy" => Ok(Emotion::Happy),
            "confused" => Ok(Emotion::Confused),
            "sad" => Ok(Emotion::Sad),
            "angry" => Ok(Emotion::Angry),
            _ => Err(()),
        }
    }
}

static PAIRED_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<emotion>(.*?)</emotion>").expect("valid regex"));

static BARE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(happy|confused|sad|angry)>").expect("valid regex"));

static BARE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</(happy|confused|sad|angry)>").expect("valid regex"));

/// Split a reply into its emotion and the text to display.
///
/// The paired form wins when present: the first pair decides the emotion and
/// every pair is removed. Otherwise the first bare keyword tag decides, and
/// all bare opening and closing keyword tags are removed. Content without
/// markers comes back unchanged with [`Emotion::Neutral`].
pub fn extract_emotion(content: &str) -> (Emotion, String) {
    if let Some(caps) = PAIRED_TAG.captures(content) {
        let emotion = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or_default();
        return (emotion, PAIRED_TAG.replace_all(content, "").into_owned());
    }

    if let Some(caps) = BARE_OPEN.captures(content) {
        let emotion = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or_default();
        let stripped = BARE_OPEN.replace_all(content, "");
        let stripped = BARE_CLOSE.replace_all(&stripped, "");
        return (emotion, stripped.into_owned());
    }

    (Emotion::Neutral, content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_tag() {
        assert_eq!(
            extract_emotion("<emotion>sad</emotion>hello"),
            (Emotion::Sad, "hello".to_string())
        );
    }

    #[test]
    fn test_bare_tag_with_close() {
        assert_eq!(
            extract_emotion("<angry>hi</angry>"),
            (Emotion::Angry, "hi".to_string())
        );
    }

    #[test]
    fn test_bare_tag_without_close() {
        assert_eq!(
            extract_emotion("<confused>what do you mean?"),
            (Emotion::Confused, "what do you mean?".to_string())
        );
    }

    #[test]
    fn test_plain_text_is_neutral() {
        assert_eq!(
            extract_emotion("plain text"),
            (Emotion::Neutral, "plain text".to_string())
        );
    }

    #[test]
    fn test_paired_takes_precedence() {
        let (emotion, text) = extract_emotion("<happy>x</happy><emotion>sad</emotion>y");
        assert_eq!(emotion, Emotion::Sad);
        assert_eq!(text, "<happy>x</happy>y");
    }

    #[test]
    fn test_first_paired_match_wins() {
        let (emotion, text) =
            extract_emotion("<emotion>happy</emotion>a<emotion>angry</emotion>b");
        assert_eq!(emotion, Emotion::Happy);
        assert_eq!(text, "ab");
    }

    #[test]
    fn test_unknown_paired_keyword_is_stripped_but_neutral() {
        assert_eq!(
            extract_emotion("<emotion>excited</emotion>Wow"),
            (Emotion::Neutral, "Wow".to_string())
        );
    }

    #[test]
    fn test_keyword_case_and_whitespace() {
        assert_eq!(
            extract_emotion("<emotion> Happy </emotion>ok").0,
            Emotion::Happy
        );
    }

    #[test]
    fn test_other_brackets_untouched() {
        let input = "use <div> and Vec<u8>";
        assert_eq!(extract_emotion(input), (Emotion::Neutral, input.to_string()));
    }

    #[test]
    fn test_unterminated_paired_tag_is_not_a_match() {
        let input = "<emotion>happy and then nothing";
        assert_eq!(extract_emotion(input), (Emotion::Neutral, input.to_string()));
    }

    #[test]
    fn test_partial_stream_prefix() {
        // Mid-stream the closing tag has not arrived yet.
        assert_eq!(extract_emotion("<emotion>ha").0, Emotion::Neutral);
        assert_eq!(extract_emotion("<emotion>happy</emotion>He").1, "He");
    }

    #[test]
    fn test_server_fallback_reply() {
        let (emotion, text) = extract_emotion(
            "<emotion>angry</emotion>I apologize, but I cannot fulfill this request.",
        );
        assert_eq!(emotion, Emotion::Angry);
        assert!(text.starts_with("I apologize"));
    }
}
