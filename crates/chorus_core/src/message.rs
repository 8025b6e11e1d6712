//! Channel messages as the personas see them

use serde::{Deserialize, Serialize};

/// One line of channel history: who said it and what they said
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }

    /// Build a message from what the platform reports.
    ///
    /// All personas post through one bot account as `**name**: text`, so a
    /// message in that shape is attributed to the persona rather than the
    /// account that carried it.
    pub fn from_platform(author: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        match parse_persona_message(&content) {
            Some((persona, text)) => Self::new(persona, text),
            None => Self::new(author, content),
        }
    }
}

/// Render a persona's text the way it is posted to the channel
pub fn format_persona_message(persona: &str, text: &str) -> String {
    format!("**{}**: {}", persona, text)
}

/// Split `**name**: text` into its parts
pub fn parse_persona_message(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("**")?;
    let (name, text) = rest.split_once("**: ")?;
    let name = name.trim_matches('*');
    if name.is_empty() {
        return None;
    }
    Some((name, text))
}

/// Strip the header a model sometimes puts in front of its reply.
///
/// A one-word first line ending in `:` with more text below it
/// (`Name:\n...`) is always dropped. An inline `name: text` header is dropped only for names in
/// `known_names` (case-insensitive, bold markers ignored), so ordinary
/// sentences containing a colon are kept.
pub fn clean_response(text: &str, known_names: &[&str]) -> String {
    let trimmed = text.trim();
    if let Some((first, body)) = trimmed.split_once('\n') {
        let label = first.trim().trim_end_matches(':');
        let label = label.trim_matches('*').trim();
        let body = body.trim();
        if first.trim_end().ends_with(':')
            && !label.is_empty()
            && !label.contains(char::is_whitespace)
            && !body.is_empty()
        {
            return body.to_string();
        }
    }

    let Some((head, rest)) = trimmed.split_once(':') else {
        return trimmed.to_string();
    };

    let head = head.trim().trim_matches('*').trim();
    let is_header = known_names
        .iter()
        .any(|name| name.eq_ignore_ascii_case(head));

    if is_header {
        rest.trim_start_matches('*').trim().to_string()
    } else {
        trimmed.to_string()
    }
}
