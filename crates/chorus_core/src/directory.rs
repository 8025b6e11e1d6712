//! Mention and emoji translation between persona text and platform tokens
//!
//! Personas write `@name` and `:shortcode:`; the platform wants `<@id>` and
//! `<:shortcode:id>`. The same table turns platform tokens back into the
//! readable form before history reaches a prompt.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<)?@([\w-]+)").expect("mention pattern is valid"));
static SHORTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<a?)?:([\w~-]+):(\d+>)?").expect("shortcode pattern is valid")
});
static USER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("user token pattern is valid"));
static EMOJI_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a?:([\w~-]+):\d+>").expect("emoji token pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
struct EmojiEntry {
    id: u64,
    animated: bool,
}

/// Known users and custom emojis of the channel's server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionDirectory {
    users_by_name: HashMap<String, u64>,
    names_by_id: HashMap<u64, String>,
    emojis: HashMap<String, EmojiEntry>,
}

impl MentionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user under a name; the first name registered for an id is
    /// the one used when turning tokens back into text
    pub fn add_user(&mut self, name: impl Into<String>, id: u64) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        self.names_by_id.entry(id).or_insert_with(|| name.clone());
        self.users_by_name.entry(name).or_insert(id);
    }

    pub fn add_emoji(&mut self, name: impl Into<String>, id: u64, animated: bool) {
        self.emojis.insert(name.into(), EmojiEntry { id, animated });
    }

    pub fn user_count(&self) -> usize {
        self.names_by_id.len()
    }

    pub fn emoji_count(&self) -> usize {
        self.emojis.len()
    }

    /// Replace `@name` and `:shortcode:` with platform tokens.
    ///
    /// Unknown names and shortcodes stay as written. Tokens that are already
    /// in platform form are left alone, so resolving twice changes nothing.
    pub fn resolve(&self, text: &str) -> String {
        let text = MENTION.replace_all(text, |caps: &Captures| {
            // Already a platform user token
            if caps.get(1).is_some() {
                return caps[0].to_string();
            }
            let name = &caps[2];
            match self.users_by_name.get(name) {
                Some(id) => format!("<@{}>", id),
                None => {
                    tracing::debug!("'{}' mentioned but not a known user", name);
                    caps[0].to_string()
                }
            }
        });

        SHORTCODE
            .replace_all(&text, |caps: &Captures| {
                // Already a platform emoji token
                if caps.get(1).is_some() || caps.get(3).is_some() {
                    return caps[0].to_string();
                }
                let name = &caps[2];
                match self.emojis.get(name) {
                    Some(entry) if entry.animated => format!("<a:{}:{}>", name, entry.id),
                    Some(entry) => format!("<:{}:{}>", name, entry.id),
                    None => {
                        tracing::debug!("Unknown emoji shortcode :{}:", name);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Replace platform tokens with `@name` and `:shortcode:`
    pub fn humanize(&self, text: &str) -> String {
        let text = USER_TOKEN.replace_all(text, |caps: &Captures| {
            let id = caps[1].parse::<u64>().ok();
            match id.and_then(|id| self.names_by_id.get(&id)) {
                Some(name) => format!("@{}", name),
                None => {
                    tracing::debug!("User id {} not found in directory", &caps[1]);
                    caps[0].to_string()
                }
            }
        });

        EMOJI_TOKEN
            .replace_all(&text, |caps: &Captures| format!(":{}:", &caps[1]))
            .into_owned()
    }
}
