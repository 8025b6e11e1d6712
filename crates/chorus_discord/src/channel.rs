//! The configured Discord channel behind the scheduler's [`ChatChannel`] seam

use std::sync::Arc;

use async_trait::async_trait;
use chorus_core::{ChatChannel, ChatMessage, MentionDirectory};
use serenity::builder::GetMessages;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{DiscordError, Result};

/// Discord's per-message character limit
pub const MESSAGE_LIMIT: usize = 2000;

const MEMBER_PAGE: u64 = 1000;

pub struct DiscordChannel {
    http: Arc<Http>,
    channel_id: ChannelId,
    command_prefix: String,
    guild_id: OnceCell<GuildId>,
}

impl DiscordChannel {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, command_prefix: impl Into<String>) -> Self {
        Self {
            http,
            channel_id,
            command_prefix: command_prefix.into(),
            guild_id: OnceCell::new(),
        }
    }

    async fn guild_id(&self) -> Result<GuildId> {
        self.guild_id
            .get_or_try_init(|| async {
                let channel = self.channel_id.to_channel(&self.http).await.map_err(|e| {
                    DiscordError::ChannelNotFound {
                        channel_id: self.channel_id.get(),
                        cause: Some(e),
                    }
                })?;
                channel
                    .guild()
                    .map(|guild_channel| guild_channel.guild_id)
                    .ok_or(DiscordError::ChannelNotFound {
                        channel_id: self.channel_id.get(),
                        cause: None,
                    })
            })
            .await
            .copied()
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ChatMessage>> {
        let limit = limit.clamp(1, 100) as u8;
        let mut messages = self
            .channel_id
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|cause| DiscordError::HistoryFetchFailed {
                channel_id: self.channel_id.get(),
                cause,
            })?;

        // Discord returns newest first
        messages.reverse();

        Ok(messages
            .into_iter()
            .filter(|msg| !msg.content.starts_with(&self.command_prefix))
            .map(|msg| ChatMessage::from_platform(msg.author.display_name(), msg.content))
            .collect())
    }

    async fn post(&self, text: &str) -> Result<()> {
        for chunk in split_message(text, MESSAGE_LIMIT) {
            self.channel_id
                .say(&self.http, &chunk)
                .await
                .map_err(|cause| DiscordError::MessageSendFailed {
                    destination: self.channel_id.to_string(),
                    message_length: chunk.len(),
                    cause,
                })?;
        }
        Ok(())
    }

    async fn fetch_directory(&self) -> Result<MentionDirectory> {
        let guild_id = self.guild_id().await?;
        let mut directory = MentionDirectory::new();

        let members = guild_id
            .members(&self.http, Some(MEMBER_PAGE), None::<UserId>)
            .await
            .map_err(|cause| DiscordError::DirectoryFetchFailed {
                what: "members",
                cause,
            })?;
        for member in &members {
            let id = member.user.id.get();
            directory.add_user(member.display_name(), id);
            directory.add_user(member.user.name.as_str(), id);
        }

        let emojis = guild_id
            .emojis(&self.http)
            .await
            .map_err(|cause| DiscordError::DirectoryFetchFailed {
                what: "emojis",
                cause,
            })?;
        for emoji in &emojis {
            directory.add_emoji(emoji.name.as_str(), emoji.id.get(), emoji.animated);
        }

        debug!(
            "Directory for guild {}: {} users, {} emojis",
            guild_id,
            directory.user_count(),
            directory.emoji_count()
        );
        Ok(directory)
    }
}

#[async_trait]
impl ChatChannel for DiscordChannel {
    async fn read_recent(&self, limit: usize) -> chorus_core::Result<Vec<ChatMessage>> {
        Ok(self.fetch_recent(limit).await?)
    }

    async fn send(&self, text: &str) -> chorus_core::Result<()> {
        Ok(self.post(text).await?)
    }

    async fn directory(&self) -> chorus_core::Result<MentionDirectory> {
        Ok(self.fetch_directory().await?)
    }
}

/// Split text into chunks that fit in one Discord message, preferring line
/// breaks
pub fn split_message(content: &str, max_length: usize) -> Vec<String> {
    if content.len() <= max_length {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        if !current.is_empty() && current.len() + line.len() + 1 > max_length {
            chunks.push(std::mem::take(&mut current));
        }

        if line.len() > max_length {
            let chars: Vec<char> = line.chars().collect();
            let mut pieces = chars.chunks(max_length).map(|c| c.iter().collect::<String>());
            // keep the tail open so following lines can join it
            let mut last = pieces.next().unwrap_or_default();
            for piece in pieces {
                chunks.push(std::mem::replace(&mut last, piece));
            }
            current = last;
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
