//! The chat channel as the scheduler sees it

use async_trait::async_trait;

use crate::Result;
use crate::directory::MentionDirectory;
use crate::message::ChatMessage;

#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// The latest `limit` messages in chronological order, command messages
    /// excluded
    async fn read_recent(&self, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Post text to the channel
    async fn send(&self, text: &str) -> Result<()>;

    /// Users and emojis that mentions can resolve against
    async fn directory(&self) -> Result<MentionDirectory>;
}
