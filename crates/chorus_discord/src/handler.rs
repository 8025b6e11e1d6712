use std::sync::Arc;

use chorus_core::admin::narrate;
use chorus_core::{Admin, AdminCommand, ChatMessage, DebounceScheduler, Trigger};
use serenity::async_trait;
use serenity::client::{Context, EventHandler};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use tracing::{debug, info, warn};

/// Gateway events for the one channel the personas live in
pub struct ChorusHandler {
    channel_id: ChannelId,
    command_prefix: String,
    admin: Arc<Admin>,
    scheduler: Arc<DebounceScheduler>,
}

impl ChorusHandler {
    pub fn new(
        channel_id: ChannelId,
        command_prefix: impl Into<String>,
        admin: Arc<Admin>,
        scheduler: Arc<DebounceScheduler>,
    ) -> Self {
        Self {
            channel_id,
            command_prefix: command_prefix.into(),
            admin,
            scheduler,
        }
    }

    async fn handle_command(&self, ctx: &Context, msg: &Message) {
        let Some(reply) = command_reply(&self.admin, &self.command_prefix, &msg.content) else {
            debug!("Ignoring unrecognised command: {}", msg.content);
            return;
        };

        if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
            warn!("Failed to post command reply: {}", e);
        }
    }
}

/// Run an admin command and phrase the outcome for the channel.
///
/// Failures become a rejection line instead of a silent log entry. `None`
/// when `content` is not a complete command.
pub fn command_reply(admin: &Admin, prefix: &str, content: &str) -> Option<String> {
    let command = AdminCommand::parse(prefix, content)?;
    info!("Admin command: {:?}", command);

    let reply = match admin.execute(command) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Admin command failed: {}", e);
            narrate(format_args!("that didn't work: {}", e))
        }
    };
    Some(reply)
}

#[async_trait]
impl EventHandler for ChorusHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
        info!("Listening in channel {}", self.channel_id);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.channel_id != self.channel_id {
            return;
        }

        if msg.content.starts_with(&self.command_prefix) {
            self.handle_command(&ctx, &msg).await;
            return;
        }

        let message = ChatMessage::from_platform(msg.author.display_name(), msg.content);
        debug!("New message from {}", message.author);
        self.scheduler
            .trigger(Trigger::new(message.author, message.content));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{PersonaStore, Roster, RosterStore, SchedulerState};
    use pretty_assertions::assert_eq;

    fn admin(root: &std::path::Path) -> Admin {
        Admin::new(
            Arc::new(SchedulerState::new(Roster::default())),
            PersonaStore::new(root.join("agents")),
            RosterStore::new(root.join("online_agents.txt"), vec![]),
        )
    }

    #[test]
    fn test_command_reply_rejects_in_channel() {
        let dir = tempfile::tempdir().unwrap();
        let admin = admin(dir.path());

        let reply = command_reply(&admin, "!", "!add ..hidden be sneaky").unwrap();
        assert!(reply.starts_with("**World**: ..hidden can't be added"));

        // roster file path is a directory, so saving fails
        std::fs::create_dir_all(dir.path().join("online_agents.txt")).unwrap();
        let reply = command_reply(&admin, "!", "!add kingus You are kingus.").unwrap();
        assert!(reply.starts_with("**World**: that didn't work:"));
    }

    #[test]
    fn test_command_reply_ignores_unknown() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(command_reply(&admin(dir.path()), "!", "!dance"), None);
    }
}
