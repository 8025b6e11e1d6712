use chorus_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DiscordError {
    #[error("Failed to build Discord client")]
    #[diagnostic(
        code(chorus::discord::client_build_failed),
        help("Check that your Discord bot token is valid and has not been regenerated")
    )]
    ClientBuildFailed {
        #[source]
        cause: serenity::Error,
    },

    #[error("Discord gateway connection failed")]
    #[diagnostic(
        code(chorus::discord::connection_failed),
        help("Enable the message content and server members intents in the Discord Developer Portal")
    )]
    ConnectionFailed {
        #[source]
        cause: serenity::Error,
    },

    #[error("Channel not found")]
    #[diagnostic(
        code(chorus::discord::channel_not_found),
        help("Channel ID {channel_id} not found or bot doesn't have access")
    )]
    ChannelNotFound {
        channel_id: u64,
        #[source]
        cause: Option<serenity::Error>,
    },

    #[error("Failed to fetch channel history")]
    #[diagnostic(
        code(chorus::discord::history_fetch_failed),
        help("The bot needs 'Read Message History' in channel {channel_id}")
    )]
    HistoryFetchFailed {
        channel_id: u64,
        #[source]
        cause: serenity::Error,
    },

    #[error("Failed to fetch server {what}")]
    #[diagnostic(
        code(chorus::discord::directory_fetch_failed),
        help("Member lookups need the server members intent enabled")
    )]
    DirectoryFetchFailed {
        what: &'static str,
        #[source]
        cause: serenity::Error,
    },

    #[error("Message send failed")]
    #[diagnostic(
        code(chorus::discord::message_send_failed),
        help("Failed to send message to {destination}")
    )]
    MessageSendFailed {
        destination: String,
        message_length: usize,
        #[source]
        cause: serenity::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, DiscordError>;

impl From<DiscordError> for CoreError {
    fn from(err: DiscordError) -> Self {
        match err {
            DiscordError::Core(inner) => inner,
            other => CoreError::channel("discord", other),
        }
    }
}
