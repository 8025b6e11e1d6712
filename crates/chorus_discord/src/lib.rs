//! Chorus Discord - Discord Bot Integration
//!
//! Connects the Chorus scheduler to a single Discord channel: gateway events
//! become triggers and admin commands, and the channel's history, members and
//! emojis back the [`chorus_core::ChatChannel`] seam.

pub mod bot;
pub mod channel;
pub mod error;
pub mod handler;

pub use bot::{intents, run_bot};
pub use channel::{DiscordChannel, split_message};
pub use error::{DiscordError, Result};
pub use handler::ChorusHandler;

// Re-export serenity for convenience
pub use serenity;
