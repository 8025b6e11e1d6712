//! Chorus Core - Persona Roster and Turn Scheduling
//!
//! This crate holds everything that decides which persona speaks and when:
//! the persona catalogue and roster, the debounced cycle scheduler, the turn
//! selector, the response cycle runner and the model providers behind
//! generation. Chat platforms plug in through [`ChatChannel`].

pub mod admin;
pub mod channel;
pub mod config;
pub mod directory;
pub mod error;
pub mod llm;
pub mod message;
pub mod persona;
pub mod prompt;
pub mod roster;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod turn;

pub use admin::{Admin, AdminCommand};
pub use channel::ChatChannel;
pub use config::{ChorusConfig, GenerationErrorPolicy, ProviderKind};
pub use directory::MentionDirectory;
pub use error::{CoreError, Result};
pub use llm::{CompletionProvider, Generator, LlmGenerator, Reply, provider_from_config};
pub use message::ChatMessage;
pub use persona::{Persona, PersonaStore};
pub use roster::{Roster, RosterStore, load_roster};
pub use runner::{CycleReport, CycleRunner, RunnerSettings};
pub use scheduler::{CycleHandler, DebounceScheduler, Trigger};
pub use state::SchedulerState;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        Admin, AdminCommand, ChatChannel, ChatMessage, ChorusConfig, CoreError, CycleHandler,
        CycleRunner, DebounceScheduler, Generator, LlmGenerator, MentionDirectory, Persona,
        PersonaStore, Reply, Result, Roster, RosterStore, RunnerSettings, SchedulerState, Trigger,
    };
}
