//! Configuration system for Chorus
//!
//! Settings live in a single TOML file. Every field has a default so an empty
//! file (or no file at all) yields a runnable configuration once the Discord
//! token, channel and provider key are supplied through the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "chorus.toml";

/// Top-level configuration for Chorus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChorusConfig {
    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub personas: PersonasConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token (usually supplied through `DISCORD_TOKEN`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// The single channel the personas live in
    #[serde(default)]
    pub channel_id: u64,

    /// Prefix marking admin commands; such messages never trigger a cycle
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: 0,
            command_prefix: default_command_prefix(),
        }
    }
}

/// What a cycle does when one persona's generation call fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationErrorPolicy {
    /// Treat the persona as silent for this turn and keep going
    #[default]
    Skip,
    /// Abandon the rest of the turn order
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum spacing between cycle starts, in seconds
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Minimum spacing between two sends of the same persona, in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Pause after each successful send before the next persona, in seconds
    #[serde(default = "default_pacing_secs")]
    pub pacing_secs: u64,

    /// How many channel messages a persona sees per decision
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default)]
    pub on_generation_error: GenerationErrorPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
            cooldown_secs: default_cooldown_secs(),
            pacing_secs: default_pacing_secs(),
            history_limit: default_history_limit(),
            on_generation_error: GenerationErrorPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-3-5-sonnet-20240620",
            ProviderKind::OpenAi => "gpt-4o",
        }
    }

    fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name; falls back to the provider's default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// API key (usually supplied through the provider's env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the provider endpoint, mostly for proxies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ModelConfig {
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonasConfig {
    /// Directory holding one sub-directory per persona
    #[serde(default = "default_personas_dir")]
    pub dir: PathBuf,

    /// File listing the active roster, one name per line
    #[serde(default = "default_roster_file")]
    pub roster_file: PathBuf,

    /// Roster used when the roster file does not exist yet
    #[serde(default = "default_roster")]
    pub default_roster: Vec<String>,

    /// Authors whose messages are highlighted in every persona's prompt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vips: Vec<String>,
}

impl Default for PersonasConfig {
    fn default() -> Self {
        Self {
            dir: default_personas_dir(),
            roster_file: default_roster_file(),
            default_roster: default_roster(),
            vips: Vec::new(),
        }
    }
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_debounce_secs() -> u64 {
    10
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_pacing_secs() -> u64 {
    2
}

fn default_history_limit() -> usize {
    20
}

fn default_max_tokens() -> u32 {
    100
}

fn default_temperature() -> f32 {
    1.0
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_personas_dir() -> PathBuf {
    PathBuf::from("agents")
}

fn default_roster_file() -> PathBuf {
    PathBuf::from("online_agents.txt")
}

fn default_roster() -> Vec<String> {
    vec!["adobo".to_string(), "bingus".to_string()]
}

/// Resolve a path relative to a base directory
fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

impl ChorusConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults. Relative persona paths are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(CoreError::io("read", path, e)),
        };

        let mut config = Self::from_toml(&content).map_err(|cause| CoreError::ConfigLoadFailed {
            path: path.to_path_buf(),
            cause,
        })?;

        if let Some(base_dir) = path.parent() {
            config.personas.dir = resolve_path(base_dir, &config.personas.dir);
            config.personas.roster_file = resolve_path(base_dir, &config.personas.roster_file);
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|cause| CoreError::ConfigSerializeFailed { cause })
    }

    /// Fill secrets and ids from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Environment values win over the file; blank values are ignored
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.discord.token = token;
        }

        if let Some(channel) = lookup("DISCORD_CHANNEL_ID") {
            match channel.trim().parse::<u64>() {
                Ok(id) => self.discord.channel_id = id,
                Err(_) => tracing::warn!("Ignoring invalid DISCORD_CHANNEL_ID value"),
            }
        }

        if let Some(key) = lookup(self.model.provider.api_key_var()) {
            self.model.api_key = Some(key);
        }
    }

    /// Validate what the bot needs in order to connect and generate
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            return Err(CoreError::invalid_config(
                "discord.token",
                "set DISCORD_TOKEN or discord.token",
            ));
        }

        if self.discord.channel_id == 0 {
            return Err(CoreError::invalid_config(
                "discord.channel_id",
                "set DISCORD_CHANNEL_ID or discord.channel_id",
            ));
        }

        if self.discord.command_prefix.is_empty() {
            return Err(CoreError::invalid_config(
                "discord.command_prefix",
                "must not be empty",
            ));
        }

        if self.model.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(CoreError::invalid_config(
                "model.api_key",
                format!("set {}", self.model.provider.api_key_var()),
            ));
        }

        if self.scheduler.history_limit == 0 || self.scheduler.history_limit > 100 {
            return Err(CoreError::invalid_config(
                "scheduler.history_limit",
                "must be between 1 and 100",
            ));
        }

        Ok(())
    }
}
