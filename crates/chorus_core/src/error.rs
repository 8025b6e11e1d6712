use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Failed to read configuration")]
    #[diagnostic(
        code(chorus_core::config_load_failed),
        help("Check that {} is valid TOML and matches the documented sections", path.display())
    )]
    ConfigLoadFailed {
        path: PathBuf,
        #[source]
        cause: toml::de::Error,
    },

    #[error("Failed to serialize configuration")]
    #[diagnostic(code(chorus_core::config_serialize_failed))]
    ConfigSerializeFailed {
        #[source]
        cause: toml::ser::Error,
    },

    #[error("Invalid configuration")]
    #[diagnostic(code(chorus_core::config_invalid), help("Field `{field}`: {reason}"))]
    ConfigInvalid { field: String, reason: String },

    #[error("Filesystem operation failed")]
    #[diagnostic(
        code(chorus_core::io_failed),
        help("Could not {operation} {}", path.display())
    )]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("Invalid persona name")]
    #[diagnostic(
        code(chorus_core::invalid_persona_name),
        help("Persona name '{name}' {reason}")
    )]
    InvalidPersonaName { name: String, reason: String },

    #[error("Persona not found")]
    #[diagnostic(
        code(chorus_core::persona_not_found),
        help("Known personas: {}", available.join(", "))
    )]
    PersonaNotFound { name: String, available: Vec<String> },

    #[error("Persona has no instructions")]
    #[diagnostic(
        code(chorus_core::missing_instructions),
        help("Create {} or add the persona with a description", path.display())
    )]
    MissingInstructions { name: String, path: PathBuf },

    #[error("Model provider request failed")]
    #[diagnostic(
        code(chorus_core::provider_request_failed),
        help("Check API credentials and rate limits for {provider}")
    )]
    ProviderRequestFailed {
        provider: String,
        model: String,
        #[source]
        cause: reqwest::Error,
    },

    #[error("Model provider returned an error")]
    #[diagnostic(
        code(chorus_core::provider_error_response),
        help("{provider} answered with status {status}: {body}")
    )]
    ProviderErrorResponse {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Model provider returned no text")]
    #[diagnostic(code(chorus_core::provider_empty_response))]
    ProviderEmptyResponse { provider: String, model: String },

    #[error("Channel operation failed")]
    #[diagnostic(
        code(chorus_core::channel_failed),
        help("The chat channel could not {operation}")
    )]
    ChannelFailed {
        operation: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn io(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        cause: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            cause,
        }
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn channel(
        operation: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ChannelFailed {
            operation: operation.into(),
            cause: cause.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_help_shows_paths() {
        let err = CoreError::io(
            "read",
            "agents/adobo/prompt.txt",
            std::io::Error::other("denied"),
        );
        assert_eq!(
            err.help().map(|h| h.to_string()),
            Some("Could not read agents/adobo/prompt.txt".to_string())
        );

        let missing = CoreError::MissingInstructions {
            name: "hollow".to_string(),
            path: PathBuf::from("agents/hollow/prompt.txt"),
        };
        let help = missing.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("agents/hollow/prompt.txt"));
    }
}
