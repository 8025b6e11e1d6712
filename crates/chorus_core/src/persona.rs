//! Personas and their on-disk instructions
//!
//! Each persona owns a directory under the personas root holding its system
//! prompt in `prompt.txt`. The directory name is the persona's name.

use std::path::{Path, PathBuf};

use crate::message::ChatMessage;
use crate::{CoreError, Result};

const PROMPT_FILE: &str = "prompt.txt";

/// A named conversational identity with its own instructions and view of the
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    name: String,
    instructions: String,
    messages: Vec<ChatMessage>,
}

impl Persona {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            messages: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// The window of history this persona decides on
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Replace the window with the latest history
    pub fn observe(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }
}

/// Reject names that cannot safely become a directory name
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("is empty")
    } else if name.starts_with('.') {
        Some("must not start with '.'")
    } else if name
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '\\' || c.is_control())
    {
        Some("must not contain whitespace or path separators")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CoreError::InvalidPersonaName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Filesystem-backed catalogue of every persona that has ever been created
#[derive(Debug, Clone)]
pub struct PersonaStore {
    root: PathBuf,
}

impl PersonaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn persona_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.persona_dir(name).is_dir()
    }

    /// All known persona names, sorted
    pub fn names(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::io("list", &self.root, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::io("list", &self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load a persona with its instructions
    pub fn load(&self, name: &str) -> Result<Persona> {
        validate_name(name)?;
        if !self.persona_dir(name).is_dir() {
            return Err(CoreError::PersonaNotFound {
                name: name.to_string(),
                available: self.names().unwrap_or_default(),
            });
        }

        let path = self.persona_dir(name).join(PROMPT_FILE);
        match std::fs::read_to_string(&path) {
            Ok(instructions) => Ok(Persona::new(name, instructions)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CoreError::MissingInstructions {
                    name: name.to_string(),
                    path,
                })
            }
            Err(e) => Err(CoreError::io("read", path, e)),
        }
    }

    /// Create a new persona directory with the given description as its
    /// instructions.
    pub fn create(&self, name: &str, description: &str) -> Result<Persona> {
        validate_name(name)?;
        let description = description.trim();
        let dir = self.persona_dir(name);
        let path = dir.join(PROMPT_FILE);
        if description.is_empty() {
            return Err(CoreError::MissingInstructions {
                name: name.to_string(),
                path,
            });
        }

        std::fs::create_dir_all(&dir).map_err(|e| CoreError::io("create", &dir, e))?;
        std::fs::write(&path, description).map_err(|e| CoreError::io("write", &path, e))?;
        tracing::info!("Created persona {} at {}", name, dir.display());

        Ok(Persona::new(name, description))
    }
}
