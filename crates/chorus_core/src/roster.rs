//! The active roster and its persisted name list

use std::path::{Path, PathBuf};

use crate::persona::{Persona, PersonaStore};
use crate::{CoreError, Result};

/// Ordered set of personas currently taking part in the channel
#[derive(Debug, Clone, Default)]
pub struct Roster {
    personas: Vec<Persona>,
}

impl Roster {
    pub fn new(personas: Vec<Persona>) -> Self {
        let mut roster = Self::default();
        for persona in personas {
            roster.add(persona);
        }
        roster
    }

    pub fn names(&self) -> Vec<String> {
        self.personas.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.personas.iter().any(|p| p.name() == name)
    }

    /// Append a persona; returns false when the name is already active
    pub fn add(&mut self, persona: Persona) -> bool {
        if self.contains(persona.name()) {
            return false;
        }
        self.personas.push(persona);
        true
    }

    /// Remove a persona by name; returns false when it was not active
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.personas.len();
        self.personas.retain(|p| p.name() != name);
        self.personas.len() != before
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }
}

/// The roster file: one active persona name per line
#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
    default_names: Vec<String>,
}

impl RosterStore {
    pub fn new(path: impl Into<PathBuf>, default_names: Vec<String>) -> Self {
        Self {
            path: path.into(),
            default_names,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved names, falling back to the defaults when nothing has
    /// been saved yet
    pub fn load(&self) -> Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self.default_names.clone()),
            Err(e) => Err(CoreError::io("read", &self.path, e)),
        }
    }

    pub fn save(&self, names: &[String]) -> Result<()> {
        let mut content = String::new();
        for name in names {
            content.push_str(name);
            content.push('\n');
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io("create", parent, e))?;
        }
        std::fs::write(&self.path, content).map_err(|e| CoreError::io("write", &self.path, e))
    }
}

/// Build the startup roster from the saved names.
///
/// Names without a loadable persona are skipped with a warning, the same
/// way an unknown name in the file would be.
pub fn load_roster(store: &RosterStore, personas: &PersonaStore) -> Result<Roster> {
    let mut roster = Roster::default();
    for name in store.load()? {
        match personas.load(&name) {
            Ok(persona) => {
                roster.add(persona);
            }
            Err(e) => tracing::warn!("Skipping roster entry {}: {}", name, e),
        }
    }
    tracing::info!("Loaded roster: {:?}", roster.names());
    Ok(roster)
}
