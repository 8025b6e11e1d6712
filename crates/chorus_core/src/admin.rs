//! Roster management commands typed into the channel
//!
//! `!add <name> [description]`, `!kill <name>` (or `!remove`) and `!list`.
//! Replies come back as a `**World**:` line for the channel.

use std::sync::Arc;

use crate::persona::{PersonaStore, validate_name};
use crate::roster::RosterStore;
use crate::state::SchedulerState;
use crate::{CoreError, Result};

const NARRATOR: &str = "World";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Add {
        name: String,
        description: Option<String>,
    },
    Remove {
        name: String,
    },
    List,
}

fn split_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(at) => Some((&text[..at], text[at..].trim())),
        None => Some((text, "")),
    }
}

impl AdminCommand {
    /// Parse a channel message; `None` when it is not a complete command
    pub fn parse(prefix: &str, content: &str) -> Option<Self> {
        let body = content.trim().strip_prefix(prefix)?;
        let (command, rest) = split_word(body)?;

        match command {
            "add" => {
                let (name, description) = split_word(rest)?;
                Some(AdminCommand::Add {
                    name: name.to_string(),
                    description: (!description.is_empty()).then(|| description.to_string()),
                })
            }
            "kill" | "remove" => {
                let (name, _) = split_word(rest)?;
                Some(AdminCommand::Remove {
                    name: name.to_string(),
                })
            }
            "list" => Some(AdminCommand::List),
            _ => None,
        }
    }
}

/// Phrase `text` as a narrator line for the channel
pub fn narrate(text: impl std::fmt::Display) -> String {
    format!("**{}**: {}", NARRATOR, text)
}

/// Applies admin commands to the live roster and keeps the roster file in
/// step with it
pub struct Admin {
    state: Arc<SchedulerState>,
    personas: PersonaStore,
    roster_store: RosterStore,
}

impl Admin {
    pub fn new(
        state: Arc<SchedulerState>,
        personas: PersonaStore,
        roster_store: RosterStore,
    ) -> Self {
        Self {
            state,
            personas,
            roster_store,
        }
    }

    /// Run a command and return the reply to post
    pub fn execute(&self, command: AdminCommand) -> Result<String> {
        match command {
            AdminCommand::Add { name, description } => self.add(&name, description.as_deref()),
            AdminCommand::Remove { name } => self.remove(&name),
            AdminCommand::List => self.list(),
        }
    }

    fn add(&self, name: &str, description: Option<&str>) -> Result<String> {
        if self.state.is_active(name) {
            return Ok(narrate(format_args!("{} is already in the chat", name)));
        }

        if let Err(CoreError::InvalidPersonaName { reason, .. }) = validate_name(name) {
            return Ok(narrate(format_args!("{} can't be added: name {}", name, reason)));
        }

        let existing = if self.personas.exists(name) {
            match self.personas.load(name) {
                Ok(persona) => Some(persona),
                // directory without instructions: same as a brand-new persona
                Err(CoreError::MissingInstructions { .. }) => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let persona = match (existing, description) {
            (Some(persona), _) => persona,
            (None, Some(description)) if !description.trim().is_empty() => {
                self.personas.create(name, description)?
            }
            (None, _) => {
                return Ok(narrate(format_args!(
                    "{} needs a description to be added.",
                    name
                )));
            }
        };

        match self.state.activate(persona) {
            Some(names) => {
                self.roster_store.save(&names)?;
                tracing::info!("{} joined the roster", name);
                Ok(narrate(format_args!("{} has joined the chat", name)))
            }
            None => Ok(narrate(format_args!("{} is already in the chat", name))),
        }
    }

    fn remove(&self, name: &str) -> Result<String> {
        match self.state.deactivate(name) {
            Some(names) => {
                self.roster_store.save(&names)?;
                tracing::info!("{} left the roster", name);
                Ok(narrate(format_args!("{} has left the chat", name)))
            }
            None => Ok(narrate(format_args!("{} is not currently online", name))),
        }
    }

    fn list(&self) -> Result<String> {
        let online = self.state.roster_names();
        let offline: Vec<String> = self
            .personas
            .names()?
            .into_iter()
            .filter(|name| !online.contains(name))
            .collect();

        let join = |names: &[String]| {
            if names.is_empty() {
                "None".to_string()
            } else {
                names.join(", ")
            }
        };

        Ok(narrate(format_args!(
            "\nOnline: {}\n\nOffline: {}",
            join(&online),
            join(&offline)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Persona;
    use crate::roster::Roster;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            AdminCommand::parse("!", "!add kingus You are kingus.  Loud."),
            Some(AdminCommand::Add {
                name: "kingus".to_string(),
                description: Some("You are kingus.  Loud.".to_string()),
            })
        );
        assert_eq!(
            AdminCommand::parse("!", "!add kingus"),
            Some(AdminCommand::Add {
                name: "kingus".to_string(),
                description: None,
            })
        );
        assert_eq!(
            AdminCommand::parse("!", "!kill adobo"),
            Some(AdminCommand::Remove {
                name: "adobo".to_string()
            })
        );
        assert_eq!(
            AdminCommand::parse("!", "!remove adobo"),
            AdminCommand::parse("!", "!kill adobo")
        );
        assert_eq!(AdminCommand::parse("!", "!list"), Some(AdminCommand::List));
        assert_eq!(AdminCommand::parse("!", "!add"), None);
        assert_eq!(AdminCommand::parse("!", "!dance"), None);
        assert_eq!(AdminCommand::parse("!", "list"), None);
    }

    struct Fixture {
        dir: TempDir,
        admin: Admin,
        state: Arc<SchedulerState>,
        roster_store: RosterStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let personas = PersonaStore::new(dir.path().join("agents"));
        personas.create("adobo", "You are adobo.").unwrap();
        personas.create("bingus", "You are bingus.").unwrap();
        let roster_store = RosterStore::new(dir.path().join("online_agents.txt"), vec![]);
        let state = Arc::new(SchedulerState::new(Roster::new(vec![Persona::new(
            "adobo",
            "You are adobo.",
        )])));
        let admin = Admin::new(state.clone(), personas, roster_store.clone());
        Fixture {
            dir,
            admin,
            state,
            roster_store,
        }
    }

    fn add(name: &str, description: Option<&str>) -> AdminCommand {
        AdminCommand::Add {
            name: name.to_string(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_add_existing_and_new_personas() {
        let f = fixture();

        assert_eq!(
            f.admin.execute(add("adobo", None)).unwrap(),
            "**World**: adobo is already in the chat"
        );
        assert_eq!(
            f.admin.execute(add("bingus", None)).unwrap(),
            "**World**: bingus has joined the chat"
        );
        assert_eq!(
            f.admin
                .execute(add("kingus", Some("You are kingus.")))
                .unwrap(),
            "**World**: kingus has joined the chat"
        );

        assert_eq!(f.state.roster_names(), vec!["adobo", "bingus", "kingus"]);
        assert_eq!(
            f.roster_store.load().unwrap(),
            vec!["adobo", "bingus", "kingus"]
        );
    }

    #[test]
    fn test_add_new_persona_needs_description() {
        let f = fixture();
        assert_eq!(
            f.admin.execute(add("kingus", None)).unwrap(),
            "**World**: kingus needs a description to be added."
        );
        assert_eq!(f.state.roster_names(), vec!["adobo"]);
        assert!(!f.roster_store.path().exists());
    }

    #[test]
    fn test_remove() {
        let f = fixture();
        let kill = |name: &str| AdminCommand::Remove {
            name: name.to_string(),
        };

        assert_eq!(
            f.admin.execute(kill("bingus")).unwrap(),
            "**World**: bingus is not currently online"
        );
        assert_eq!(
            f.admin.execute(kill("adobo")).unwrap(),
            "**World**: adobo has left the chat"
        );
        assert!(f.state.roster_names().is_empty());
        assert!(f.roster_store.load().unwrap().is_empty());
    }

    #[test]
    fn test_list_online_and_offline() {
        let f = fixture();
        assert_eq!(
            f.admin.execute(AdminCommand::List).unwrap(),
            "**World**: \nOnline: adobo\n\nOffline: bingus"
        );

        f.admin.execute(add("bingus", None)).unwrap();
        assert_eq!(
            f.admin.execute(AdminCommand::List).unwrap(),
            "**World**: \nOnline: adobo, bingus\n\nOffline: None"
        );
    }

    #[test]
    fn test_invalid_name_is_rejected_in_channel() {
        let f = fixture();
        let reply = f.admin.execute(add("../etc", Some("nope"))).unwrap();
        assert!(reply.starts_with("**World**: ../etc can't be added: name "));
        assert_eq!(f.state.roster_names(), vec!["adobo"]);
    }

    #[test]
    fn test_add_directory_without_instructions() {
        let f = fixture();
        std::fs::create_dir_all(f.dir.path().join("agents/hollow")).unwrap();

        assert_eq!(
            f.admin.execute(add("hollow", None)).unwrap(),
            "**World**: hollow needs a description to be added."
        );
        assert_eq!(f.state.roster_names(), vec!["adobo"]);

        assert_eq!(
            f.admin.execute(add("hollow", Some("You are hollow."))).unwrap(),
            "**World**: hollow has joined the chat"
        );
        assert!(f.state.is_active("hollow"));
    }
}
