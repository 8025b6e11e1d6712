use std::sync::Arc;

use chorus_core::{
    Admin, AdminCommand, ChorusConfig, PersonaStore, RosterStore, SchedulerState, load_roster,
};
use miette::Result;
use owo_colors::OwoColorize;

use crate::output::{Output, plain_reply};

fn stores(config: &ChorusConfig) -> (PersonaStore, RosterStore) {
    (
        PersonaStore::new(&config.personas.dir),
        RosterStore::new(
            &config.personas.roster_file,
            config.personas.default_roster.clone(),
        ),
    )
}

/// The same admin surface the channel commands use, over the on-disk roster
fn offline_admin(config: &ChorusConfig) -> Result<Admin> {
    let (personas, roster_store) = stores(config);
    let roster = load_roster(&roster_store, &personas)?;
    Ok(Admin::new(
        Arc::new(SchedulerState::new(roster)),
        personas,
        roster_store,
    ))
}

/// List every persona and whether it is on the roster
pub fn list(config: &ChorusConfig) -> Result<()> {
    let output = Output::new();
    let (personas, roster_store) = stores(config);
    let names = personas.names()?;
    let online = roster_store.load()?;

    output.section("Personas");
    output.kv("Directory", &personas.root().display().to_string());

    if names.is_empty() {
        output.status("No personas found");
        output.status(&format!(
            "Create one with: {} personas add <name> --description <text>",
            "chorus".bright_green()
        ));
        return Ok(());
    }

    for name in &names {
        if online.contains(name) {
            output.list_item(&format!("{} {}", name.bright_cyan(), "(online)".bright_green()));
        } else {
            output.list_item(&format!("{} {}", name, "(offline)".dimmed()));
        }
    }

    Ok(())
}

/// Create a persona if needed and put it on the roster
pub fn add(config: &ChorusConfig, name: &str, description: Option<&str>) -> Result<()> {
    let reply = offline_admin(config)?.execute(AdminCommand::Add {
        name: name.to_string(),
        description: description.map(str::to_string),
    })?;
    Output::new().success(plain_reply(&reply));
    Ok(())
}

/// Take a persona off the roster; its directory stays
pub fn remove(config: &ChorusConfig, name: &str) -> Result<()> {
    let reply = offline_admin(config)?.execute(AdminCommand::Remove {
        name: name.to_string(),
    })?;
    Output::new().success(plain_reply(&reply));
    Ok(())
}
