use chorus_core::ChorusConfig;
use miette::Result;

use crate::output::Output;

const REDACTED: &str = "<redacted>";

/// Copy of the config that is safe to print
pub fn redacted(config: &ChorusConfig) -> ChorusConfig {
    let mut shown = config.clone();
    if !shown.discord.token.is_empty() {
        shown.discord.token = REDACTED.to_string();
    }
    if shown.model.api_key.is_some() {
        shown.model.api_key = Some(REDACTED.to_string());
    }
    shown
}

/// Show current configuration
pub fn show(config: &ChorusConfig) -> Result<()> {
    let output = Output::new();

    output.section("Current Configuration");
    println!();
    println!("{}", redacted(config).to_toml()?);

    if let Err(e) = config.validate() {
        output.warning(&format!("Not ready to run: {}", e));
    }

    Ok(())
}
