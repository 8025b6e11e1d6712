mod commands;
mod logging;
mod output;

use std::path::PathBuf;

use chorus_core::ChorusConfig;
use chorus_core::config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use miette::Result;
use owo_colors::OwoColorize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "chorus")]
#[command(about = "Several personas sharing one Discord channel")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory for the daily log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Connect to Discord and run the personas
    Run,
    /// Persona and roster management
    Personas {
        #[command(subcommand)]
        cmd: PersonaCommands,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
enum PersonaCommands {
    /// List all personas and who is online
    List,
    /// Add a persona to the roster, creating it when a description is given
    Add {
        name: String,
        /// Instructions for a new persona
        #[arg(long, short = 'd')]
        description: Option<String>,
    },
    /// Remove a persona from the roster
    Remove { name: String },
}

#[derive(Subcommand, Debug, PartialEq)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    let _log_guard = logging::init(cli.debug, &cli.log_dir);

    info!("Loading config from: {:?}", cli.config);
    let mut config = ChorusConfig::load(&cli.config)?;
    config.apply_env();

    match &cli.command {
        Commands::Run => {
            println!("{}", "Starting Chorus...".bright_green());
            chorus_discord::run_bot(config).await?;
        }
        Commands::Personas { cmd } => match cmd {
            PersonaCommands::List => commands::personas::list(&config)?,
            PersonaCommands::Add { name, description } => {
                commands::personas::add(&config, name, description.as_deref())?
            }
            PersonaCommands::Remove { name } => commands::personas::remove(&config, name)?,
        },
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => commands::config::show(&config)?,
        },
    }

    Ok(())
}
