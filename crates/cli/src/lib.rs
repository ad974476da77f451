pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "omra",
    about = "OMRA agent wizard CLI",
    long_about = "Drive the agent-definition wizard from a scripted draft, inspect configuration, and check catalog readiness.",
    after_help = "Examples:\n  omra run --catalog catalog.json --script draft.json\n  omra steps --script draft.json\n  omra doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply a field-update script, walk the wizard, and submit the descriptor")]
    Run {
        #[arg(long, help = "JSON catalog snapshot (overrides catalog.path)")]
        catalog: Option<PathBuf>,
        #[arg(long, help = "JSON list of {\"field\", \"value\"} updates")]
        script: PathBuf,
        #[arg(long, help = "JSON file that receives created descriptors")]
        store: Option<PathBuf>,
        #[arg(long, help = "Include the descriptor and visited steps in the output")]
        json: bool,
    },
    #[command(about = "Show which wizard steps a scripted draft would visit or skip")]
    Steps {
        #[arg(long, help = "JSON list of {\"field\", \"value\"} updates")]
        script: PathBuf,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config and catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { catalog, script, store, json } => {
            commands::run::run(commands::run::RunOptions { catalog, script, store, json })
        }
        Command::Steps { script } => commands::steps::run(&script),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
