pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "rollbot",
    version,
    about = "Rollbot operator CLI",
    long_about = "Apply migrations, inspect configuration, check readiness, and try rolls locally.",
    after_help = "Examples:\n  rollbot doctor --json\n  rollbot config\n  rollbot roll 4d6+2 --user alice"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate {
        #[arg(long, help = "Revert the most recent migration instead of applying")]
        undo: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack credentials, database connectivity and schema")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Evaluate a roll locally and print the reply Slack would see")]
    Roll {
        #[arg(help = "Roll text, e.g. `3d6+1` or `10d10 hit7`")]
        text: Vec<String>,
        #[arg(long, default_value = "you", help = "Name shown as the roller")]
        user: String,
        #[arg(long, default_value = "/roll", help = "Slash command used in help examples")]
        command: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate { undo } => commands::migrate::run(undo),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Roll { text, user, command } => {
            commands::roll::run(&text.join(" "), &user, &command)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
