/// `wekit` binary: clone Wekan boards to a markdown tree and push local
/// edits back to the server.
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod render;

#[derive(Parser)]
#[command(
    name = "wekit",
    version,
    about = "Mirror Wekan boards as local markdown and push edits back"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clone boards from a Wekan host into a local directory tree
    Clone(commands::clone::CloneArgs),
    /// Detect local edits and apply them to the remote board
    Push(commands::push::PushArgs),
    /// Show what a push would do, grouped by change kind
    Status(commands::push::StatusArgs),
    /// Show detected changes with their old and new content
    Diff(commands::push::StatusArgs),
    /// Manage stored connection settings
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Clone(args) => commands::clone::run(args),
        Command::Push(args) => commands::push::run_push(args),
        Command::Status(args) => commands::push::run_status(args),
        Command::Diff(args) => commands::push::run_diff(args),
        Command::Config(command) => commands::config::run(command),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", console::style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
