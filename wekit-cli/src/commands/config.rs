/// `wekit config`: manage the stored connection settings.
use std::process::ExitCode;

use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Password};

use crate::config::{self, CliConfig};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Store the host URL and credentials
    Init(InitArgs),
    /// Print the stored settings (password masked)
    Show,
    /// Print the config file location
    Path,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Wekan base URL, e.g. https://wekan.example.com
    pub url: String,

    /// Account username
    pub username: String,

    /// Account password; prompted when omitted
    #[arg(long)]
    pub password: Option<String>,
}

pub fn run(command: ConfigCommand) -> anyhow::Result<ExitCode> {
    match command {
        ConfigCommand::Init(args) => init(args),
        ConfigCommand::Show => show(),
        ConfigCommand::Path => path(),
    }
}

fn init(args: InitArgs) -> anyhow::Result<ExitCode> {
    let password = match args.password {
        Some(password) => password,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Password for {}", args.username))
            .allow_empty_password(true)
            .interact()?,
    };
    let config = CliConfig {
        base_url: Some(args.url),
        username: Some(args.username),
        password: if password.is_empty() {
            None
        } else {
            Some(password)
        },
    };
    let path = config::save(&config)?;
    println!("Wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn show() -> anyhow::Result<ExitCode> {
    let config = config::load()?;
    let mask = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("base_url: {}", mask(&config.base_url));
    println!("username: {}", mask(&config.username));
    println!(
        "password: {}",
        if config.password.is_some() {
            "********"
        } else {
            "-"
        }
    );
    Ok(ExitCode::SUCCESS)
}

fn path() -> anyhow::Result<ExitCode> {
    println!("{}", config::config_path()?.display());
    Ok(ExitCode::SUCCESS)
}
