/// `wekit push`, `wekit status` and `wekit diff`: reconcile a local board
/// directory against its remote counterpart.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;

use wekit_core::push::{Detection, PushOptions, PushOutcome};
use wekit_core::{find_board_id, HttpWekanClient, NullSink, Pusher};

use crate::config::resolve_connection;
use crate::render::{self, ConsoleSink};

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Board directory (a clone produced by `wekit clone`)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Detect and preview changes without applying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Apply without asking for confirmation
    #[arg(long)]
    pub force: bool,

    /// Board id, when the directory carries no export dump or sidecar
    #[arg(long, value_name = "ID")]
    pub board_id: Option<String>,

    /// Wekan base URL, overriding the config file
    #[arg(long)]
    pub url: Option<String>,

    /// Account username
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Account password (prefer WEKIT_PASSWORD or `wekit config init`)
    #[arg(short = 'p', long)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Board directory (a clone produced by `wekit clone`)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Board id, when the directory carries no export dump or sidecar
    #[arg(long, value_name = "ID")]
    pub board_id: Option<String>,

    /// Wekan base URL, overriding the config file
    #[arg(long)]
    pub url: Option<String>,

    /// Account username
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Account password (prefer WEKIT_PASSWORD or `wekit config init`)
    #[arg(short = 'p', long)]
    pub password: Option<String>,
}

/// The board id comes from the flag, the export dump or the board sidecar.
/// Resolved before any network traffic so a bad directory fails fast.
fn board_id_for(path: &Path, flag: Option<String>) -> anyhow::Result<String> {
    if let Some(id) = flag {
        return Ok(id);
    }
    find_board_id(path).with_context(|| {
        format!(
            "no board id found in {}; pass --board-id or clone the board first",
            path.display()
        )
    })
}

pub fn run_push(args: PushArgs) -> anyhow::Result<ExitCode> {
    let board_id = board_id_for(&args.path, args.board_id)?;
    let conn = resolve_connection(args.url, args.username, args.password)?;
    let api = HttpWekanClient::connect(&conn.base_url, &conn.username, &conn.password)
        .with_context(|| format!("login to {} failed", conn.base_url))?;

    let sink = ConsoleSink::new();
    let pusher = Pusher::new(&api, &sink);
    let opts = PushOptions {
        dry_run: args.dry_run,
    };
    let force = args.force;
    let outcome = pusher.push_board(&args.path, &board_id, &opts, |changes| {
        render::preview(changes);
        force || render::confirm_push(changes.len())
    })?;

    Ok(match outcome {
        PushOutcome::NoChanges => {
            println!("Everything up to date.");
            ExitCode::SUCCESS
        }
        PushOutcome::DryRun { changes } => {
            render::preview(&changes);
            println!("Dry run: nothing was pushed.");
            ExitCode::SUCCESS
        }
        PushOutcome::Declined { .. } => {
            println!("Push cancelled.");
            ExitCode::FAILURE
        }
        PushOutcome::Applied { report } => {
            render::push_summary(&report);
            if report.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    })
}

pub fn run_status(args: StatusArgs) -> anyhow::Result<ExitCode> {
    let detection = detect(&args)?;
    if detection.changes.is_empty() {
        println!("Everything up to date.");
    } else {
        render::preview(&detection.changes);
    }
    Ok(ExitCode::SUCCESS)
}

pub fn run_diff(args: StatusArgs) -> anyhow::Result<ExitCode> {
    let detection = detect(&args)?;
    if detection.changes.is_empty() {
        println!("Everything up to date.");
    } else {
        render::diff_detail(&detection.changes);
    }
    Ok(ExitCode::SUCCESS)
}

fn detect(args: &StatusArgs) -> anyhow::Result<Detection> {
    let board_id = board_id_for(&args.path, args.board_id.clone())?;
    let conn = resolve_connection(args.url.clone(), args.username.clone(), args.password.clone())?;
    let api = HttpWekanClient::connect(&conn.base_url, &conn.username, &conn.password)
        .with_context(|| format!("login to {} failed", conn.base_url))?;
    let detection = Pusher::new(&api, &NullSink).detect(&args.path, &board_id)?;
    Ok(detection)
}
