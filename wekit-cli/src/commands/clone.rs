/// `wekit clone`: mirror a Wekan host into a local markdown tree.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;

use wekit_core::clone::BoardFilter;
use wekit_core::{CloneOptions, Cloner, HttpWekanClient};

use crate::config::resolve_connection;
use crate::render::{self, ConsoleSink};

#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Wekan base URL, e.g. https://wekan.example.com
    pub url: Option<String>,

    /// Account username
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Account password (prefer WEKIT_PASSWORD or `wekit config init`)
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Directory the host tree is created under
    #[arg(short = 'o', long, default_value = ".")]
    pub output: PathBuf,

    /// Board selector: index, board id, or title pattern
    #[arg(short = 'b', long, value_name = "FILTER")]
    pub board: Option<String>,
}

pub fn run(args: CloneArgs) -> anyhow::Result<ExitCode> {
    let conn = resolve_connection(args.url, args.username, args.password)?;
    let api = HttpWekanClient::connect(&conn.base_url, &conn.username, &conn.password)
        .with_context(|| format!("login to {} failed", conn.base_url))?;

    let options = CloneOptions {
        output_dir: args.output,
        board_filter: args.board.as_deref().map(BoardFilter::parse),
    };
    let sink = ConsoleSink::new();
    let report = Cloner::new(&api, &sink).clone_host(&options)?;
    sink.finish();
    render::clone_summary(&report);

    Ok(if report.failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
