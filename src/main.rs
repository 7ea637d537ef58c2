use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use classbookd::config::Config;
use classbookd::ipc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "classbookd", version)]
#[command(about = "Classroom store sidecar speaking JSON lines on stdin/stdout", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(long, short)]
    config: Option<PathBuf>,
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries protocol frames only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config).context("failed to load configuration")?;
    init_logging(&config.log_filter.value);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = ?config.config_file,
        "classbookd starting"
    );

    let mut state = ipc::AppState::new();
    if let Some(workspace) = config.startup_workspace() {
        match state.store.get_or_open(workspace) {
            Ok(_) => state.workspace = Some(workspace.to_path_buf()),
            // The client can still pick a workspace with workspace.select.
            Err(e) => warn!(
                workspace = %workspace.display(),
                error = %e,
                "configured workspace did not open"
            ),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // Can't echo an id we could not parse.
            Err(e) => ipc::err("", "bad_json", e.to_string(), None),
        };
        let text = serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string());
        if writeln!(stdout, "{}", text).and_then(|_| stdout.flush()).is_err() {
            break;
        }
    }
    info!("classbookd stopped");
    Ok(())
}
