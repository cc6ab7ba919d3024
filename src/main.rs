mod config;
mod db;
mod error;
mod ipc;
mod seating;

use log::{error, info};
use std::io::{self, BufRead, Write};

fn main() -> anyhow::Result<()> {
    let config = config::Config::from_env()?;

    // stdout carries the protocol, so logs go to stderr. RUST_LOG still wins.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .target(env_logger::Target::Stderr)
    .try_init();

    info!("seatingd {} starting", env!("CARGO_PKG_VERSION"));
    let mut state = ipc::AppState::default();
    if let Some(workspace) = &config.workspace {
        match state.open_workspace(workspace) {
            Ok(()) => info!("opened workspace {}", workspace.display()),
            Err(e) => error!("could not open workspace {}: {e:#}", workspace.display()),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed; exiting");
    Ok(())
}
