use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use signal_hook::consts::{SIGINT, SIGTERM};
use warp_agent::config::AgentConfig;
use warp_agent::host::Host;
use warp_agent::{tracing_init, Agent, StartOutcome};

use super::console_host::{parse_location, ConsoleHost, MainWork};

pub struct RunArgs {
    pub artifact: PathBuf,
    pub game_dir: PathBuf,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    /// `Some(None)`: `--log-file` given without a path.
    pub log_file: Option<Option<PathBuf>>,
}

/// Resolve `--log-file` to a file path; `None` means log to stderr.
fn log_target(arg: Option<Option<PathBuf>>) -> Option<PathBuf> {
    arg.map(|path| path.unwrap_or_else(tracing_init::default_log_path))
}

pub fn run(args: RunArgs) -> Result<()> {
    match log_target(args.log_file.clone()) {
        Some(path) => tracing_init::init_file_tracing(&path)
            .with_context(|| format!("Cannot open log file {}", path.display()))?,
        None => tracing_init::init_stderr_tracing(),
    }

    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path),
        None => AgentConfig::from_env(),
    };
    if args.port.is_some() {
        config.port = args.port;
    }

    let quit = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, quit.clone())
            .context("Failed to install signal handler")?;
    }

    let (host, work) = ConsoleHost::new(args.game_dir);
    let agent = Agent::new(host.clone() as Arc<dyn Host>, config, &args.artifact)
        .context("Failed to resolve agent identity")?;

    match agent.start().context("Failed to start agent")? {
        StartOutcome::Started => {}
        StartOutcome::Inert => tracing::warn!("Agent is inert, nothing will connect"),
        StartOutcome::AlreadyStarted => {}
    }

    spawn_stdin_reader(host.sender())?;
    host.run_main_loop(work, &quit);

    tracing::info!(worker_alive = agent.is_running(), "Exiting");
    Ok(())
}

fn spawn_stdin_reader(tx: std::sync::mpsc::Sender<MainWork>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_location(&line) {
                    Some(location) => {
                        if tx.send(MainWork::Reached(location)).is_err() {
                            break;
                        }
                    }
                    None => tracing::warn!(input = %line, "Expected <path>:<line>"),
                }
            }
            tracing::debug!("stdin closed");
        })
        .context("Failed to spawn stdin reader")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_target() {
        assert_eq!(log_target(None), None);
        assert_eq!(
            log_target(Some(Some(PathBuf::from("/tmp/agent.log")))),
            Some(PathBuf::from("/tmp/agent.log"))
        );
        assert_eq!(log_target(Some(None)), Some(tracing_init::default_log_path()));
    }
}
