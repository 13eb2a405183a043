mod cli;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "warp-agent", version, about = "Warp Agent — editor link for script-driven hosts")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the identity encoded in an artifact filename
    Identify {
        /// Artifact path or filename (`<name>_<version>[_<checksum>].<ext>`)
        artifact: PathBuf,
    },
    /// Run the agent against a headless console host
    Run {
        /// Deployed artifact path
        #[arg(long)]
        artifact: PathBuf,
        /// Game content directory
        #[arg(long)]
        game_dir: PathBuf,
        /// Connect to this port only, instead of scanning the default range
        #[arg(long)]
        port: Option<u16>,
        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Log to a file instead of stderr (default location when no path is given)
        #[arg(long)]
        log_file: Option<Option<PathBuf>>,
    },
}

fn main() {
    let app = App::parse();

    match app.command {
        Commands::Identify { artifact } => {
            if let Err(e) = cli::identify::run(&artifact) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Run { artifact, game_dir, port, config, log_file } => {
            let args = cli::run::RunArgs { artifact, game_dir, port, config, log_file };
            if let Err(e) = cli::run::run(args) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}
