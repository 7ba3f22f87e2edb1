use clap::{Parser, Subcommand};
use colored::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use evald_cli::{logging, run_server, Config};
use evald_sandbox::{generate_wrapper, FrameToken};

#[derive(Parser)]
#[command(name = "evald")]
#[command(about = "evald - sandboxed TypeScript evaluation service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Listening port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Listening address (overrides HOST)
        #[arg(long)]
        host: Option<String>,
    },
    /// Print the wrapper generated for a source file, for running by hand with `deno run`
    Wrap {
        /// Source file, or `-` for stdin
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = handle_command(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve { port, host } => {
            logging::init();

            let mut config = Config::from_env()?;
            if let Some(port) = port {
                config = config.with_port(port)?;
            }
            if let Some(host) = host {
                config = config.with_host(host);
            }
            run_server(config).await
        }
        Commands::Wrap { path } => {
            let source = read_source(&path)?;
            print!("{}", generate_wrapper(&source, &FrameToken::generate()));
            Ok(())
        }
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        return Ok(source);
    }
    std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))
}
