//! repo-resource - Android repo manifests as CI resource versions
//!
//! Main entry point. Reads one JSON request from stdin and writes the JSON
//! response to stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use repo_resource::config::ResourceConfig;
use repo_resource::git::GitCheckout;
use repo_resource::protocol::{self, CheckRequest, InRequest};
use repo_resource::resolver::Resolver;
use repo_resource::syncer::Syncer;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

/// repo-resource - Track Android repo manifests
#[derive(Parser, Debug)]
#[command(name = "repo-resource")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, env = "REPO_RESOURCE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory used by check to fetch manifest repositories
    #[arg(long, env = "REPO_RESOURCE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Emit the current version and the known versions still valid
    Check,

    /// Check every project of the requested version out into a directory
    In {
        /// Destination directory
        destination: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse_from(dispatch_args(std::env::args_os().collect()));

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = repo_resource::logging::init(&config.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli, &config) {
        tracing::error!(kind = e.kind(), "{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Infer the subcommand when installed as `/opt/resource/check` or `/opt/resource/in`
fn dispatch_args(mut args: Vec<OsString>) -> Vec<OsString> {
    let invoked_as = args
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .map(str::to_string);

    if let Some(command @ ("check" | "in")) = invoked_as.as_deref() {
        args.insert(1, OsString::from(command));
    }
    args
}

fn load_config(cli: &Cli) -> repo_resource::Result<ResourceConfig> {
    let config = match cli.config {
        Some(ref path) => ResourceConfig::load(path)?,
        None => ResourceConfig::default(),
    };

    Ok(match cli.cache_dir {
        Some(ref dir) => config.with_cache_dir(dir),
        None => config,
    })
}

fn run(cli: Cli, config: &ResourceConfig) -> repo_resource::Result<()> {
    let checkout = GitCheckout::new();
    let stdin = std::io::stdin().lock();

    let output = match cli.command {
        Commands::Check => {
            let request: CheckRequest = protocol::decode(stdin)?;
            let versions = Resolver::new(&checkout, config).check(&request)?;
            serde_json::to_string(&versions)?
        }
        Commands::In { destination } => {
            let request: InRequest = protocol::decode(stdin)?;
            let response = Syncer::new(&checkout, config).sync(&request, &destination)?;
            serde_json::to_string(&response)?
        }
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", output)?;
    stdout.flush()?;
    Ok(())
}
