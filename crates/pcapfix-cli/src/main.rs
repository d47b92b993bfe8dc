//! # pcapfix CLI
//!
//! Manages the `libpcapfix.so` entry in the dynamic loader's preload list.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pcapfix_config::{logging, Config, LogLevel};

mod install;
mod status;

/// Enable libpcap immediate mode for programs that call pcap_open_live
#[derive(Parser)]
#[command(name = "pcapfix")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Preload list to edit (default: /etc/ld.so.preload)
    #[arg(long, global = true, value_name = "FILE")]
    preload_file: Option<PathBuf>,

    /// Installed shim library (default: /usr/local/lib/libpcapfix.so)
    #[arg(long, global = true, value_name = "PATH")]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the shim to the preload list
    Install {
        /// Skip checking that the library exists and is an ELF object
        #[arg(long)]
        force: bool,
    },

    /// Remove the shim from the preload list
    Uninstall,

    /// Show whether the shim is installed
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    logging::init_logging(LogLevel::Warn);

    let cli = Cli::parse();

    let mut config = Config::load().context("failed to load pcapfix config")?;
    if let Some(path) = cli.preload_file {
        config.preload.list_path = path;
    }
    if let Some(path) = cli.library {
        config.preload.library_path = path;
    }
    let list = config.preload.list_path.display().to_string();
    let library = config.preload.library_path.display().to_string();
    pcapfix_config::log_cli_debug!(
        "Resolved config",
        list = list.as_str(),
        library = library.as_str()
    );

    match cli.command {
        Commands::Install { force } => install::cmd_install(&config.preload, force),
        Commands::Uninstall => install::cmd_uninstall(&config.preload),
        Commands::Status { json } => status::cmd_status(&config.preload, json),
    }
}
