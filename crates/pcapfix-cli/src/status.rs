//! # pcapfix status
//!
//! Reports whether the shim is wired into the preload list and which
//! runtime switches the current environment would apply.

use anyhow::Result;
use console::{style, Emoji};
use pcapfix_config::preload::PreloadList;
use pcapfix_config::{PreloadConfig, ShimSettings};
use serde::Serialize;

use crate::install::entry_candidates;

static CHECK: Emoji<'_, '_> = Emoji("✔ ", "[ok] ");
static CROSS: Emoji<'_, '_> = Emoji("✘ ", "[!!] ");
static DOT: Emoji<'_, '_> = Emoji("● ", "[-] ");

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub library_path: String,
    pub library_present: bool,
    pub preload_file: String,
    pub preload_file_present: bool,
    pub installed: bool,
    pub other_entries: Vec<String>,
    pub shim: ShimSettings,
}

impl StatusReport {
    pub fn collect(preload: &PreloadConfig, shim: ShimSettings) -> Result<Self> {
        let list = PreloadList::load(&preload.list_path)?;
        let cwd = std::env::current_dir()?;
        let candidates = entry_candidates(&preload.library_path, &cwd);

        let (ours, other_entries): (Vec<String>, Vec<String>) = list
            .entries()
            .iter()
            .cloned()
            .partition(|e| candidates.contains(e));

        Ok(Self {
            library_path: preload.library_path.display().to_string(),
            library_present: preload.library_path.is_file(),
            preload_file: preload.list_path.display().to_string(),
            preload_file_present: preload.list_path.exists(),
            installed: !ours.is_empty(),
            other_entries,
            shim,
        })
    }
}

pub fn cmd_status(preload: &PreloadConfig, json: bool) -> Result<()> {
    let report = StatusReport::collect(preload, ShimSettings::from_env())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", style("pcapfix status").bold().cyan());

    if report.library_present {
        println!("  {}library {}", CHECK, report.library_path);
    } else {
        println!("  {}library {} (missing)", CROSS, style(&report.library_path).red());
    }

    if report.installed {
        println!("  {}listed in {}", CHECK, report.preload_file);
    } else {
        println!("  {}not listed in {}", CROSS, style(&report.preload_file).red());
    }
    for entry in &report.other_entries {
        println!("  {}also preloaded: {}", DOT, style(entry).dim());
    }

    if report.shim.disabled {
        println!("  {}PCAPFIX_DISABLE is set; calls pass through unchanged", DOT);
    }
    println!("  {}shim log level: {}", DOT, report.shim.log_level.as_str());

    if report.installed && !report.library_present {
        println!();
        println!(
            "{}",
            style("The preload list names a missing library; the loader will print an error for every process.").yellow()
        );
    }
    Ok(())
}
