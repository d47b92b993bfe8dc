//! # pcapfix-config
//!
//! Configuration shared by the preload shim and the `pcapfix` installer.
//!
//! The installer loads, in order of increasing priority:
//! 1. `/etc/pcapfix/config.toml`
//! 2. Environment variables (`PCAPFIX_PRELOAD_FILE`, `PCAPFIX_LIBRARY`)
//! 3. Command-line flags (applied by the caller)
//!
//! The shim itself never reads files; it only consults [`ShimSettings`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod logging;
pub mod preload;

pub use logging::LogLevel;

/// System-wide config file read by the installer.
pub const GLOBAL_CONFIG_PATH: &str = "/etc/pcapfix/config.toml";
/// The loader's preload list. Honoured even for capability-carrying binaries.
pub const DEFAULT_PRELOAD_LIST: &str = "/etc/ld.so.preload";
pub const DEFAULT_LIBRARY_PATH: &str = "/usr/local/lib/libpcapfix.so";

/// Environment variables understood by the shim and the installer.
pub struct EnvVar;

impl EnvVar {
    pub const DISABLE: &'static str = "PCAPFIX_DISABLE";
    pub const DEBUG: &'static str = "PCAPFIX_DEBUG";
    pub const LOG_LEVEL: &'static str = "PCAPFIX_LOG_LEVEL";
    pub const PRELOAD_FILE: &'static str = "PCAPFIX_PRELOAD_FILE";
    pub const LIBRARY: &'static str = "PCAPFIX_LIBRARY";
    pub const CLI_LOG: &'static str = "PCAPFIX_LOG";
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Installer configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preload: PreloadConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Preload list the loader reads at process start
    pub list_path: PathBuf,
    /// Installed location of `libpcapfix.so`
    pub library_path: PathBuf,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            list_path: PathBuf::from(DEFAULT_PRELOAD_LIST),
            library_path: PathBuf::from(DEFAULT_LIBRARY_PATH),
        }
    }
}

impl Config {
    /// Load config from the global location plus environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(GLOBAL_CONFIG_PATH), |key| std::env::var(key).ok())
    }

    /// Load config from `path` (skipped when absent), then apply overrides
    /// obtained through `env`.
    pub fn load_from<F>(path: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)?;
            config = toml::from_str(&contents)?;
        }

        config.apply_env_overrides(env);
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env(EnvVar::PRELOAD_FILE).filter(|v| !v.is_empty()) {
            self.preload.list_path = PathBuf::from(path);
        }
        if let Some(path) = env(EnvVar::LIBRARY).filter(|v| !v.is_empty()) {
            self.preload.library_path = PathBuf::from(path);
        }
    }
}

/// Runtime switches the shim reads from the host process environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShimSettings {
    /// Forward `pcap_open_live` untouched to the next library
    pub disabled: bool,
    pub log_level: LogLevel,
}

impl Default for ShimSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            log_level: LogLevel::Warn,
        }
    }
}

impl ShimSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if env(EnvVar::DISABLE).is_some_and(|v| is_truthy(&v)) {
            settings.disabled = true;
        }
        if env(EnvVar::DEBUG).is_some_and(|v| is_truthy(&v)) {
            settings.log_level = LogLevel::Debug;
        }
        // An explicit level wins over the DEBUG shorthand.
        if let Some(level) = env(EnvVar::LOG_LEVEL).and_then(|v| LogLevel::parse(&v)) {
            settings.log_level = level;
        }

        settings
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
