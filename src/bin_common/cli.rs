//! CLI utilities for binaries
//!
//! Resolves which configuration file a binary should load.

use std::path::PathBuf;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CONFIG_PATH";

/// Config file used when neither flag nor environment names one
pub const DEFAULT_CONFIG_PATH: &str = "config/local.yaml";

/// Where the config path came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config <path>` or `--config=<path>`
    Flag(PathBuf),
    /// `CONFIG_PATH`
    Env(PathBuf),
    /// [`DEFAULT_CONFIG_PATH`]
    Default(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigSource::Flag(path) | ConfigSource::Env(path) | ConfigSource::Default(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            ConfigSource::Flag(path) | ConfigSource::Env(path) | ConfigSource::Default(path) => path,
        }
    }
}

/// Resolve the config path from `args` and the process environment
///
/// Precedence: `--config` flag, then `CONFIG_PATH`, then `config/local.yaml`.
pub fn resolve_config_path(args: &[String]) -> ConfigSource {
    resolve_config_path_with(args, |key| std::env::var(key).ok())
}

/// Same as [`resolve_config_path`] with an explicit environment lookup
pub fn resolve_config_path_with(args: &[String], lookup: impl Fn(&str) -> Option<String>) -> ConfigSource {
    if let Some(path) = flag_config_path(args) {
        return ConfigSource::Flag(path.into());
    }

    match lookup(CONFIG_ENV_VAR).filter(|path| !path.trim().is_empty()) {
        Some(path) => ConfigSource::Env(path.into()),
        None => ConfigSource::Default(DEFAULT_CONFIG_PATH.into()),
    }
}

fn flag_config_path(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-config" => return iter.next().cloned(),
            other => {
                if let Some(path) = other
                    .strip_prefix("--config=")
                    .or_else(|| other.strip_prefix("-config="))
                {
                    return Some(path.to_string());
                }
            }
        }
    }
    None
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
