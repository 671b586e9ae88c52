use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const PROJECT_CONFIG_NAME: &str = ".aqstorerc";

/// Configuration file handler for aqstore
///
/// Only the root-level `defaults` key is understood. Its value is split like a
/// shell command line and placed in front of the user's arguments, so anything
/// passed explicitly still wins.
#[derive(Debug, Default)]
pub struct ConfigFile {
    pub defaults: Option<String>,
    pub source: Option<PathBuf>,
}

impl ConfigFile {
    /// Find project-level .aqstorerc by walking up directory tree
    pub fn find_project_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_project_config_from(&current)
    }

    fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let config_path = current.join(PROJECT_CONFIG_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// `$XDG_CONFIG_HOME/aqstore/config.ini` or the platform equivalent
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("aqstore").join("config.ini"))
    }

    /// Project config wins over user config; only one file is read
    pub fn find_config_path() -> Option<PathBuf> {
        Self::find_project_config().or_else(|| Self::user_config_path().filter(|p| p.is_file()))
    }

    /// Load from `custom_path`, or from the first config found on the search path
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(path),
            None => match Self::find_config_path() {
                Some(path) => Self::load_from_path(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse_ini_content(&content);
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse_ini_content(content: &str) -> Self {
        let mut defaults = None;
        let mut in_root = true;

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                in_root = false;
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if in_root && key.trim() == "defaults" {
                    defaults = Some(value.trim().to_string());
                }
            }
        }

        Self {
            defaults,
            source: None,
        }
    }

    /// Insert the configured defaults right after the program name
    pub fn process_args(&self, args: Vec<String>) -> Result<Vec<String>> {
        let Some(defaults) = &self.defaults else {
            return Ok(args);
        };

        let default_args = shell_words::split(defaults)
            .with_context(|| "Invalid defaults: failed to parse arguments".to_string())?;

        let mut args = args.into_iter();
        let mut result = Vec::with_capacity(default_args.len() + args.len());
        result.extend(args.next());
        result.extend(default_args);
        result.extend(args);
        Ok(result)
    }
}

/// Pre-parse scan for `--config-file` / `--ignore-config`, before clap runs
pub fn config_flags(args: &[String]) -> (Option<PathBuf>, bool) {
    let mut custom = None;
    let mut ignore = false;
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--ignore-config" {
            ignore = true;
        } else if arg == "--config-file" {
            custom = iter.next().map(PathBuf::from);
        } else if let Some(path) = arg.strip_prefix("--config-file=") {
            custom = Some(PathBuf::from(path));
        } else if arg == "--" {
            break;
        }
    }
    (custom, ignore)
}
