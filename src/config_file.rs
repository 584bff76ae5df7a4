use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::MergeConfig;

const PROJECT_CONFIG_NAME: &str = ".acctmergerc";
const SECTION_NAME: &str = "acctmerge";

/// Configuration file handler for acctmerge
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFile {
    settings: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Find project-level .acctmergerc by walking up directory tree
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;
        loop {
            let config_path = current.join(PROJECT_CONFIG_NAME);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                // Reached filesystem root
                break;
            }
        }
        None
    }

    /// Get list of user config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("acctmerge").join("config.ini"));
            }
            if let Ok(userprofile) = env::var("USERPROFILE") {
                paths.push(PathBuf::from(userprofile).join(PROJECT_CONFIG_NAME));
            }
        } else {
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });

            paths.push(xdg_config.join("acctmerge").join("config.ini"));

            if let Ok(home) = env::var("HOME") {
                paths.push(PathBuf::from(home).join(PROJECT_CONFIG_NAME));
            }
        }

        paths
    }

    /// Load configuration with precedence: project > user > defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // First existing user config file only
        if let Some(path) = Self::get_user_config_paths().into_iter().find(|p| p.exists()) {
            config = config.merge(Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = config.merge(Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    /// Load configuration, using only `custom_path` when one is given
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config file");

        Self::parse_ini_content(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse INI content from string.
    ///
    /// Keys may appear at the root or under `[acctmerge]`; other sections
    /// are skipped. Keys are normalised to lowercase snake case.
    pub fn parse_ini_content(content: &str) -> Result<Self> {
        let mut settings = BTreeMap::new();
        let mut current_section = String::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].trim().to_lowercase();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                anyhow::bail!("line {}: expected 'key = value', found '{}'", index + 1, line);
            };

            if !current_section.is_empty() && current_section != SECTION_NAME {
                continue;
            }

            let key = key.trim().to_lowercase().replace('-', "_");
            settings.insert(key, value.trim().to_string());
        }

        Ok(Self { settings })
    }

    /// Merge two configuration objects, with `overlay` taking precedence
    pub fn merge(mut self, overlay: Self) -> Self {
        self.settings.extend(overlay.settings);
        self
    }

    pub fn settings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Show configuration information with precedence details
    pub fn show_config(config: &MergeConfig, custom_path: Option<&Path>) {
        println!("Configuration precedence: CLI > --config | project .acctmergerc > user config > defaults\n");

        println!("Active configuration:");
        for (key, value) in config.describe() {
            println!("  {} = {}", key, value);
        }

        println!("\nConfiguration search locations (in precedence order):");
        if let Some(path) = custom_path {
            println!("  --config: {} (other locations ignored)", path.display());
            return;
        }

        match Self::find_project_config() {
            Some(path) => println!("  1. Project: {} (found)", path.display()),
            None => println!(
                "  1. Project: {} (searched up directory tree, not found)",
                PROJECT_CONFIG_NAME
            ),
        }

        for (i, path) in Self::get_user_config_paths().iter().enumerate() {
            let status = if path.exists() { "(found)" } else { "(not found)" };
            println!("  {}. User: {} {}", i + 2, path.display(), status);
        }
    }
}
