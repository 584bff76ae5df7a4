use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::warn;

use crate::charset::Charset;
use crate::config_file::ConfigFile;

pub const DEFAULT_STATUS_API: &str = "http://localhost:8080";
pub const DEFAULT_MAX_INBOUND_FILE_SIZE_MB: u64 = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Main configuration struct for acctmerge.
///
/// Built once at startup from defaults, config files and CLI flags, then
/// handed to the processor by reference and never mutated again.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    pub input: InputConfig,
    pub service: ServiceConfig,
    pub performance: PerformanceConfig,
}

/// Inbound/outbound file configuration
#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    pub encoding: Charset,
    pub max_inbound_file_size_mb: u64,
}

/// Status service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub status_api: String,
    pub request_timeout: Duration,
}

/// Pipeline sizing
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub preserve_order: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            input: InputConfig {
                encoding: Charset::Utf8,
                max_inbound_file_size_mb: DEFAULT_MAX_INBOUND_FILE_SIZE_MB,
            },
            service: ServiceConfig {
                status_api: DEFAULT_STATUS_API.to_string(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            performance: PerformanceConfig {
                workers: num_cpus::get(),
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                preserve_order: false,
            },
        }
    }
}

impl MergeConfig {
    /// Apply settings from a loaded config file on top of the current values
    pub fn apply_file(&mut self, file: &ConfigFile) -> Result<()> {
        for (key, value) in file.settings() {
            self.apply_setting(key, value)
                .with_context(|| format!("Invalid value for '{}' in config file", key))?;
        }
        Ok(())
    }

    fn apply_setting(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "encoding" => self.input.encoding = Charset::from_label(value),
            "max_inbound_file_size_mb" => {
                self.input.max_inbound_file_size_mb = value.parse()?;
            }
            "status_api" => self.service.status_api = value.to_string(),
            "request_timeout" => {
                self.service.request_timeout = humantime::parse_duration(value)?;
            }
            "workers" => self.performance.workers = value.parse()?,
            "queue_capacity" => self.performance.queue_capacity = value.parse()?,
            "preserve_order" => self.performance.preserve_order = parse_bool(value)?,
            _ => warn!(key, "ignoring unknown config key"),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.performance.workers == 0 {
            return Err(anyhow!("Worker count must be at least 1"));
        }
        if self.performance.queue_capacity == 0 {
            return Err(anyhow!("Queue capacity must be at least 1"));
        }
        if self.input.max_inbound_file_size_mb == 0 {
            return Err(anyhow!(
                "MaxInboundFileSizeMb has not been set in the config. Please provide a valid configuration value."
            ));
        }
        if self.service.status_api.trim().is_empty() {
            return Err(anyhow!("Status service URL must not be empty"));
        }
        Ok(())
    }

    /// Resolved settings as `(key, value)` pairs, in config file syntax
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("encoding", self.input.encoding.to_string()),
            (
                "max_inbound_file_size_mb",
                self.input.max_inbound_file_size_mb.to_string(),
            ),
            ("status_api", self.service.status_api.clone()),
            (
                "request_timeout",
                humantime::format_duration(self.service.request_timeout).to_string(),
            ),
            ("workers", self.performance.workers.to_string()),
            ("queue_capacity", self.performance.queue_capacity.to_string()),
            ("preserve_order", self.performance.preserve_order.to_string()),
        ]
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow!("expected a boolean, got '{}'", value)),
    }
}

/// Format an error message for stderr
pub fn format_error_message(message: &str) -> String {
    format!("acctmerge: {}", message)
}
