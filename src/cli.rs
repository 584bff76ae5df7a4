// Command-line interface definitions and argument checks

use std::path::{Path, PathBuf};
use std::time::Duration;

use acctmerge::charset::Charset;
use acctmerge::config::MergeConfig;
use clap::Parser;

const REQUIRED_NUM_OF_ARGS: usize = 2;

#[derive(Parser, Debug)]
#[command(name = "acctmerge")]
#[command(about = "Merge an account CSV file with account status from the account service")]
#[command(
    long_about = "Merge an account CSV file with account status from the account service\n\nEach input row (Account ID, Account Name, First Name, Created On) is looked up at\n{status_api}/v1/accounts/{id} and written as\n  Account ID,First Name,Created On,Status,Status Set On\nRows that cannot be enriched get a sixth diagnostic column.\n\nEXAMPLE:\n  acctmerge data/input.csv output.csv"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Input file followed by output file. The two must differ.
    #[arg(value_name = "FILE")]
    pub paths: Vec<PathBuf>,

    /// Number of worker threads (default: number of CPUs)
    #[arg(short = 'w', long = "workers", help_heading = "Performance Options")]
    pub workers: Option<usize>,

    /// Capacity of each internal queue
    #[arg(long = "queue-capacity", help_heading = "Performance Options")]
    pub queue_capacity: Option<usize>,

    /// Write records in input order instead of completion order
    #[arg(long = "preserve-order", help_heading = "Performance Options")]
    pub preserve_order: bool,

    /// Character set of the input and output files (UTF-8, UTF-16, UTF-16LE, UTF-16BE, US-ASCII, ISO-8859-1)
    #[arg(long = "encoding", help_heading = "Input Options")]
    pub encoding: Option<String>,

    /// Reject input files larger than this many megabytes
    #[arg(long = "max-file-size-mb", help_heading = "Input Options")]
    pub max_file_size_mb: Option<u64>,

    /// Base URL of the account status service
    #[arg(long = "status-api", help_heading = "Service Options")]
    pub status_api: Option<String>,

    /// Timeout for each status request (e.g. 500ms, 10s, 1m)
    #[arg(
        long = "request-timeout",
        value_parser = humantime::parse_duration,
        help_heading = "Service Options"
    )]
    pub request_timeout: Option<Duration>,

    /// Print processing statistics to stderr when done
    #[arg(short = 's', long = "stats", help_heading = "Display Options")]
    pub stats: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Display Options")]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", help_heading = "Display Options", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Read configuration from this file instead of the default locations
    #[arg(long = "config", value_name = "PATH", help_heading = "Configuration Options")]
    pub config: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}

impl Cli {
    /// Check the positional arguments and return `(input, output)`
    pub fn validate_paths(&self) -> Result<(&PathBuf, &PathBuf), String> {
        match self.paths.as_slice() {
            [] => Err("No arguments detected from command line.".to_string()),
            [input, output] if input == output || same_file(input, output) => {
                Err("The arguments entered can not be the same.".to_string())
            }
            [input, output] => Ok((input, output)),
            other => Err(format!(
                "Invalid number of arguments received. Expected={}, Received={}",
                REQUIRED_NUM_OF_ARGS,
                other.len()
            )),
        }
    }

    /// Apply command-line overrides on top of file configuration
    pub fn apply_overrides(&self, config: &mut MergeConfig) {
        if let Some(workers) = self.workers {
            config.performance.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.performance.queue_capacity = capacity;
        }
        if self.preserve_order {
            config.performance.preserve_order = true;
        }
        if let Some(label) = &self.encoding {
            config.input.encoding = Charset::from_label(label);
        }
        if let Some(limit) = self.max_file_size_mb {
            config.input.max_inbound_file_size_mb = limit;
        }
        if let Some(url) = &self.status_api {
            config.service.status_api = url.clone();
        }
        if let Some(timeout) = self.request_timeout {
            config.service.request_timeout = timeout;
        }
    }
}

/// Absolute form of `path` with symlinks resolved. A file that does not
/// exist yet is resolved through its parent directory.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Some(resolved);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|parent| parent.join(name))
}

fn same_file(a: &Path, b: &Path) -> bool {
    matches!((resolve(a), resolve(b)), (Some(a), Some(b)) if a == b)
}

pub fn usage_banner() -> String {
    let rule = "*".repeat(80);
    format!(
        "{rule}\n\n[Usage]\n\tacctmerge <input_file> <output_file>\n\n\tFor example:\n\n\t\tacctmerge data/input.csv output.csv\n\nNote: The input.csv output.csv file names need to be different\n\n\n{rule}"
    )
}

pub fn print_usage() {
    println!("{}", usage_banner());
}
