// Core library for the acctmerge account merge tool

pub mod account;
pub mod charset;
pub mod config;
pub mod config_file;
pub mod enrichment;
pub mod formatters;
pub mod logging;
pub mod parallel;
pub mod parsers;
pub mod platform;
pub mod stats;
pub mod validation;

pub use account::{Account, AccountStatus};
pub use config::MergeConfig;
pub use enrichment::{EnrichError, EnrichmentPort, StatusClient};
pub use parallel::{MergeProcessor, ParallelConfig, PipelineError};
pub use parsers::ParseError;
pub use stats::ProcessingStats;
