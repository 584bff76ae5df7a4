//! Concurrent merge pipeline
//!
//! One source thread reads the inbound file, a pool of workers parses and
//! enriches accounts, and one sink thread writes the outbound file. Stages
//! talk over bounded queues, so a slow stage applies back-pressure.
//!
//! # Module Structure
//!
//! - `types`: Queue messages, configuration, errors and cancellable queue helpers
//! - `source`: Line source thread
//! - `worker`: Worker thread for parsing and enrichment
//! - `sink`: Record sink thread with optional ordering
//! - `processor`: Main MergeProcessor orchestration

mod processor;
mod sink;
mod source;
mod types;
mod worker;

// Re-export public types
pub use processor::MergeProcessor;
pub use types::{ParallelConfig, PipelineError};
