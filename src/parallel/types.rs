//! Type definitions for the merge pipeline
//!
//! Contains queue messages, pipeline configuration, errors and the
//! cancellable send/receive helpers shared by every stage.

use crossbeam_channel::{select, Receiver, Sender};
use std::fmt;
use thiserror::Error;

use crate::account::Account;
use crate::charset::Charset;
use crate::config::MergeConfig;
use crate::platform::Shutdown;

/// Configuration for the pipeline, derived from [`MergeConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelConfig {
    pub num_workers: usize,
    pub queue_capacity: usize,
    pub preserve_order: bool,
    pub charset: Charset,
}

impl From<&MergeConfig> for ParallelConfig {
    fn from(config: &MergeConfig) -> Self {
        Self {
            num_workers: config.performance.workers,
            queue_capacity: config.performance.queue_capacity,
            preserve_order: config.performance.preserve_order,
            charset: config.input.encoding,
        }
    }
}

/// Message on the line queue (source -> workers)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineMessage {
    Line { seq: u64, line: String },
    /// End of stream. The source sends one per worker.
    Eof,
}

/// Message on the record queue (workers -> sink)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordMessage {
    /// Outcome for line `seq`. `None` means the line was dropped; those are
    /// only forwarded in ordered mode so the sink can advance past them.
    Processed { seq: u64, account: Option<Account> },
    /// End of stream. Each worker sends exactly one.
    Eof,
}

/// Per-worker processing state, traced on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    Reading,
    Parsing,
    Enriching,
    Forwarding,
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Reading => "reading",
            WorkerState::Parsing => "parsing",
            WorkerState::Enriching => "enriching",
            WorkerState::Forwarding => "forwarding",
            WorkerState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Pipeline failures that are not plain I/O errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("processing cancelled")]
    Cancelled,

    /// The other end of a queue went away, usually because that stage failed
    #[error("{queue} queue closed before end of stream")]
    QueueClosed { queue: &'static str },
}

pub(crate) const LINE_QUEUE: &str = "line";
pub(crate) const RECORD_QUEUE: &str = "record";

/// Blocking send that gives up when the pipeline is cancelled
pub(crate) fn send_or_cancel<T>(
    sender: &Sender<T>,
    msg: T,
    shutdown: &Shutdown,
    queue: &'static str,
) -> Result<(), PipelineError> {
    if shutdown.is_triggered() {
        return Err(PipelineError::Cancelled);
    }
    select! {
        send(sender, msg) -> res => res.map_err(|_| PipelineError::QueueClosed { queue }),
        recv(shutdown.receiver()) -> _ => Err(PipelineError::Cancelled),
    }
}

/// Blocking receive that gives up when the pipeline is cancelled
pub(crate) fn recv_or_cancel<T>(
    receiver: &Receiver<T>,
    shutdown: &Shutdown,
    queue: &'static str,
) -> Result<T, PipelineError> {
    if shutdown.is_triggered() {
        return Err(PipelineError::Cancelled);
    }
    select! {
        recv(receiver) -> msg => msg.map_err(|_| PipelineError::QueueClosed { queue }),
        recv(shutdown.receiver()) -> _ => Err(PipelineError::Cancelled),
    }
}
