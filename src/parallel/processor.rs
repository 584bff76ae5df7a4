//! Main merge processor
//!
//! Contains the MergeProcessor struct that wires the source, worker and sink
//! threads together and reports the outcome of a run.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::bounded;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

use crate::charset::{LineReader, LineWriter};
use crate::enrichment::EnrichmentPort;
use crate::platform::Shutdown;
use crate::stats::ProcessingStats;

use super::sink::record_sink_thread;
use super::source::line_source_thread;
use super::types::{ParallelConfig, PipelineError};
use super::worker::worker_thread;

type StageHandle = thread::JoinHandle<Result<ProcessingStats>>;

/// Main merge processor
pub struct MergeProcessor {
    config: ParallelConfig,
    port: Arc<dyn EnrichmentPort>,
    shutdown: Shutdown,
}

impl MergeProcessor {
    pub fn new(config: ParallelConfig, port: Arc<dyn EnrichmentPort>) -> Self {
        Self {
            config,
            port,
            shutdown: Shutdown::never(),
        }
    }

    /// Stop every stage as soon as `shutdown` is triggered
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Merge `input` into a newly created `output` file.
    ///
    /// The input is opened before the output is created, so a missing input
    /// never truncates an existing output file.
    pub fn process_files(&self, input: &Path, output: &Path) -> Result<ProcessingStats> {
        let reader = File::open(input)
            .with_context(|| format!("Failed to open input file {}", input.display()))?;
        let writer = File::create(output)
            .with_context(|| format!("Failed to create output file {}", output.display()))?;

        info!(
            input = %input.display(),
            output = %output.display(),
            "merging accounts"
        );
        self.process(BufReader::new(reader), BufWriter::new(writer))
    }

    /// Run the pipeline over `reader`, writing the merged file to `output`.
    ///
    /// Returns the combined statistics of every stage. If any stage fails the
    /// remaining stages wind down and the first root cause is returned.
    pub fn process<R, W>(&self, reader: R, output: W) -> Result<ProcessingStats>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let num_workers = self.config.num_workers.max(1);
        let capacity = self.config.queue_capacity.max(1);
        let charset = self.config.charset;
        let preserve_order = self.config.preserve_order;

        let (line_sender, line_receiver) = bounded(capacity);
        let (record_sender, record_receiver) = bounded(capacity);

        debug!(num_workers, capacity, preserve_order, %charset, "starting pipeline");

        let source_handle: StageHandle = {
            let reader = LineReader::new(reader, charset);
            let shutdown = self.shutdown.clone();
            thread::spawn(move || line_source_thread(reader, line_sender, num_workers, shutdown))
        };

        let worker_handles: Vec<StageHandle> = (0..num_workers)
            .map(|worker_id| {
                let line_receiver = line_receiver.clone();
                let record_sender = record_sender.clone();
                let port = Arc::clone(&self.port);
                let shutdown = self.shutdown.clone();
                thread::spawn(move || {
                    worker_thread(
                        worker_id,
                        line_receiver,
                        record_sender,
                        port,
                        preserve_order,
                        shutdown,
                    )
                })
            })
            .collect();

        // Only the stage threads may hold queue ends, otherwise a failed stage
        // would leave its neighbours blocked forever
        drop(line_receiver);
        drop(record_sender);

        let sink_handle: StageHandle = {
            let shutdown = self.shutdown.clone();
            thread::spawn(move || {
                let mut writer = LineWriter::new(output, charset);
                record_sink_thread(
                    record_receiver,
                    &mut writer,
                    num_workers,
                    preserve_order,
                    shutdown,
                )
            })
        };

        let mut results = Vec::with_capacity(num_workers + 2);
        results.push(join_stage("source", source_handle));
        results.extend(
            worker_handles
                .into_iter()
                .map(|handle| join_stage("worker", handle)),
        );
        results.push(join_stage("sink", sink_handle));

        let mut total = ProcessingStats::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(stats) => total.merge(&stats),
                Err(err) => errors.push(err),
            }
        }

        match root_cause(errors) {
            Some(err) => Err(err),
            None => {
                info!(
                    written = total.records_written,
                    dropped = total.lines_dropped,
                    "merge complete"
                );
                Ok(total)
            }
        }
    }
}

fn join_stage(name: &str, handle: StageHandle) -> Result<ProcessingStats> {
    handle
        .join()
        .map_err(|_| anyhow!("{} thread panicked", name))?
}

/// A closed queue is a symptom of another stage failing, so prefer any
/// other error. Stages are checked in pipeline order.
fn root_cause(errors: Vec<anyhow::Error>) -> Option<anyhow::Error> {
    let is_symptom = |err: &anyhow::Error| {
        matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::QueueClosed { .. })
        )
    };

    let mut fallback = None;
    for err in errors {
        if !is_symptom(&err) {
            return Some(err);
        }
        fallback.get_or_insert(err);
    }
    fallback
}
