//! Record sink thread
//!
//! Writes the outbound header and every processed account. The sink only
//! stops once it has seen one end-of-stream marker from each worker.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, warn};

use crate::account::Account;
use crate::charset::LineWriter;
use crate::formatters::{format_account, OUTBOUND_HEADER};
use crate::platform::Shutdown;
use crate::stats::ProcessingStats;

use super::types::{recv_or_cancel, RecordMessage, RECORD_QUEUE};

pub(crate) fn record_sink_thread<W: Write>(
    record_receiver: Receiver<RecordMessage>,
    writer: &mut LineWriter<W>,
    num_workers: usize,
    preserve_order: bool,
    shutdown: Shutdown,
) -> Result<ProcessingStats> {
    let started = Instant::now();

    writer
        .write_line(OUTBOUND_HEADER)
        .context("Failed to write output file")?;

    let mut stats = if preserve_order {
        ordered_sink(&record_receiver, writer, num_workers, &shutdown)?
    } else {
        unordered_sink(&record_receiver, writer, num_workers, &shutdown)?
    };

    writer.flush().context("Failed to flush output file")?;

    stats.processing_time = started.elapsed();
    debug!(written = stats.records_written, "sink finished");
    Ok(stats)
}

fn write_account<W: Write>(
    writer: &mut LineWriter<W>,
    account: &Account,
    stats: &mut ProcessingStats,
) -> Result<()> {
    writer
        .write_line(&format_account(account))
        .context("Failed to write output file")?;
    stats.records_written += 1;
    Ok(())
}

/// Write records as they arrive
fn unordered_sink<W: Write>(
    record_receiver: &Receiver<RecordMessage>,
    writer: &mut LineWriter<W>,
    num_workers: usize,
    shutdown: &Shutdown,
) -> Result<ProcessingStats> {
    let mut stats = ProcessingStats::new();
    let mut markers = 0;

    while markers < num_workers {
        match recv_or_cancel(record_receiver, shutdown, RECORD_QUEUE)? {
            RecordMessage::Eof => {
                markers += 1;
                debug!(markers, num_workers, "worker finished");
            }
            RecordMessage::Processed {
                account: Some(account),
                ..
            } => write_account(writer, &account, &mut stats)?,
            RecordMessage::Processed { account: None, .. } => {}
        }
    }

    Ok(stats)
}

/// Buffer out-of-order records and write them by input sequence
fn ordered_sink<W: Write>(
    record_receiver: &Receiver<RecordMessage>,
    writer: &mut LineWriter<W>,
    num_workers: usize,
    shutdown: &Shutdown,
) -> Result<ProcessingStats> {
    let mut stats = ProcessingStats::new();
    let mut pending: HashMap<u64, Option<Account>> = HashMap::new();
    let mut next_expected = 0u64;
    let mut markers = 0;

    while markers < num_workers {
        match recv_or_cancel(record_receiver, shutdown, RECORD_QUEUE)? {
            RecordMessage::Eof => markers += 1,
            RecordMessage::Processed { seq, account } => {
                pending.insert(seq, account);
                while let Some(account) = pending.remove(&next_expected) {
                    if let Some(account) = account {
                        write_account(writer, &account, &mut stats)?;
                    }
                    next_expected += 1;
                }
            }
        }
    }

    // Only reachable if a sequence number never arrived
    if !pending.is_empty() {
        warn!(
            missing = next_expected,
            remaining = pending.len(),
            "gap in record sequence, writing remaining records"
        );
        let mut rest: Vec<_> = pending.into_iter().collect();
        rest.sort_unstable_by_key(|(seq, _)| *seq);
        for account in rest.into_iter().filter_map(|(_, account)| account) {
            write_account(writer, &account, &mut stats)?;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Charset;
    use crossbeam_channel::bounded;
    use std::io;
    use std::thread;

    fn processed(seq: u64, id: i64) -> RecordMessage {
        RecordMessage::Processed {
            seq,
            account: Some(Account::new(Some(id), "n", "f", "d")),
        }
    }

    fn output(writer: LineWriter<Vec<u8>>) -> Vec<String> {
        String::from_utf8(writer.into_inner())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_sink_collects_every_record_from_every_worker() {
        const WORKERS: usize = 4;
        const PER_WORKER: i64 = 25;
        let (tx, rx) = bounded(8);

        let producers: Vec<_> = (0..WORKERS as i64)
            .map(|w| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..PER_WORKER {
                        let id = w * PER_WORKER + i + 1;
                        tx.send(processed(id as u64, id)).unwrap();
                    }
                    tx.send(RecordMessage::Eof).unwrap();
                })
            })
            .collect();
        drop(tx);

        let mut writer = LineWriter::new(Vec::new(), Charset::Utf8);
        let stats = record_sink_thread(rx, &mut writer, WORKERS, false, Shutdown::never()).unwrap();
        for producer in producers {
            producer.join().unwrap();
        }

        let lines = output(writer);
        assert_eq!(lines[0], OUTBOUND_HEADER);
        assert_eq!(lines.len(), 1 + WORKERS * PER_WORKER as usize);
        assert_eq!(stats.records_written, WORKERS * PER_WORKER as usize);
    }

    #[test]
    fn test_sink_does_not_stop_at_first_marker() {
        let (tx, rx) = bounded(8);
        tx.send(processed(0, 1)).unwrap();
        tx.send(RecordMessage::Eof).unwrap();
        tx.send(processed(1, 2)).unwrap();
        tx.send(RecordMessage::Eof).unwrap();

        let mut writer = LineWriter::new(Vec::new(), Charset::Utf8);
        record_sink_thread(rx, &mut writer, 2, false, Shutdown::never()).unwrap();
        assert_eq!(output(writer), vec![OUTBOUND_HEADER, "1,f,d,,", "2,f,d,,"]);
    }

    #[test]
    fn test_ordered_sink_restores_input_order() {
        let (tx, rx) = bounded(8);
        tx.send(processed(2, 30)).unwrap();
        tx.send(RecordMessage::Processed {
            seq: 1,
            account: None,
        })
        .unwrap();
        tx.send(RecordMessage::Eof).unwrap();
        tx.send(processed(0, 10)).unwrap();
        tx.send(RecordMessage::Eof).unwrap();

        let mut writer = LineWriter::new(Vec::new(), Charset::Utf8);
        let stats = record_sink_thread(rx, &mut writer, 2, true, Shutdown::never()).unwrap();
        assert_eq!(
            output(writer),
            vec![OUTBOUND_HEADER, "10,f,d,,", "30,f,d,,"]
        );
        assert_eq!(stats.records_written, 2);
    }

    #[test]
    fn test_queue_closed_before_all_markers_is_an_error() {
        let (tx, rx) = bounded(4);
        tx.send(RecordMessage::Eof).unwrap();
        drop(tx);

        let mut writer = LineWriter::new(Vec::new(), Charset::Utf8);
        let err = record_sink_thread(rx, &mut writer, 2, false, Shutdown::never()).unwrap_err();
        assert!(err.to_string().contains("record queue closed"));
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_reported() {
        let (_tx, rx) = bounded::<RecordMessage>(1);
        let mut writer = LineWriter::new(FailingWriter, Charset::Utf8);
        let err = record_sink_thread(rx, &mut writer, 1, false, Shutdown::never()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to write output file");
        assert!(format!("{err:#}").contains("disk full"));
    }
}
