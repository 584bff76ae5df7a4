//! Line source thread
//!
//! Reads the inbound file and feeds raw lines to the workers.

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::time::Instant;
use tracing::{debug, trace};

use crate::charset::LineReader;
use crate::parsers::is_inbound_header;
use crate::platform::Shutdown;
use crate::stats::ProcessingStats;

use super::types::{send_or_cancel, LineMessage, LINE_QUEUE};

/// Line source thread: skips blank lines and header rows, sends every other
/// line in file order, then one end-of-stream marker per worker.
///
/// Blocks when the line queue is full.
pub(crate) fn line_source_thread<R: BufRead>(
    mut reader: LineReader<R>,
    line_sender: Sender<LineMessage>,
    num_workers: usize,
    shutdown: Shutdown,
) -> Result<ProcessingStats> {
    let started = Instant::now();
    let mut stats = ProcessingStats::new();
    let mut seq = 0u64;

    debug!(charset = %reader.charset(), "line source started");

    while let Some(line) = reader
        .read_line()
        .context("Failed to read input file")?
    {
        stats.lines_read += 1;

        if line.trim().is_empty() {
            stats.blank_lines += 1;
            continue;
        }
        if is_inbound_header(&line) {
            trace!(line_num = stats.lines_read, "skipping header row");
            stats.header_lines += 1;
            continue;
        }

        send_or_cancel(
            &line_sender,
            LineMessage::Line { seq, line },
            &shutdown,
            LINE_QUEUE,
        )?;
        seq += 1;
    }

    debug!(lines = seq, "end of input, sending markers");
    for _ in 0..num_workers {
        send_or_cancel(&line_sender, LineMessage::Eof, &shutdown, LINE_QUEUE)?;
    }

    stats.processing_time = started.elapsed();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Charset;
    use crossbeam_channel::bounded;
    use std::io::Cursor;
    use std::thread;
    use std::time::Duration;

    fn reader(input: &str) -> LineReader<Cursor<Vec<u8>>> {
        LineReader::new(Cursor::new(input.as_bytes().to_vec()), Charset::Utf8)
    }

    #[test]
    fn test_skips_header_and_blank_lines_and_sends_markers() {
        let input = "Account ID,Account Name,First Name,Created On\n\n1,a,b,c\n   \n2,d,e,f\n";
        let (tx, rx) = bounded(16);
        let stats = line_source_thread(reader(input), tx, 3, Shutdown::never()).unwrap();

        let messages: Vec<LineMessage> = rx.try_iter().collect();
        assert_eq!(
            messages,
            vec![
                LineMessage::Line {
                    seq: 0,
                    line: "1,a,b,c".to_string()
                },
                LineMessage::Line {
                    seq: 1,
                    line: "2,d,e,f".to_string()
                },
                LineMessage::Eof,
                LineMessage::Eof,
                LineMessage::Eof,
            ]
        );
        assert_eq!(stats.lines_read, 5);
        assert_eq!(stats.header_lines, 1);
        assert_eq!(stats.blank_lines, 2);
    }

    #[test]
    fn test_producer_blocks_when_queue_is_full() {
        const CAPACITY: usize = 4;
        let input: String = (1..=20).map(|i| format!("{i},n,f,d\n")).collect();
        let (tx, rx) = bounded(CAPACITY);

        let handle = thread::spawn(move || line_source_thread(reader(&input), tx, 2, Shutdown::never()));

        thread::sleep(Duration::from_millis(100));
        assert_eq!(rx.len(), CAPACITY);
        assert!(!handle.is_finished(), "producer should be blocked on a full queue");

        let mut lines = 0;
        let mut markers = 0;
        for msg in rx.iter() {
            match msg {
                LineMessage::Line { .. } => lines += 1,
                LineMessage::Eof => markers += 1,
            }
        }
        let stats = handle.join().unwrap().unwrap();
        assert_eq!(lines, 20);
        assert_eq!(markers, 2);
        assert_eq!(stats.lines_read, 20);
    }

    #[test]
    fn test_closed_queue_stops_the_source() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let err = line_source_thread(reader("1,a,b,c\n"), tx, 1, Shutdown::never()).unwrap_err();
        assert!(err.to_string().contains("queue closed"));
    }
}
