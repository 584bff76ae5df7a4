//! Worker thread for the merge pipeline
//!
//! Each worker parses lines into accounts, enriches them through the
//! [`EnrichmentPort`] and forwards the result to the sink.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::account::Account;
use crate::enrichment::{enrich_account, EnrichmentPort};
use crate::parsers::{assemble, ParseError};
use crate::platform::Shutdown;
use crate::stats::ProcessingStats;

use super::types::{
    recv_or_cancel, send_or_cancel, LineMessage, RecordMessage, WorkerState, LINE_QUEUE,
    RECORD_QUEUE,
};

/// Parse one raw line, or `None` if the line is dropped.
///
/// A row whose id is not a number is kept with a diagnostic set.
pub(crate) fn parse_line(line: &str, stats: &mut ProcessingStats) -> Option<Account> {
    match assemble(line) {
        Ok(account) => Some(account),
        Err(ParseError::InvalidIdentifier { raw, account }) => {
            stats.invalid_ids += 1;
            let mut account = *account;
            account.set_diagnostic(Account::invalid_id_message(&raw));
            debug!(raw, "keeping row with invalid id");
            Some(account)
        }
        Err(ParseError::MalformedLine { reason }) => {
            debug!(%reason, line, "dropping malformed line");
            stats.lines_dropped += 1;
            None
        }
    }
}

/// Enrich a parsed account unless parsing already flagged it
pub(crate) fn enrich_parsed(
    account: &mut Account,
    port: &dyn EnrichmentPort,
    stats: &mut ProcessingStats,
) {
    if account.diagnostic.is_some() {
        return;
    }
    if !account.has_valid_id() {
        stats.invalid_ids += 1;
    }
    if enrich_account(port, account) {
        stats.records_enriched += 1;
    } else if account.has_valid_id() {
        stats.enrichment_failures += 1;
    }
}

/// Worker thread: runs until it receives an end-of-stream marker, then
/// forwards exactly one marker to the sink
pub(crate) fn worker_thread(
    worker_id: usize,
    line_receiver: Receiver<LineMessage>,
    record_sender: Sender<RecordMessage>,
    port: Arc<dyn EnrichmentPort>,
    preserve_order: bool,
    shutdown: Shutdown,
) -> Result<ProcessingStats> {
    let started = Instant::now();
    let mut stats = ProcessingStats::new();
    let mut state = WorkerState::Reading;

    loop {
        trace!(worker_id, %state, "waiting for line");
        match recv_or_cancel(&line_receiver, &shutdown, LINE_QUEUE)? {
            LineMessage::Eof => {
                send_or_cancel(&record_sender, RecordMessage::Eof, &shutdown, RECORD_QUEUE)?;
                state = WorkerState::Done;
                break;
            }
            LineMessage::Line { seq, line } => {
                state = WorkerState::Parsing;
                trace!(worker_id, seq, %state);
                let mut account = parse_line(&line, &mut stats);

                if let Some(account) = account.as_mut() {
                    state = WorkerState::Enriching;
                    trace!(worker_id, seq, %state);
                    enrich_parsed(account, port.as_ref(), &mut stats);
                }

                if account.is_some() || preserve_order {
                    state = WorkerState::Forwarding;
                    trace!(worker_id, seq, %state);
                    send_or_cancel(
                        &record_sender,
                        RecordMessage::Processed { seq, account },
                        &shutdown,
                        RECORD_QUEUE,
                    )?;
                }
                state = WorkerState::Reading;
            }
        }
    }

    stats.processing_time = started.elapsed();
    debug!(worker_id, %state, enriched = stats.records_enriched, "worker finished");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;
    use crate::enrichment::EnrichError;
    use crossbeam_channel::bounded;

    fn active(_: &Account) -> Result<AccountStatus, EnrichError> {
        Ok(AccountStatus {
            status: Some("active".to_string()),
            status_set_on: Some("2020-01-01".to_string()),
        })
    }

    fn process_line(
        line: &str,
        port: &dyn EnrichmentPort,
        stats: &mut ProcessingStats,
    ) -> Option<Account> {
        let mut account = parse_line(line, stats)?;
        enrich_parsed(&mut account, port, stats);
        Some(account)
    }

    fn unavailable(_: &Account) -> Result<AccountStatus, EnrichError> {
        Err(EnrichError::RemoteFailure("503 Service Unavailable".to_string()))
    }

    #[test]
    fn test_process_line_enriches_valid_row() {
        let mut stats = ProcessingStats::new();
        let account = process_line("7,Acme,Wile,2019-01-01", &active, &mut stats).unwrap();
        assert_eq!(account.status.as_deref(), Some("active"));
        assert_eq!(stats.records_enriched, 1);
        assert_eq!(stats.diagnostics(), 0);
    }

    #[test]
    fn test_process_line_drops_malformed_row() {
        let mut stats = ProcessingStats::new();
        assert_eq!(process_line("no delimiter here", &active, &mut stats), None);
        assert_eq!(process_line("1,only,three", &active, &mut stats), None);
        assert_eq!(stats.lines_dropped, 2);
    }

    #[test]
    fn test_process_line_keeps_non_numeric_id_with_diagnostic() {
        let mut stats = ProcessingStats::new();
        let account = process_line("x1,Acme,Wile,2019-01-01", &active, &mut stats).unwrap();
        assert_eq!(account.id, None);
        assert_eq!(account.status, None);
        assert_eq!(
            account.diagnostic.as_deref(),
            Some("Account does not have a valid ID=x1")
        );
        assert_eq!(stats.invalid_ids, 1);
    }

    #[test]
    fn test_process_line_does_not_enrich_non_positive_id() {
        let mut stats = ProcessingStats::new();
        let account = process_line("-3,Acme,Wile,2019-01-01", &active, &mut stats).unwrap();
        assert_eq!(account.status, None);
        assert_eq!(
            account.diagnostic.as_deref(),
            Some("Account does not have a valid ID=-3")
        );
        assert_eq!(stats.invalid_ids, 1);
        assert_eq!(stats.enrichment_failures, 0);
    }

    #[test]
    fn test_process_line_records_enrichment_failure() {
        let mut stats = ProcessingStats::new();
        let account = process_line("9,Acme,Wile,2019-01-01", &unavailable, &mut stats).unwrap();
        assert_eq!(account.first_name, "Wile");
        assert_eq!(account.created_on, "2019-01-01");
        assert_eq!(account.diagnostic.as_deref(), Some("503 Service Unavailable"));
        assert_eq!(stats.enrichment_failures, 1);
    }

    #[test]
    fn test_worker_forwards_one_marker_and_stops() {
        let (line_tx, line_rx) = bounded(8);
        let (record_tx, record_rx) = bounded(8);
        line_tx
            .send(LineMessage::Line {
                seq: 0,
                line: "1,a,b,c".to_string(),
            })
            .unwrap();
        line_tx
            .send(LineMessage::Line {
                seq: 1,
                line: "garbage".to_string(),
            })
            .unwrap();
        line_tx.send(LineMessage::Eof).unwrap();
        // A second marker belongs to another worker and must stay queued
        line_tx.send(LineMessage::Eof).unwrap();

        let stats = worker_thread(
            0,
            line_rx.clone(),
            record_tx,
            Arc::new(active),
            false,
            Shutdown::never(),
        )
        .unwrap();

        let messages: Vec<RecordMessage> = record_rx.try_iter().collect();
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            &messages[0],
            RecordMessage::Processed { seq: 0, account: Some(_) }
        ));
        assert_eq!(messages[1], RecordMessage::Eof);
        assert_eq!(line_rx.len(), 1);
        assert_eq!(stats.lines_dropped, 1);
    }

    #[test]
    fn test_ordered_worker_forwards_dropped_lines() {
        let (line_tx, line_rx) = bounded(4);
        let (record_tx, record_rx) = bounded(4);
        line_tx
            .send(LineMessage::Line {
                seq: 4,
                line: "garbage".to_string(),
            })
            .unwrap();
        line_tx.send(LineMessage::Eof).unwrap();

        worker_thread(0, line_rx, record_tx, Arc::new(active), true, Shutdown::never()).unwrap();

        assert_eq!(
            record_rx.try_iter().collect::<Vec<_>>(),
            vec![
                RecordMessage::Processed {
                    seq: 4,
                    account: None
                },
                RecordMessage::Eof
            ]
        );
    }
}
