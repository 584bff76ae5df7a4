use std::time::Duration;

/// Statistics collected by the pipeline stages and merged at the end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub lines_read: usize,
    pub header_lines: usize,
    pub blank_lines: usize,
    pub lines_dropped: usize,
    pub invalid_ids: usize,
    pub records_enriched: usize,
    pub enrichment_failures: usize,
    pub records_written: usize,
    pub processing_time: Duration,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines handed to the workers
    pub fn data_lines(&self) -> usize {
        self.lines_read
            .saturating_sub(self.header_lines + self.blank_lines)
    }

    /// Rows written with a diagnostic column
    pub fn diagnostics(&self) -> usize {
        self.invalid_ids + self.enrichment_failures
    }

    /// Fold another stage's counters into this one
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.lines_read += other.lines_read;
        self.header_lines += other.header_lines;
        self.blank_lines += other.blank_lines;
        self.lines_dropped += other.lines_dropped;
        self.invalid_ids += other.invalid_ids;
        self.records_enriched += other.records_enriched;
        self.enrichment_failures += other.enrichment_failures;
        self.records_written += other.records_written;
        self.processing_time = self.processing_time.max(other.processing_time);
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Lines processed: {} total, {} data, {} dropped; Records: {} written, {} enriched",
            self.lines_read,
            self.data_lines(),
            self.lines_dropped,
            self.records_written,
            self.records_enriched
        );

        if self.diagnostics() > 0 {
            output.push_str(&format!(
                ", {} with diagnostics ({} invalid ids, {} enrichment failures)",
                self.diagnostics(),
                self.invalid_ids,
                self.enrichment_failures
            ));
        }

        let processing_time_ms = self.processing_time.as_millis();
        if processing_time_ms > 0 {
            output.push_str(&format!("; Time: {}ms", processing_time_ms));
        }

        output
    }
}
