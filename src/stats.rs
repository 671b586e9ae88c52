use std::time::Duration;

/// Parse-error samples kept for the end-of-run summary
const MAX_ERROR_EXAMPLES: usize = 3;

/// Statistics collected while ingesting input files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub lines_read: usize,
    pub records_parsed: usize,
    pub parse_errors: usize,
    pub records_appended: usize,
    pub records_dropped: usize,
    pub error_examples: Vec<String>,
    pub processing_time: Duration,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_parse_error(&mut self, message: String) {
        self.parse_errors += 1;
        if self.error_examples.len() < MAX_ERROR_EXAMPLES {
            self.error_examples.push(message);
        }
    }

    /// Fold another worker's counters into this one
    pub fn merge(&mut self, other: &IngestStats) {
        self.files_processed += other.files_processed;
        self.files_failed += other.files_failed;
        self.lines_read += other.lines_read;
        self.records_parsed += other.records_parsed;
        self.parse_errors += other.parse_errors;
        self.records_appended += other.records_appended;
        self.records_dropped += other.records_dropped;
        for example in &other.error_examples {
            if self.error_examples.len() >= MAX_ERROR_EXAMPLES {
                break;
            }
            self.error_examples.push(example.clone());
        }
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Lines processed: {} total, {} records parsed, {} appended",
            self.lines_read, self.records_parsed, self.records_appended
        );

        if self.files_processed > 0 {
            output.push_str(&format!(", {} files", self.files_processed));
        }
        if self.files_failed > 0 {
            output.push_str(&format!(", {} unreadable files", self.files_failed));
        }
        if self.parse_errors > 0 {
            output.push_str(&format!(", {} parse errors", self.parse_errors));
        }
        if self.records_dropped > 0 {
            output.push_str(&format!(", {} dropped (capacity)", self.records_dropped));
        }

        let processing_time_ms = self.processing_time.as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.lines_read > 0 {
            let lines_per_sec = (self.lines_read as f64 * 1000.0) / processing_time_ms as f64;
            output.push_str(&format!(" ({:.0} lines/s)", lines_per_sec));
        }

        output
    }
}

/// Statistics of one aggregation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub records_scanned: usize,
    pub records_used: usize,
    pub skipped_no_day: usize,
    pub skipped_missing_index: usize,
    pub without_hour: usize,
}

impl AggregationStats {
    pub fn merge(&mut self, other: &AggregationStats) {
        self.records_scanned += other.records_scanned;
        self.records_used += other.records_used;
        self.skipped_no_day += other.skipped_no_day;
        self.skipped_missing_index += other.skipped_missing_index;
        self.without_hour += other.without_hour;
    }

    pub fn format_stats(&self) -> String {
        format!(
            "Records scanned: {} total, {} averaged, {} without day, {} missing index, {} without hour",
            self.records_scanned,
            self.records_used,
            self.skipped_no_day,
            self.skipped_missing_index,
            self.without_hour
        )
    }
}
