use metrics::{counter, Counter};

/// Writer telemetry.
///
/// `Telemetry` collects information about the writer's own behavior, such as how many lines were sent or suppressed,
/// and how often the connection to the line receiver had to be re-established. It is emitted through the global
/// `metrics` recorder, if one is installed.
pub struct Telemetry {
    samples_rejected_unknown_type: Counter,
    samples_rejected_value_count: Counter,
    lines_written: Counter,
    lines_suppressed: Counter,
    payloads_sent: Counter,
    payloads_dropped: Counter,
    bytes_sent: Counter,
    bytes_dropped: Counter,
    connect_attempts: Counter,
    connect_failures: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance for the given line receiver.
    pub fn new(receiver: &str) -> Self {
        let base_labels = telemetry_tags!("receiver" => receiver.to_string());
        let unknown_type_labels =
            telemetry_tags!("receiver" => receiver.to_string(), "reason" => "unknown_type");
        let value_count_labels =
            telemetry_tags!("receiver" => receiver.to_string(), "reason" => "value_count");

        Self {
            samples_rejected_unknown_type: counter!(
                "carbon_writer.samples_rejected",
                unknown_type_labels.iter()
            ),
            samples_rejected_value_count: counter!(
                "carbon_writer.samples_rejected",
                value_count_labels.iter()
            ),
            lines_written: counter!("carbon_writer.lines_written", base_labels.iter()),
            lines_suppressed: counter!("carbon_writer.lines_suppressed", base_labels.iter()),
            payloads_sent: counter!("carbon_writer.payloads_sent", base_labels.iter()),
            payloads_dropped: counter!("carbon_writer.payloads_dropped", base_labels.iter()),
            bytes_sent: counter!("carbon_writer.bytes_sent", base_labels.iter()),
            bytes_dropped: counter!("carbon_writer.bytes_dropped", base_labels.iter()),
            connect_attempts: counter!("carbon_writer.connect_attempts", base_labels.iter()),
            connect_failures: counter!("carbon_writer.connect_failures", base_labels.iter()),
        }
    }

    /// Applies the given telemetry update, updating the internal metrics.
    pub fn apply_update(&self, update: &TelemetryUpdate) {
        self.samples_rejected_unknown_type.increment(update.samples_rejected_unknown_type);
        self.samples_rejected_value_count.increment(update.samples_rejected_value_count);
        self.lines_written.increment(update.lines_written);
        self.lines_suppressed.increment(update.lines_suppressed);
        self.payloads_sent.increment(update.payloads_sent);
        self.payloads_dropped.increment(update.payloads_dropped);
        self.bytes_sent.increment(update.bytes_sent);
        self.bytes_dropped.increment(update.bytes_dropped);
        self.connect_attempts.increment(update.connect_attempts);
        self.connect_failures.increment(update.connect_failures);
    }
}

/// A buffer for collecting telemetry updates over a single write.
#[derive(Debug, Default)]
pub struct TelemetryUpdate {
    samples_rejected_unknown_type: u64,
    samples_rejected_value_count: u64,
    lines_written: u64,
    lines_suppressed: u64,
    payloads_sent: u64,
    payloads_dropped: u64,
    bytes_sent: u64,
    bytes_dropped: u64,
    connect_attempts: u64,
    connect_failures: u64,
}

impl TelemetryUpdate {
    /// Returns `true` if any updates have been recorded.
    pub fn had_updates(&self) -> bool {
        self.samples_rejected_unknown_type > 0
            || self.samples_rejected_value_count > 0
            || self.lines_written > 0
            || self.lines_suppressed > 0
            || self.payloads_sent > 0
            || self.payloads_dropped > 0
            || self.connect_attempts > 0
    }

    /// Tracks a sample rejected because its type is unknown.
    pub fn track_unknown_type(&mut self) {
        self.samples_rejected_unknown_type += 1;
    }

    /// Tracks a sample rejected because its value count didn't match its type.
    pub fn track_value_count_mismatch(&mut self) {
        self.samples_rejected_value_count += 1;
    }

    /// Tracks lines written into a payload, and values that were suppressed.
    pub fn track_lines(&mut self, written: usize, suppressed: usize) {
        self.lines_written += written as u64;
        self.lines_suppressed += suppressed as u64;
    }

    /// Tracks a connection attempt.
    pub fn track_connect_attempt(&mut self, succeeded: bool) {
        self.connect_attempts += 1;
        if !succeeded {
            self.connect_failures += 1;
        }
    }

    /// Tracks a successful payload send.
    pub fn track_payload_send_succeeded(&mut self, bytes_len: usize) {
        self.payloads_sent += 1;
        self.bytes_sent += bytes_len as u64;
    }

    /// Tracks a payload that could not be sent.
    pub fn track_payload_send_failed(&mut self, bytes_len: usize) {
        self.payloads_dropped += 1;
        self.bytes_dropped += bytes_len as u64;
    }
}

macro_rules! _telemetry_tags {
    ($($k:literal => $v:expr),*) => {
        [
            ::metrics::Label::from_static_parts("writer", "carbon"),
            ::metrics::Label::from_static_parts("writer_version", env!("CARGO_PKG_VERSION")),
            $(::metrics::Label::new($k, $v),)*
        ]
    };
}

pub(crate) use _telemetry_tags as telemetry_tags;

#[cfg(test)]
mod tests {
    use super::TelemetryUpdate;

    #[test]
    fn update_tracking() {
        let mut update = TelemetryUpdate::default();
        assert!(!update.had_updates());

        update.track_payload_send_failed(128);
        assert!(update.had_updates());

        update.track_lines(0, 2);
        assert!(update.had_updates());
        assert_eq!(update.lines_suppressed, 2);
        assert_eq!(update.payloads_dropped, 1);
        assert_eq!(update.bytes_dropped, 128);

        update.track_connect_attempt(false);
        update.track_connect_attempt(true);
        assert_eq!(update.connect_attempts, 2);
        assert_eq!(update.connect_failures, 1);
    }
}
