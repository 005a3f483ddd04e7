use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    forwarder::{sync::Forwarder, ForwardError},
    sample::Sample,
    state::State,
    telemetry::TelemetryUpdate,
    types::TypeRegistry,
    writer::PayloadWriter,
};

/// Errors that could occur while writing a sample.
///
/// None of these are fatal: the writer remains usable, and the affected sample is simply dropped.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The sample's type is not in the type registry.
    #[error("unknown type '{type_name}'")]
    UnknownType {
        /// Name of the unknown type.
        type_name: String,
    },

    /// The sample carries a different number of values than its type declares.
    #[error("type '{type_name}' declares {expected} data sources, but the sample carries {actual} values")]
    ValueCountMismatch {
        /// Name of the sample's type.
        type_name: String,

        /// Number of data sources declared by the type.
        expected: usize,

        /// Number of values carried by the sample.
        actual: usize,
    },

    /// The encoded lines could not be delivered to the line receiver.
    #[error(transparent)]
    Forward(#[from] ForwardError),
}

/// Summary of a batch write.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchSummary {
    /// Number of lines delivered to the line receiver.
    pub lines_sent: usize,

    /// Number of samples that were rejected, or whose lines could not be delivered.
    pub samples_dropped: usize,
}

/// Writes samples to a Carbon line receiver.
///
/// `CarbonWriter` is cheap to clone, and all clones share the same connection and differentiation history. It can be
/// used from many threads at once.
#[derive(Clone)]
pub struct CarbonWriter {
    state: Arc<State>,
    forwarder: Arc<Forwarder>,
}

impl CarbonWriter {
    pub(crate) fn new(state: Arc<State>, forwarder: Arc<Forwarder>) -> Self {
        CarbonWriter { state, forwarder }
    }

    /// Returns the type registry used to interpret samples.
    pub fn types(&self) -> &TypeRegistry {
        self.state.registry()
    }

    /// Returns `true` if the writer currently holds an open connection to the line receiver.
    pub fn is_connected(&self) -> bool {
        self.forwarder.is_connected()
    }

    /// Connects to the line receiver, if not already connected.
    ///
    /// Writing a sample connects on demand, so calling this is never required.
    ///
    /// # Errors
    ///
    /// If the last connection attempt failed within the reconnect backoff window, or if connecting fails, an error is
    /// returned.
    pub fn connect(&self) -> Result<(), WriteError> {
        let mut telemetry = TelemetryUpdate::default();
        let result = self.forwarder.connect(&mut telemetry);
        self.state.apply_telemetry(&telemetry);

        result.map_err(WriteError::from)
    }

    /// Writes a single sample.
    ///
    /// The sample is encoded into one line per value, and the lines are sent to the line receiver as a single payload.
    /// Values of differentiated counters without a usable baseline produce no line. Returns the number of lines sent.
    ///
    /// Differentiation history is updated even if the lines cannot be sent. Lines that cannot be sent are dropped
    /// rather than queued: the next sample for the same metric reports the delta since this one.
    ///
    /// # Errors
    ///
    /// If the sample's type is unknown, or its number of values doesn't match the type, the sample is rejected and an
    /// error is returned. If the lines cannot be delivered, either because no connection could be established or
    /// because sending failed, an error is returned.
    pub fn write(&self, sample: &Sample) -> Result<usize, WriteError> {
        let mut telemetry = TelemetryUpdate::default();
        let result = self.write_inner(sample, &mut telemetry);
        self.state.apply_telemetry(&telemetry);

        result
    }

    fn write_inner(&self, sample: &Sample, telemetry: &mut TelemetryUpdate) -> Result<usize, WriteError> {
        let mut writer = PayloadWriter::new();
        self.state.encode(sample, &mut writer, telemetry)?;

        if writer.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.forwarder.send(writer.as_bytes(), telemetry) {
            if matches!(e, ForwardError::Throttled { .. }) {
                warn!(lines = writer.len(), error = %e, "No connection to line receiver; dropping lines.");
            }
            return Err(e.into());
        }

        Ok(writer.len())
    }

    /// Writes a batch of samples.
    ///
    /// Each sample is written independently, exactly as by [`write`](CarbonWriter::write), so a sample that is rejected
    /// or fails to send does not affect the rest of the batch.
    pub fn write_batch(&self, samples: &[Sample]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for sample in samples {
            match self.write(sample) {
                Ok(lines_sent) => summary.lines_sent += lines_sent,
                Err(e) => {
                    debug!(error = %e, type_name = sample.type_name.as_str(), "Dropped sample.");
                    summary.samples_dropped += 1;
                }
            }
        }

        summary
    }
}
